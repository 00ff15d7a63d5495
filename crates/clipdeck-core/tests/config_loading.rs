use clipdeck_core::{EngineConfig, Feature, FeatureSet, config::CONFIG_FILE_NAME};

#[test]
fn config_file_overrides_defaults_and_feature_toggles() {
    let temp = tempfile::tempdir().expect("tempdir should be creatable");
    let path = temp.path().join(CONFIG_FILE_NAME);
    std::fs::write(
        &path,
        r#"
sample_rate = 44100
block_size = 256
output_channels = 1

[defaults]
loop_enabled = true
loop_start_seconds = 0.25
fade_out_seconds = 0.02

[defaults.features]
pan = false
loop_crossfade = false

[diagnostics]
trace_file_prefix = "session"
"#,
    )
    .expect("config should be writable");

    let config = EngineConfig::load_from(&path).expect("config should load");
    assert_eq!(config.sample_rate, 44_100);
    assert_eq!(config.block_size, 256);
    assert_eq!(config.output_channels, 1);
    assert_eq!(config.command_capacity, 256);
    assert!(config.defaults.loop_enabled);
    assert_eq!(config.defaults.loop_start_seconds, Some(0.25));
    assert_eq!(config.defaults.loop_end_seconds, None);
    assert_eq!(config.diagnostics.trace_file_prefix, "session");

    let features = FeatureSet::from(config.defaults.features);
    assert!(!features.is_enabled(Feature::Pan));
    assert!(!features.is_enabled(Feature::LoopCrossfade));
    assert!(features.is_enabled(Feature::Gain));

    let (processor, _handle) = clipdeck_core::channel(&config);
    assert_eq!(processor.features(), features);
    assert_eq!(processor.block_size(), 256);
}

#[test]
fn invalid_config_is_rejected_with_its_path() {
    let temp = tempfile::tempdir().expect("tempdir should be creatable");
    let path = temp.path().join(CONFIG_FILE_NAME);
    std::fs::write(&path, "block_size = 0\n").expect("config should be writable");

    let error = EngineConfig::load_from(&path).expect_err("zero block size is invalid");
    let message = format!("{error:#}");
    assert!(message.contains("block_size must be positive"), "{message}");
    assert!(message.contains(CONFIG_FILE_NAME), "{message}");
}

#[test]
fn malformed_toml_is_an_error_not_a_panic() {
    let temp = tempfile::tempdir().expect("tempdir should be creatable");
    let path = temp.path().join(CONFIG_FILE_NAME);
    std::fs::write(&path, "sample_rate = \"fast\"\n[[[").expect("config should be writable");
    assert!(EngineConfig::load_from(&path).is_err());
}
