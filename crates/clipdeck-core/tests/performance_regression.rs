use std::time::Instant;

use clipdeck_core::{
    Command, ConstantParams, EngineConfig, RenderScript, StartOptions,
    fixtures::stereo_sine_buffer, render_clip,
};

fn budget_ms_from_env(key: &str, fallback: u128) -> u128 {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse::<u128>().ok())
        .unwrap_or(fallback)
}

#[test]
fn ten_seconds_of_full_pipeline_stays_within_budget() {
    let max_render_ms = budget_ms_from_env("CLIPDECK_PERF_MAX_RENDER_MS", 4_500);
    let buffer = stereo_sine_buffer(330.0, 48_000, 96_000, 0.5).expect("buffer");
    let script = RenderScript::new()
        .with_params(ConstantParams {
            playback_rate: 0.75,
            detune: 35.0,
            gain: 0.9,
            pan: 0.3,
            lowpass: 8_000.0,
            highpass: 120.0,
        })
        .at(0, Command::SetLoop(true))
        .at(
            0,
            Command::SetLoopBounds {
                start: Some(0.2),
                end: Some(1.8),
            },
        )
        .at(0, Command::SetLoopCrossfade(0.05))
        .at(0, Command::SetFadeIn(0.1))
        .at(0, Command::Start(StartOptions::default()))
        .at(456_000, Command::Stop { when: None });
    let config = EngineConfig {
        defaults: clipdeck_core::ClipDefaults {
            fade_out_seconds: 0.2,
            ..clipdeck_core::ClipDefaults::default()
        },
        ..EngineConfig::default()
    };

    let render_start = Instant::now();
    let rendered = render_clip(&config, buffer, &script, 480_000).expect("render should succeed");
    let render_elapsed_ms = render_start.elapsed().as_millis();

    assert_eq!(rendered.frames(), 480_000);
    assert!(rendered.samples.iter().any(|sample| *sample != 0.0));
    assert!(
        render_elapsed_ms <= max_render_ms,
        "render regression: {}ms exceeded budget {}ms",
        render_elapsed_ms,
        max_render_ms
    );
}
