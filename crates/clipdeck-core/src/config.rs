use std::{
    env, fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{error::EngineError, features::FeatureToggles};

pub const CONFIG_FILE_NAME: &str = "clipdeck.config.toml";
pub const CONFIG_PATH_ENV: &str = "CLIPDECK_CONFIG_PATH";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub sample_rate: u32,
    /// Frames per internal quantum. Host blocks larger than this are split.
    pub block_size: usize,
    pub output_channels: usize,
    pub command_capacity: usize,
    pub event_capacity: usize,
    /// Notifications held inside the processor while the event queue is full.
    pub event_backlog: usize,
    pub telemetry_capacity: usize,
    pub retired_capacity: usize,
    pub defaults: ClipDefaults,
    pub diagnostics: DiagnosticsConfig,
}

/// Initial clip settings applied when a processor is created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClipDefaults {
    pub loop_enabled: bool,
    pub loop_start_seconds: Option<f64>,
    pub loop_end_seconds: Option<f64>,
    pub fade_in_seconds: f64,
    pub fade_out_seconds: f64,
    pub loop_crossfade_seconds: f64,
    pub features: FeatureToggles,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DiagnosticsConfig {
    pub rust_log_filter: String,
    pub trace_file_prefix: String,
    pub log_dir: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            block_size: 128,
            output_channels: 2,
            command_capacity: 256,
            event_capacity: 256,
            event_backlog: 1_024,
            telemetry_capacity: 64,
            retired_capacity: 8,
            defaults: ClipDefaults::default(),
            diagnostics: DiagnosticsConfig::default(),
        }
    }
}

impl Default for ClipDefaults {
    fn default() -> Self {
        Self {
            loop_enabled: false,
            loop_start_seconds: None,
            loop_end_seconds: None,
            fade_in_seconds: 0.0,
            fade_out_seconds: 0.0,
            loop_crossfade_seconds: 0.0,
            features: FeatureToggles::default(),
        }
    }
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            rust_log_filter: crate::diagnostics::DEFAULT_FILTER.to_string(),
            trace_file_prefix: "clipdeck".to_string(),
            log_dir: PathBuf::from("logs"),
        }
    }
}

impl EngineConfig {
    /// Loads the config file found through [`CONFIG_PATH_ENV`] or next to the
    /// working directory.
    pub fn load() -> Result<Self> {
        let config_path = discover_config_path().with_context(|| {
            format!("failed to locate {CONFIG_FILE_NAME}; looked in cwd and parent directory")
        })?;
        Self::load_from(&config_path)
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;

        let config: EngineConfig = toml::from_str(&content)
            .with_context(|| format!("failed to parse config TOML from {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("invalid config in {}", path.display()))?;

        Ok(config)
    }

    /// Loads the discovered config file, or falls back to defaults when none exists.
    pub fn load_or_default() -> Result<Self> {
        match discover_config_path() {
            Ok(path) => Self::load_from(path),
            Err(_) => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.sample_rate == 0 {
            return Err(EngineError::Config("sample_rate must be positive".to_string()));
        }
        if self.block_size == 0 {
            return Err(EngineError::Config("block_size must be positive".to_string()));
        }
        if !matches!(self.output_channels, 1 | 2) {
            return Err(EngineError::Config(format!(
                "output_channels must be 1 or 2, got {}",
                self.output_channels
            )));
        }

        let capacities = [
            ("command_capacity", self.command_capacity),
            ("event_capacity", self.event_capacity),
            ("telemetry_capacity", self.telemetry_capacity),
            ("retired_capacity", self.retired_capacity),
        ];
        if let Some((name, _)) = capacities.iter().find(|(_, capacity)| *capacity == 0) {
            return Err(EngineError::Config(format!("{name} must be positive")));
        }

        let durations = [
            ("fade_in_seconds", self.defaults.fade_in_seconds),
            ("fade_out_seconds", self.defaults.fade_out_seconds),
            ("loop_crossfade_seconds", self.defaults.loop_crossfade_seconds),
        ];
        if let Some((name, value)) = durations
            .iter()
            .find(|(_, value)| !value.is_finite() || *value < 0.0)
        {
            return Err(EngineError::Config(format!(
                "{name} must be a non-negative number, got {value}"
            )));
        }

        Ok(())
    }

    /// Duration of one internal quantum in milliseconds.
    #[must_use]
    pub fn block_millis(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.block_size as f64 * 1_000.0 / f64::from(self.sample_rate)
    }
}

fn discover_config_path() -> Result<PathBuf> {
    if let Some(path) = env::var_os(CONFIG_PATH_ENV) {
        let path = PathBuf::from(path);
        if path.is_file() {
            return Ok(path);
        }
    }

    let cwd = env::current_dir().context("failed to resolve current directory")?;
    let candidates = [
        cwd.join(CONFIG_FILE_NAME),
        cwd.join("..").join(CONFIG_FILE_NAME),
    ];

    candidates
        .into_iter()
        .find(|path| path.is_file())
        .ok_or_else(|| anyhow::anyhow!("{CONFIG_FILE_NAME} not found"))
}
