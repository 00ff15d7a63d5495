pub mod buffer;
pub mod config;
pub mod diagnostics;
pub mod dsp;
pub mod error;
pub mod features;
pub mod fixtures;
pub mod handle;
pub mod messages;
pub mod params;
pub mod parity;
pub mod pipeline;
pub mod processor;
pub mod render;
pub mod resolver;
pub mod time;
pub mod transport;

pub use buffer::{AudioBlock, MAX_SOURCE_CHANNELS, SourceBuffer};
pub use config::{ClipDefaults, DiagnosticsConfig, EngineConfig};
pub use diagnostics::{
    TelemetryGuard, init_tracing, init_tracing_from_config, init_tracing_with_options,
};
pub use error::{EngineError, ErrorKind};
pub use features::{Feature, FeatureSet, FeatureToggles};
pub use handle::{HandleStatus, ProcessorHandle, channel};
pub use messages::{Command, FrameTelemetry, Notification, NotificationSink, StartOptions};
pub use params::{BlockParams, ConstantParams, ParamId, ParamValues};
pub use parity::{ParityReport, generate_parity_report};
pub use processor::ClipProcessor;
pub use render::{RenderOutput, RenderScript, TimedNotification, render_clip};
pub use transport::PlaybackState;
