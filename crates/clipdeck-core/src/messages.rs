use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{buffer::SourceBuffer, error::ErrorKind, features::Feature, transport::PlaybackState};

/// Arguments of a start request. Every field is in seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StartOptions {
    /// Absolute clock time; defaults to the time of the next block.
    pub when: Option<f64>,
    /// Start position inside the buffer. Negative values count from the end.
    pub offset: Option<f64>,
    /// Playback budget. Absent or negative means the natural length, or unbounded when looping.
    pub duration: Option<f64>,
}

impl StartOptions {
    #[must_use]
    pub fn at(when: f64) -> Self {
        Self {
            when: Some(when),
            ..Self::default()
        }
    }
}

/// Control messages drained by the processor at the start of every block.
#[derive(Debug, Clone)]
pub enum Command {
    InstallBuffer(Arc<SourceBuffer>),
    Start(StartOptions),
    Stop { when: Option<f64> },
    Pause { when: Option<f64> },
    Resume { when: Option<f64> },
    SetLoop(bool),
    SetLoopBounds { start: Option<f64>, end: Option<f64> },
    SetLoopCrossfade(f64),
    SetFadeIn(f64),
    SetFadeOut(f64),
    /// Absolute playhead in samples, clamped to the installed buffer.
    SetPlayhead(f64),
    ToggleFeature { feature: Feature, enabled: Option<bool> },
    ResetFilters,
    Dispose,
    QueryPlayhead,
}

impl Command {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::InstallBuffer(_) => "install_buffer",
            Self::Start(_) => "start",
            Self::Stop { .. } => "stop",
            Self::Pause { .. } => "pause",
            Self::Resume { .. } => "resume",
            Self::SetLoop(_) => "set_loop",
            Self::SetLoopBounds { .. } => "set_loop_bounds",
            Self::SetLoopCrossfade(_) => "set_loop_crossfade",
            Self::SetFadeIn(_) => "set_fade_in",
            Self::SetFadeOut(_) => "set_fade_out",
            Self::SetPlayhead(_) => "set_playhead",
            Self::ToggleFeature { .. } => "toggle_feature",
            Self::ResetFilters => "reset_filters",
            Self::Dispose => "dispose",
            Self::QueryPlayhead => "query_playhead",
        }
    }
}

/// Per-block telemetry. Delivered on a lossy queue.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameTelemetry {
    pub current_time: f64,
    pub current_frame: u64,
    pub playhead: u64,
    pub processing_millis: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum Notification {
    Scheduled,
    Started,
    Stopped,
    Paused,
    Resumed,
    Ended,
    Looped {
        count: u64,
    },
    Disposed,
    StateChanged {
        from: PlaybackState,
        to: PlaybackState,
    },
    Playhead {
        sample: u64,
    },
    Frame(FrameTelemetry),
    Error(ErrorKind),
}

impl Notification {
    /// Lifecycle notifications, excluding telemetry and state-change bookkeeping.
    #[must_use]
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            Self::Scheduled
                | Self::Started
                | Self::Stopped
                | Self::Paused
                | Self::Resumed
                | Self::Ended
                | Self::Disposed
        )
    }
}

/// Receiver of notifications produced while applying commands or rendering a block.
pub trait NotificationSink {
    fn notify(&mut self, notification: Notification);
}

impl NotificationSink for Vec<Notification> {
    fn notify(&mut self, notification: Notification) {
        self.push(notification);
    }
}
