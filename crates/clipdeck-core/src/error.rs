use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures reported on the control side of the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("command queue is full ({capacity} pending commands)")]
    QueueFull { capacity: usize },
    #[error("processor has been dropped")]
    Disconnected,
    #[error("invalid source buffer: {0}")]
    InvalidBuffer(String),
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<anyhow::Error> for EngineError {
    fn from(value: anyhow::Error) -> Self {
        Self::Config(format!("{value:#}"))
    }
}

/// Recoverable errors raised inside the real-time callback.
///
/// These never unwind across the audio boundary; the processor recovers locally
/// and reports them through [`crate::Notification::Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ErrorKind {
    #[error("start requested before a buffer was installed")]
    NoBuffer,
    #[error("loop bounds {start}..{end} are empty, clamped to a minimum window")]
    InvalidLoopBounds { start: usize, end: usize },
    #[error("{count} non-finite samples were zeroed")]
    NumericInstability { count: usize },
    #[error("sample index {index} is outside a buffer of {len} samples")]
    IndexOutOfBounds { index: usize, len: usize },
}

impl ErrorKind {
    /// Warnings are recovered without any audible change to the transport.
    #[must_use]
    pub fn is_warning(&self) -> bool {
        matches!(self, Self::NumericInstability { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anyhow_errors_convert_to_config_with_context() {
        let error = anyhow::anyhow!("missing field `sample_rate`").context("reading clipdeck.toml");
        match EngineError::from(error) {
            EngineError::Config(message) => {
                assert!(message.contains("reading clipdeck.toml"));
                assert!(message.contains("missing field `sample_rate`"));
            }
            other => panic!("expected a config error, got {other:?}"),
        }
    }
}
