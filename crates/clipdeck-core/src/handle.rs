//! Control-side counterpart of [`ClipProcessor`].

use std::sync::Arc;

use rtrb::{Consumer, Producer, PushError, RingBuffer};
use tracing::{debug, error, info, instrument, trace, warn};

use crate::{
    buffer::SourceBuffer,
    config::EngineConfig,
    error::EngineError,
    features::Feature,
    messages::{Command, FrameTelemetry, Notification, StartOptions},
    processor::{ClipProcessor, Outbox},
    transport::PlaybackState,
};

/// Creates a connected processor and control handle.
#[instrument(skip(config), fields(sample_rate = config.sample_rate, block_size = config.block_size))]
pub fn channel(config: &EngineConfig) -> (ClipProcessor, ProcessorHandle) {
    let (command_tx, command_rx) = RingBuffer::<Command>::new(config.command_capacity.max(1));
    let (event_tx, event_rx) = RingBuffer::<Notification>::new(config.event_capacity.max(1));
    let (telemetry_tx, telemetry_rx) =
        RingBuffer::<FrameTelemetry>::new(config.telemetry_capacity.max(1));
    let (retired_tx, retired_rx) =
        RingBuffer::<Arc<SourceBuffer>>::new(config.retired_capacity.max(1));

    let outbox = Outbox::new(event_tx, config.event_backlog, telemetry_tx, retired_tx);
    let processor = ClipProcessor::new(config, command_rx, outbox);
    let handle = ProcessorHandle {
        commands: command_tx,
        events: event_rx,
        telemetry: telemetry_rx,
        retired: retired_rx,
        sample_rate: config.sample_rate.max(1),
        block_millis: config.block_millis(),
        status: HandleStatus::default(),
    };

    debug!("processor channel created");
    (processor, handle)
}

/// Last state reported by the processor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HandleStatus {
    pub state: PlaybackState,
    pub playhead: u64,
    pub times_looped: u64,
    pub last_frame: Option<FrameTelemetry>,
    /// Processing time of the last block relative to its real-time duration.
    pub load: f64,
}

impl Default for HandleStatus {
    fn default() -> Self {
        Self {
            state: PlaybackState::Initial,
            playhead: 0,
            times_looped: 0,
            last_frame: None,
            load: 0.0,
        }
    }
}

pub struct ProcessorHandle {
    commands: Producer<Command>,
    events: Consumer<Notification>,
    telemetry: Consumer<FrameTelemetry>,
    retired: Consumer<Arc<SourceBuffer>>,
    sample_rate: u32,
    block_millis: f64,
    status: HandleStatus,
}

impl ProcessorHandle {
    #[must_use]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[must_use]
    pub fn status(&self) -> HandleStatus {
        self.status
    }

    #[must_use]
    pub fn state(&self) -> PlaybackState {
        self.status.state
    }

    #[must_use]
    pub fn playhead(&self) -> u64 {
        self.status.playhead
    }

    #[must_use]
    pub fn times_looped(&self) -> u64 {
        self.status.times_looped
    }

    #[must_use]
    pub fn load(&self) -> f64 {
        self.status.load
    }

    /// Enqueues a command for the next block.
    pub fn send(&mut self, command: Command) -> Result<(), EngineError> {
        if self.commands.is_abandoned() {
            return Err(EngineError::Disconnected);
        }

        let name = command.name();
        match self.commands.push(command) {
            Ok(()) => {
                trace!(command = name, "command queued");
                Ok(())
            }
            Err(PushError::Full(_)) => {
                let capacity = self.commands.buffer().capacity();
                warn!(command = name, capacity, "command queue full");
                Err(EngineError::QueueFull { capacity })
            }
        }
    }

    #[instrument(skip(self, buffer), fields(frames = buffer.len(), channels = buffer.channel_count()))]
    pub fn install_buffer(&mut self, buffer: SourceBuffer) -> Result<Arc<SourceBuffer>, EngineError> {
        let buffer = Arc::new(buffer);
        self.send(Command::InstallBuffer(Arc::clone(&buffer)))?;
        info!("source buffer queued");
        Ok(buffer)
    }

    pub fn start(&mut self, options: StartOptions) -> Result<(), EngineError> {
        self.send(Command::Start(options))
    }

    pub fn stop(&mut self, when: Option<f64>) -> Result<(), EngineError> {
        self.send(Command::Stop { when })
    }

    pub fn pause(&mut self, when: Option<f64>) -> Result<(), EngineError> {
        self.send(Command::Pause { when })
    }

    pub fn resume(&mut self, when: Option<f64>) -> Result<(), EngineError> {
        self.send(Command::Resume { when })
    }

    pub fn set_loop(&mut self, enabled: bool) -> Result<(), EngineError> {
        self.send(Command::SetLoop(enabled))
    }

    pub fn set_loop_bounds(
        &mut self,
        start: Option<f64>,
        end: Option<f64>,
    ) -> Result<(), EngineError> {
        self.send(Command::SetLoopBounds { start, end })
    }

    pub fn set_loop_crossfade(&mut self, seconds: f64) -> Result<(), EngineError> {
        self.send(Command::SetLoopCrossfade(seconds))
    }

    pub fn set_fade_in(&mut self, seconds: f64) -> Result<(), EngineError> {
        self.send(Command::SetFadeIn(seconds))
    }

    pub fn set_fade_out(&mut self, seconds: f64) -> Result<(), EngineError> {
        self.send(Command::SetFadeOut(seconds))
    }

    pub fn set_playhead(&mut self, sample: f64) -> Result<(), EngineError> {
        self.send(Command::SetPlayhead(sample))
    }

    pub fn toggle_feature(
        &mut self,
        feature: Feature,
        enabled: Option<bool>,
    ) -> Result<(), EngineError> {
        self.send(Command::ToggleFeature { feature, enabled })
    }

    pub fn reset_filters(&mut self) -> Result<(), EngineError> {
        self.send(Command::ResetFilters)
    }

    pub fn dispose(&mut self) -> Result<(), EngineError> {
        self.send(Command::Dispose)
    }

    pub fn query_playhead(&mut self) -> Result<(), EngineError> {
        self.send(Command::QueryPlayhead)
    }

    /// Drains pending notifications into `out` and updates the mirrored status.
    /// Returns how many were appended.
    pub fn drain_notifications(&mut self, out: &mut Vec<Notification>) -> usize {
        let mut drained = 0;
        while let Ok(notification) = self.events.pop() {
            self.observe(notification);
            out.push(notification);
            drained += 1;
        }
        drained
    }

    #[must_use]
    pub fn poll_notifications(&mut self) -> Vec<Notification> {
        let mut out = Vec::new();
        self.drain_notifications(&mut out);
        out
    }

    /// Drains telemetry and returns the most recent frame, if any arrived.
    pub fn poll_telemetry(&mut self) -> Option<FrameTelemetry> {
        let mut latest = None;
        while let Ok(frame) = self.telemetry.pop() {
            latest = Some(frame);
        }

        if let Some(frame) = latest {
            self.status.last_frame = Some(frame);
            self.status.playhead = frame.playhead;
            self.status.load = if self.block_millis > 0.0 {
                frame.processing_millis / self.block_millis
            } else {
                0.0
            };
        }
        latest
    }

    /// Frees buffers the processor has swapped out. Returns how many were released.
    pub fn reclaim_retired(&mut self) -> usize {
        let mut released = 0;
        while let Ok(buffer) = self.retired.pop() {
            drop(buffer);
            released += 1;
        }
        if released > 0 {
            debug!(released, "retired buffers reclaimed");
        }
        released
    }

    fn observe(&mut self, notification: Notification) {
        match notification {
            Notification::StateChanged { from, to } => {
                debug!(?from, ?to, "processor state changed");
                self.status.state = to;
            }
            Notification::Looped { count } => {
                trace!(count, "loop wrapped");
                self.status.times_looped = count;
            }
            Notification::Scheduled => self.status.times_looped = 0,
            Notification::Playhead { sample } => self.status.playhead = sample,
            Notification::Error(kind) if kind.is_warning() => warn!(%kind, "processor warning"),
            Notification::Error(kind) => error!(%kind, "processor error"),
            Notification::Frame(frame) => self.status.last_frame = Some(frame),
            other if other.is_lifecycle() => info!(event = ?other, "processor event"),
            _ => {}
        }
    }
}
