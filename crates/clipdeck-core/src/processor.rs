//! The real-time side of the engine.
//!
//! [`ClipProcessor::process`] is called once per audio callback. It never locks,
//! logs or allocates: commands arrive through a wait-free queue, notifications
//! leave through another, and every scratch buffer is sized up front from
//! [`EngineConfig::block_size`].

use std::{collections::VecDeque, sync::Arc, time::Instant};

use rtrb::{Consumer, Producer, PushError};

use crate::{
    buffer::{AudioBlock, MAX_SOURCE_CHANNELS, SourceBuffer},
    config::EngineConfig,
    dsp::{CrossfadePlan, FadeRamp, sanitize},
    error::ErrorKind,
    features::{Feature, FeatureSet},
    messages::{Command, FrameTelemetry, Notification, NotificationSink},
    params::BlockParams,
    pipeline::{Pipeline, StageContext},
    resolver::{LoopRegion, PlayheadResolver, ResolveRequest},
    time::{frame_to_seconds, seconds_to_samples},
    transport::{BlockClass, PlaybackState, Transport},
};

/// Outbound queues of the processor.
pub(crate) struct Outbox {
    events: Producer<Notification>,
    backlog: VecDeque<Notification>,
    backlog_limit: usize,
    telemetry: Producer<FrameTelemetry>,
    retired: Producer<Arc<SourceBuffer>>,
    dropped: u64,
}

impl Outbox {
    pub(crate) fn new(
        events: Producer<Notification>,
        backlog: usize,
        telemetry: Producer<FrameTelemetry>,
        retired: Producer<Arc<SourceBuffer>>,
    ) -> Self {
        Self {
            events,
            backlog: VecDeque::with_capacity(backlog),
            backlog_limit: backlog,
            telemetry,
            retired,
            dropped: 0,
        }
    }

    /// Retries held notifications in order until the queue fills up again.
    fn flush(&mut self) {
        while let Some(notification) = self.backlog.front().copied() {
            if self.events.push(notification).is_err() {
                break;
            }
            self.backlog.pop_front();
        }
    }

    fn publish_frame(&mut self, frame: FrameTelemetry) {
        // Telemetry is lossy; a full queue drops the frame.
        let _ = self.telemetry.push(frame);
    }

    fn retire(&mut self, buffer: Arc<SourceBuffer>) {
        // A full return queue frees the buffer on this thread instead.
        let _ = self.retired.push(buffer);
    }
}

impl NotificationSink for Outbox {
    fn notify(&mut self, notification: Notification) {
        let pending = if self.backlog.is_empty() {
            match self.events.push(notification) {
                Ok(()) => return,
                Err(PushError::Full(notification)) => notification,
            }
        } else {
            notification
        };

        if self.backlog.len() < self.backlog_limit {
            self.backlog.push_back(pending);
        } else {
            self.dropped += 1;
        }
    }
}

/// Loop settings in samples. Bounds are kept as requested and clamped against
/// the installed buffer whenever they are used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct LoopSettings {
    enabled: bool,
    start: Option<usize>,
    end: Option<usize>,
    crossfade_samples: usize,
}

impl LoopSettings {
    fn region(&self, buffer_len: usize) -> (LoopRegion, Option<ErrorKind>) {
        let start = self.start.unwrap_or(0).min(buffer_len);
        let end = self.end.unwrap_or(buffer_len).min(buffer_len);
        if start < end {
            return (LoopRegion { start, end }, None);
        }

        let fixed_start = start.min(buffer_len.saturating_sub(1));
        (
            LoopRegion {
                start: fixed_start,
                end: fixed_start + 1,
            },
            Some(ErrorKind::InvalidLoopBounds { start, end }),
        )
    }
}

fn seconds_to_count(seconds: f64, sample_rate: u32) -> usize {
    seconds_to_samples(seconds, sample_rate).round() as usize
}

pub struct ClipProcessor {
    sample_rate: u32,
    block_size: usize,
    output_channels: usize,
    commands: Consumer<Command>,
    outbox: Outbox,
    buffer: Option<Arc<SourceBuffer>>,
    transport: Transport,
    looping: LoopSettings,
    fade_in_samples: u64,
    fade_out_samples: u64,
    features: FeatureSet,
    resolver: PlayheadResolver,
    pipeline: Pipeline,
    scratch: AudioBlock,
}

impl ClipProcessor {
    pub(crate) fn new(config: &EngineConfig, commands: Consumer<Command>, outbox: Outbox) -> Self {
        let sample_rate = config.sample_rate.max(1);
        let block_size = config.block_size.max(1);
        let defaults = &config.defaults;

        Self {
            sample_rate,
            block_size,
            output_channels: config.output_channels.clamp(1, MAX_SOURCE_CHANNELS),
            commands,
            outbox,
            buffer: None,
            transport: Transport::default(),
            looping: LoopSettings {
                enabled: defaults.loop_enabled,
                start: defaults
                    .loop_start_seconds
                    .map(|seconds| seconds_to_count(seconds, sample_rate)),
                end: defaults
                    .loop_end_seconds
                    .map(|seconds| seconds_to_count(seconds, sample_rate)),
                crossfade_samples: seconds_to_count(defaults.loop_crossfade_seconds, sample_rate),
            },
            fade_in_samples: seconds_to_count(defaults.fade_in_seconds, sample_rate) as u64,
            fade_out_samples: seconds_to_count(defaults.fade_out_seconds, sample_rate) as u64,
            features: FeatureSet::from(defaults.features),
            resolver: PlayheadResolver::with_capacity(block_size),
            pipeline: Pipeline::new(sample_rate),
            scratch: AudioBlock::new(MAX_SOURCE_CHANNELS, block_size),
        }
    }

    #[must_use]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[must_use]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    #[must_use]
    pub fn state(&self) -> PlaybackState {
        self.transport.state()
    }

    #[must_use]
    pub fn playhead(&self) -> f64 {
        self.transport.playhead()
    }

    #[must_use]
    pub fn features(&self) -> FeatureSet {
        self.features
    }

    /// Notifications lost because both the queue and the backlog were full.
    #[must_use]
    pub fn dropped_notifications(&self) -> u64 {
        self.outbox.dropped
    }

    /// Renders one host block into `outputs`, which all share the first bus's frame count.
    ///
    /// `current_frame` is the audio clock position of the first frame. Returns
    /// `false` once the processor has been disposed.
    pub fn process(
        &mut self,
        current_frame: u64,
        params: &BlockParams<'_>,
        outputs: &mut [AudioBlock],
    ) -> bool {
        let started_at = Instant::now();
        let now = frame_to_seconds(current_frame, self.sample_rate);

        self.outbox.flush();
        while let Ok(command) = self.commands.pop() {
            self.apply_command(command, now);
        }

        let Some((first, rest)) = outputs.split_first_mut() else {
            return self.transport.state() != PlaybackState::Disposed;
        };
        first.fill_silence();

        if self.transport.state() == PlaybackState::Disposed {
            for output in rest {
                output.fill_silence();
            }
            return false;
        }

        let frames = first.frames();
        let mut offset = 0;
        while offset < frames {
            let len = (frames - offset).min(self.block_size);
            let slice_now = frame_to_seconds(current_frame + offset as u64, self.sample_rate);
            let slice_params = params.slice_from(offset);
            let (lead, channels) = self.render_slice(slice_now, &slice_params, len);
            write_slice(&self.scratch, first, offset + lead, len - lead, channels);
            offset += len;
        }

        let replaced: usize = first
            .channels_mut()
            .iter_mut()
            .map(|channel| sanitize(channel))
            .sum();
        if replaced > 0 {
            self.outbox.notify(Notification::Error(
                ErrorKind::NumericInstability { count: replaced },
            ));
        }

        for output in rest {
            output.copy_from(first);
        }

        self.outbox.publish_frame(FrameTelemetry {
            current_time: now,
            current_frame,
            playhead: self.transport.playhead().max(0.0).floor() as u64,
            processing_millis: started_at.elapsed().as_secs_f64() * 1_000.0,
        });

        true
    }

    /// Renders up to `block_size` frames into the scratch block. Returns the
    /// silent frames that precede the rendered audio in the slice, and how many
    /// scratch channels carry signal.
    fn render_slice(
        &mut self,
        slice_now: f64,
        slice_params: &BlockParams<'_>,
        len: usize,
    ) -> (usize, usize) {
        self.scratch.fill_silence();
        self.resolver.clear();

        let class = self
            .transport
            .classify(slice_now, len, self.sample_rate, &mut self.outbox);
        let BlockClass::Active { lead, frame_limit } = class else {
            return (0, 0);
        };
        let Some(buffer) = self.buffer.as_deref() else {
            return (0, 0);
        };
        if frame_limit <= lead {
            return (0, 0);
        }

        let now = slice_now + lead as f64 / f64::from(self.sample_rate);
        let params = &slice_params.slice_from(lead);

        let buffer_len = buffer.len();
        let region = self
            .looping
            .enabled
            .then(|| self.looping.region(buffer_len).0);
        let played_before = self.transport.played_samples();
        let wrapped_before = self.transport.times_looped() > 0;

        let resolution = self.resolver.resolve(&ResolveRequest {
            playhead: self.transport.playhead(),
            frames: frame_limit - lead,
            buffer_len,
            loop_region: region,
            played_samples: played_before,
            duration_samples: self.transport.duration_samples(),
            playback_rate: self
                .features
                .is_enabled(Feature::PlaybackRate)
                .then_some(params.playback_rate),
            detune: self
                .features
                .is_enabled(Feature::Detune)
                .then_some(params.detune),
        });
        let frames = self.resolver.frames();
        let produced = frames.len();

        let source_channels = buffer.channel_count();
        for (channel_index, channel) in self
            .scratch
            .channels_mut()
            .iter_mut()
            .enumerate()
            .take(source_channels)
        {
            let source = buffer.channel(channel_index);
            for (sample, frame) in channel.iter_mut().zip(frames) {
                *sample = source[frame.index];
            }
        }

        let fade_in = if self.features.is_enabled(Feature::FadeIn) {
            FadeRamp::fade_in(self.fade_in_samples, played_before)
        } else {
            None
        };
        let fade_out = if self.features.is_enabled(Feature::FadeOut) {
            self.transport
                .fade_out_remaining(now, self.sample_rate, self.fade_out_samples)
                .and_then(|remaining| FadeRamp::fade_out(self.fade_out_samples, remaining))
        } else {
            None
        };
        let crossfade = region.and_then(|region| {
            CrossfadePlan::new(
                region,
                buffer_len,
                self.looping.crossfade_samples,
                wrapped_before,
                resolution.first_wrap,
            )
        });

        let ctx = StageContext {
            params: *params,
            source: buffer,
            frames,
            output_channels: self.output_channels,
            crossfade,
            fade_in,
            fade_out,
        };
        self.pipeline
            .run(&mut self.scratch, produced, &ctx, self.features);

        if let Some(fault) = self.pipeline.take_fault() {
            self.outbox.notify(Notification::Error(fault));
        }

        let loops_before = self.transport.times_looped();
        self.transport
            .advance(resolution.playhead, produced, resolution.wraps);
        for wrap in 1..=resolution.wraps {
            self.outbox.notify(Notification::Looped {
                count: loops_before + wrap,
            });
        }

        if resolution.ended && self.transport.state().is_playing() {
            self.transport.finish(&mut self.outbox);
        }

        (lead, source_channels)
    }

    fn apply_command(&mut self, command: Command, now: f64) {
        if self.transport.state() == PlaybackState::Disposed {
            if let Command::InstallBuffer(buffer) = command {
                self.outbox.retire(buffer);
            }
            return;
        }

        match command {
            Command::InstallBuffer(buffer) => {
                if let Some(previous) = self.buffer.replace(buffer) {
                    self.outbox.retire(previous);
                }
            }
            Command::Start(options) => {
                let Some(buffer_len) = self.buffer.as_deref().map(SourceBuffer::len) else {
                    self.outbox.notify(Notification::Error(ErrorKind::NoBuffer));
                    return;
                };
                if self.looping.enabled {
                    self.report_loop_bounds(buffer_len);
                }
                self.transport.schedule(
                    options,
                    now,
                    self.sample_rate,
                    buffer_len,
                    self.looping.enabled,
                    &mut self.outbox,
                );
            }
            Command::Stop { when } => {
                let fade_seconds = if self.features.is_enabled(Feature::FadeOut) {
                    self.fade_out_samples as f64 / f64::from(self.sample_rate)
                } else {
                    0.0
                };
                self.transport
                    .stop(when, now, fade_seconds, &mut self.outbox);
            }
            Command::Pause { when } => self.transport.pause(when, now, &mut self.outbox),
            Command::Resume { when } => self.transport.resume(when, now, &mut self.outbox),
            Command::SetLoop(enabled) => {
                self.looping.enabled = enabled;
                self.transport.set_looping(enabled);
            }
            Command::SetLoopBounds { start, end } => {
                if let Some(start) = start {
                    self.looping.start = Some(seconds_to_count(start, self.sample_rate));
                }
                if let Some(end) = end {
                    self.looping.end = Some(seconds_to_count(end, self.sample_rate));
                }
                if let Some(buffer_len) = self.buffer.as_deref().map(SourceBuffer::len) {
                    self.report_loop_bounds(buffer_len);
                }
            }
            Command::SetLoopCrossfade(seconds) => {
                self.looping.crossfade_samples = seconds_to_count(seconds, self.sample_rate);
            }
            Command::SetFadeIn(seconds) => {
                self.fade_in_samples = seconds_to_count(seconds, self.sample_rate) as u64;
            }
            Command::SetFadeOut(seconds) => {
                self.fade_out_samples = seconds_to_count(seconds, self.sample_rate) as u64;
            }
            Command::SetPlayhead(sample) => {
                let upper = self
                    .buffer
                    .as_deref()
                    .map_or(f64::MAX, |buffer| buffer.len() as f64);
                let sample = if sample.is_finite() { sample } else { 0.0 };
                self.transport.set_playhead(sample.clamp(0.0, upper));
            }
            Command::ToggleFeature { feature, enabled } => {
                self.features.toggle(feature, enabled);
            }
            Command::ResetFilters => self.pipeline.reset_filters(),
            Command::Dispose => {
                if self.transport.dispose(&mut self.outbox) {
                    if let Some(buffer) = self.buffer.take() {
                        self.outbox.retire(buffer);
                    }
                    self.pipeline.reset_filters();
                }
            }
            Command::QueryPlayhead => {
                let sample = self.transport.playhead().max(0.0).floor() as u64;
                self.outbox.notify(Notification::Playhead { sample });
            }
        }
    }

    fn report_loop_bounds(&mut self, buffer_len: usize) {
        if let (_, Some(error)) = self.looping.region(buffer_len) {
            self.outbox.notify(Notification::Error(error));
        }
    }
}

/// Copies `len` rendered frames into the output bus at `offset`, folding stereo
/// down to mono for single-channel outputs.
fn write_slice(
    scratch: &AudioBlock,
    output: &mut AudioBlock,
    offset: usize,
    len: usize,
    channels: usize,
) {
    if channels == 0 {
        return;
    }

    let range = offset..offset + len;
    if output.channel_count() == 1 {
        let target = &mut output.channel_mut(0)[range];
        if channels >= 2 {
            let (left, right) = (scratch.channel(0), scratch.channel(1));
            for (frame, sample) in target.iter_mut().enumerate() {
                *sample = 0.5 * (left[frame] + right[frame]);
            }
        } else {
            target.copy_from_slice(&scratch.channel(0)[..len]);
        }
        return;
    }

    for channel_index in 0..output.channel_count().min(MAX_SOURCE_CHANNELS) {
        output.channel_mut(channel_index)[range.clone()]
            .copy_from_slice(&scratch.channel(channel_index)[..len]);
    }
}
