//! Playback lifecycle and its clock-driven transitions.
//!
//! The transport owns the scheduling deadlines and the playhead counters. It is
//! driven from the processor: commands call the edge methods, and every block
//! asks [`Transport::classify`] whether the block produces audio.

use serde::{Deserialize, Serialize};

use crate::{
    messages::{Notification, NotificationSink, StartOptions},
    time::{samples_to_seconds, seconds_to_samples},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    Initial,
    Scheduled,
    Started,
    Paused,
    Stopped,
    Ended,
    Disposed,
}

impl PlaybackState {
    /// Whether `self -> to` is one of the allowed lifecycle edges.
    #[must_use]
    pub fn can_transition_to(self, to: PlaybackState) -> bool {
        use PlaybackState::{Disposed, Ended, Paused, Scheduled, Started, Stopped};

        match (self, to) {
            (Disposed, _) => false,
            (_, Disposed | Scheduled) => true,
            edge => matches!(
                edge,
                (Scheduled | Paused, Started)
                    | (Scheduled | Started, Paused)
                    | (Scheduled | Started | Paused, Stopped)
                    | (Started | Stopped, Ended)
            ),
        }
    }

    #[must_use]
    pub fn is_playing(self) -> bool {
        matches!(self, Self::Started | Self::Stopped)
    }
}

/// What a block does, decided once at its start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockClass {
    Silent,
    /// Audio for frames `lead..frame_limit`; the rest of the block is silent.
    Active { lead: usize, frame_limit: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transport {
    state: PlaybackState,
    start_when: f64,
    stop_when: f64,
    pause_when: f64,
    playhead: f64,
    played_samples: u64,
    times_looped: u64,
    duration_samples: Option<u64>,
    /// Playback has reached `Started` since the last schedule.
    started: bool,
}

impl Default for Transport {
    fn default() -> Self {
        Self {
            state: PlaybackState::Initial,
            start_when: 0.0,
            stop_when: f64::INFINITY,
            pause_when: 0.0,
            playhead: 0.0,
            played_samples: 0,
            times_looped: 0,
            duration_samples: None,
            started: false,
        }
    }
}

/// Absorbs rounding noise when a deadline in seconds lands exactly on a sample.
const SAMPLE_EPSILON: f64 = 1e-6;

fn finite_or(value: Option<f64>, fallback: f64) -> f64 {
    value.filter(|value| value.is_finite()).unwrap_or(fallback)
}

/// Frames of a block starting at `now` that lie before `deadline`.
fn frames_until(deadline: f64, now: f64, sample_rate: u32, frames: usize) -> usize {
    if deadline == f64::INFINITY {
        return frames;
    }
    let remaining = ((deadline - now) * f64::from(sample_rate) - SAMPLE_EPSILON).ceil();
    if remaining <= 0.0 {
        0
    } else {
        (remaining as usize).min(frames)
    }
}

fn audible_span(
    lead: usize,
    deadline: f64,
    now: f64,
    sample_rate: u32,
    frames: usize,
) -> BlockClass {
    if lead >= frames {
        return BlockClass::Silent;
    }
    BlockClass::Active {
        lead,
        frame_limit: frames_until(deadline, now, sample_rate, frames).max(lead),
    }
}

impl Transport {
    #[must_use]
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    #[must_use]
    pub fn playhead(&self) -> f64 {
        self.playhead
    }

    pub fn set_playhead(&mut self, playhead: f64) {
        self.playhead = playhead;
    }

    #[must_use]
    pub fn played_samples(&self) -> u64 {
        self.played_samples
    }

    #[must_use]
    pub fn times_looped(&self) -> u64 {
        self.times_looped
    }

    #[must_use]
    pub fn duration_samples(&self) -> Option<u64> {
        self.duration_samples
    }

    #[must_use]
    pub fn start_when(&self) -> f64 {
        self.start_when
    }

    #[must_use]
    pub fn stop_when(&self) -> f64 {
        self.stop_when
    }

    fn transition(&mut self, to: PlaybackState, sink: &mut impl NotificationSink) {
        debug_assert!(
            self.state.can_transition_to(to),
            "illegal transport edge {:?} -> {to:?}",
            self.state
        );
        let from = self.state;
        self.state = to;
        sink.notify(Notification::StateChanged { from, to });
    }

    /// Schedules playback of a buffer of `buffer_len` samples.
    pub fn schedule(
        &mut self,
        options: StartOptions,
        now: f64,
        sample_rate: u32,
        buffer_len: usize,
        looping: bool,
        sink: &mut impl NotificationSink,
    ) {
        if self.state == PlaybackState::Disposed || buffer_len == 0 {
            return;
        }

        let start_when = finite_or(options.when, now);
        let offset = options
            .offset
            .filter(|offset| offset.is_finite())
            .map_or(0, |offset| {
                let samples = (offset * f64::from(sample_rate)).floor() as i64;
                samples.rem_euclid(buffer_len as i64)
            });

        let duration_samples = match options.duration {
            Some(duration) if duration.is_finite() && duration >= 0.0 => {
                Some(seconds_to_samples(duration, sample_rate).round() as u64)
            }
            _ if looping => None,
            _ => Some(buffer_len as u64),
        };

        self.start_when = start_when;
        self.stop_when = duration_samples.map_or(f64::INFINITY, |samples| {
            start_when + samples_to_seconds(samples, sample_rate)
        });
        self.duration_samples = duration_samples;
        self.playhead = offset as f64;
        self.played_samples = 0;
        self.times_looped = 0;
        self.started = false;

        self.transition(PlaybackState::Scheduled, sink);
        sink.notify(Notification::Scheduled);
    }

    /// Requests a stop at `when`, or after the fade-out (`default_delay` seconds) by default.
    pub fn stop(
        &mut self,
        when: Option<f64>,
        now: f64,
        default_delay: f64,
        sink: &mut impl NotificationSink,
    ) {
        let deadline = match self.state {
            PlaybackState::Scheduled | PlaybackState::Started => {
                finite_or(when, now + default_delay.max(0.0))
            }
            // Nothing is audible while paused, so the stop is immediate.
            PlaybackState::Paused => now,
            _ => return,
        };

        self.stop_when = deadline;
        self.transition(PlaybackState::Stopped, sink);
        sink.notify(Notification::Stopped);
    }

    pub fn pause(&mut self, when: Option<f64>, now: f64, sink: &mut impl NotificationSink) {
        if !matches!(
            self.state,
            PlaybackState::Scheduled | PlaybackState::Started
        ) {
            return;
        }

        self.pause_when = finite_or(when, now);
        self.transition(PlaybackState::Paused, sink);
        sink.notify(Notification::Paused);
    }

    pub fn resume(&mut self, when: Option<f64>, now: f64, sink: &mut impl NotificationSink) {
        if self.state != PlaybackState::Paused {
            return;
        }

        let resume_at = finite_or(when, now);
        if !self.started {
            // Paused before the first audible frame: wait for the original start again.
            let start_when = self.start_when.max(resume_at);
            if self.stop_when.is_finite() {
                self.stop_when += start_when - self.start_when;
            }
            self.start_when = start_when;
            self.transition(PlaybackState::Scheduled, sink);
            sink.notify(Notification::Resumed);
            return;
        }

        if self.stop_when.is_finite() {
            self.stop_when += (resume_at - self.pause_when).max(0.0);
        }
        self.start_when = resume_at;
        self.transition(PlaybackState::Started, sink);
        sink.notify(Notification::Resumed);
    }

    /// Enabling the loop while playback is pending or running removes the duration budget.
    pub fn set_looping(&mut self, enabled: bool) {
        if enabled
            && matches!(
                self.state,
                PlaybackState::Scheduled | PlaybackState::Started
            )
        {
            self.stop_when = f64::INFINITY;
            self.duration_samples = None;
        }
    }

    /// Moves to `Ended`. Only valid while playing.
    pub fn finish(&mut self, sink: &mut impl NotificationSink) {
        if !self.state.is_playing() {
            return;
        }

        self.transition(PlaybackState::Ended, sink);
        sink.notify(Notification::Ended);
        self.played_samples = 0;
    }

    /// Returns `true` if this call disposed the transport.
    pub fn dispose(&mut self, sink: &mut impl NotificationSink) -> bool {
        if self.state == PlaybackState::Disposed {
            return false;
        }

        self.transition(PlaybackState::Disposed, sink);
        sink.notify(Notification::Disposed);
        true
    }

    /// Applies time-based transitions for a block starting at `now` and decides
    /// which of its frames are audible. Start, pause and stop deadlines all land
    /// on their exact sample.
    pub fn classify(
        &mut self,
        now: f64,
        frames: usize,
        sample_rate: u32,
        sink: &mut impl NotificationSink,
    ) -> BlockClass {
        let lead = frames_until(self.start_when, now, sample_rate, frames);
        if self.state == PlaybackState::Scheduled && lead < frames {
            self.started = true;
            self.transition(PlaybackState::Started, sink);
            sink.notify(Notification::Started);
        }

        match self.state {
            PlaybackState::Started | PlaybackState::Stopped => {
                if now >= self.stop_when {
                    self.finish(sink);
                    return BlockClass::Silent;
                }
                audible_span(lead, self.stop_when, now, sample_rate, frames)
            }
            PlaybackState::Paused if self.started && now < self.pause_when => {
                let deadline = self.stop_when.min(self.pause_when);
                audible_span(lead, deadline, now, sample_rate, frames)
            }
            _ => BlockClass::Silent,
        }
    }

    /// Records the outcome of a resolved block.
    pub fn advance(&mut self, playhead: f64, frames: usize, loops: u64) {
        self.playhead = playhead;
        self.played_samples += frames as u64;
        self.times_looped += loops;
    }

    /// Samples left before the stop deadline or the end of the duration budget, if a
    /// fade-out of `fade_out` samples should be running at block time `now`.
    #[must_use]
    pub fn fade_out_remaining(&self, now: f64, sample_rate: u32, fade_out: u64) -> Option<u64> {
        match self.state {
            PlaybackState::Stopped if self.stop_when.is_finite() => {
                let remaining =
                    ((self.stop_when - now) * f64::from(sample_rate) + SAMPLE_EPSILON).floor();
                Some(if remaining <= 0.0 { 0 } else { remaining as u64 })
            }
            PlaybackState::Started | PlaybackState::Paused => {
                let duration = self.duration_samples?;
                let window_start = duration.saturating_sub(fade_out);
                (self.played_samples >= window_start)
                    .then(|| duration.saturating_sub(self.played_samples))
            }
            _ => None,
        }
    }
}
