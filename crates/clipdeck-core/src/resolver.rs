//! Turns the fractional playhead into the list of source indices for one block.
//!
//! Playback is nearest-sample: each output frame reads `floor(playhead)` and the
//! playhead then advances by the instantaneous rate. Loop wraps and the end of
//! material are detected here; everything downstream only sees indices.

use crate::{params::ParamValues, time::cents_to_ratio};

/// Half-open loop window `[start, end)` in samples, already clamped to the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopRegion {
    pub start: usize,
    pub end: usize,
}

impl LoopRegion {
    #[must_use]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    #[must_use]
    pub fn contains(&self, index: usize) -> bool {
        (self.start..self.end).contains(&index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedFrame {
    pub index: usize,
    pub reverse: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct ResolveRequest<'a> {
    pub playhead: f64,
    /// Upper bound on frames to resolve for this block.
    pub frames: usize,
    pub buffer_len: usize,
    pub loop_region: Option<LoopRegion>,
    pub played_samples: u64,
    pub duration_samples: Option<u64>,
    pub playback_rate: Option<ParamValues<'a>>,
    pub detune: Option<ParamValues<'a>>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolution {
    pub playhead: f64,
    pub ended: bool,
    pub wraps: u64,
    /// Position in the block of the first frame played after a wrap.
    pub first_wrap: Option<usize>,
}

#[derive(Debug)]
pub struct PlayheadResolver {
    frames: Vec<ResolvedFrame>,
}

impl PlayheadResolver {
    #[must_use]
    pub fn with_capacity(frames: usize) -> Self {
        Self {
            frames: Vec::with_capacity(frames),
        }
    }

    /// Frames produced by the last call to [`PlayheadResolver::resolve`].
    #[must_use]
    pub fn frames(&self) -> &[ResolvedFrame] {
        &self.frames
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }

    pub fn resolve(&mut self, request: &ResolveRequest<'_>) -> Resolution {
        debug_assert!(request.frames <= self.frames.capacity());
        self.frames.clear();

        let frame_limit = request.frames.min(self.frames.capacity());
        let detune_ratio = match request.detune {
            None => Some(1.0),
            Some(values) => values.as_constant().map(cents_to_ratio),
        };
        let len = request.buffer_len as f64;
        let region = request.loop_region.filter(|region| !region.is_empty());

        let mut playhead = request.playhead;
        let mut played = request.played_samples;
        let mut wraps = 0_u64;
        let mut first_wrap = None;
        let mut ended = false;

        for frame in 0..frame_limit {
            if request.duration_samples.is_some_and(|budget| played >= budget) {
                ended = true;
                break;
            }

            let rate = frame_rate(request, frame, detune_ratio);

            if let Some(region) = region {
                let start = region.start as f64;
                let end = region.end as f64;
                let outside_buffer = playhead < 0.0 || playhead >= len;
                let crossed = (rate >= 0.0 && playhead >= end) || (rate < 0.0 && playhead < start);
                if crossed || outside_buffer {
                    let mut wrapped = start + (playhead - start).rem_euclid(end - start);
                    if wrapped >= end {
                        wrapped = start;
                    }
                    playhead = wrapped;
                    if crossed {
                        wraps += 1;
                        first_wrap.get_or_insert(frame);
                    }
                }
            } else if playhead < 0.0 || playhead >= len {
                ended = true;
                break;
            }

            self.frames.push(ResolvedFrame {
                index: (playhead.floor() as usize).min(request.buffer_len.saturating_sub(1)),
                reverse: rate < 0.0,
            });
            played += 1;
            playhead += rate;

            let out_of_material = region.is_none() && (playhead < 0.0 || playhead >= len);
            let out_of_budget = request
                .duration_samples
                .is_some_and(|budget| played >= budget);
            if out_of_material || out_of_budget {
                ended = true;
                break;
            }
        }

        Resolution {
            playhead,
            ended,
            wraps,
            first_wrap,
        }
    }
}

fn frame_rate(request: &ResolveRequest<'_>, frame: usize, detune_ratio: Option<f64>) -> f64 {
    let rate = request
        .playback_rate
        .map_or(1.0, |values| f64::from(values.at(frame, 1.0)));
    let detune = detune_ratio.unwrap_or_else(|| {
        request
            .detune
            .map_or(1.0, |values| cents_to_ratio(values.at(frame, 0.0)))
    });
    let rate = rate * detune;
    if rate.is_finite() { rate } else { 1.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(playhead: f64, frames: usize, buffer_len: usize) -> ResolveRequest<'static> {
        ResolveRequest {
            playhead,
            frames,
            buffer_len,
            loop_region: None,
            played_samples: 0,
            duration_samples: None,
            playback_rate: None,
            detune: None,
        }
    }

    fn indices(resolver: &PlayheadResolver) -> Vec<usize> {
        resolver.frames().iter().map(|frame| frame.index).collect()
    }

    #[test]
    fn forward_playback_ends_on_the_last_sample() {
        let mut resolver = PlayheadResolver::with_capacity(8);
        let resolution = resolver.resolve(&request(0.0, 8, 5));
        assert_eq!(indices(&resolver), vec![0, 1, 2, 3, 4]);
        assert!(resolution.ended);
    }

    #[test]
    fn last_sample_in_block_reports_end_eagerly() {
        let mut resolver = PlayheadResolver::with_capacity(4);
        let resolution = resolver.resolve(&request(0.0, 4, 4));
        assert_eq!(indices(&resolver), vec![0, 1, 2, 3]);
        assert!(resolution.ended);
    }

    #[test]
    fn loop_wraps_once_per_pass() {
        let mut resolver = PlayheadResolver::with_capacity(16);
        let resolution = resolver.resolve(&ResolveRequest {
            loop_region: Some(LoopRegion { start: 2, end: 6 }),
            ..request(0.0, 16, 10)
        });
        assert_eq!(
            indices(&resolver),
            vec![0, 1, 2, 3, 4, 5, 2, 3, 4, 5, 2, 3, 4, 5, 2, 3]
        );
        assert_eq!(resolution.wraps, 3);
        assert_eq!(resolution.first_wrap, Some(6));
        assert!(!resolution.ended);
    }

    #[test]
    fn reverse_loop_wraps_below_start() {
        let rates = [-1.0_f32];
        let mut resolver = PlayheadResolver::with_capacity(6);
        let resolution = resolver.resolve(&ResolveRequest {
            loop_region: Some(LoopRegion { start: 2, end: 5 }),
            playback_rate: Some(ParamValues::PerFrame(&rates)),
            ..request(3.0, 6, 10)
        });
        assert_eq!(indices(&resolver), vec![3, 2, 4, 3, 2, 4]);
        assert!(resolver.frames().iter().all(|frame| frame.reverse));
        assert_eq!(resolution.wraps, 2);
    }

    #[test]
    fn duration_budget_limits_frames() {
        let mut resolver = PlayheadResolver::with_capacity(8);
        let resolution = resolver.resolve(&ResolveRequest {
            played_samples: 5,
            duration_samples: Some(8),
            ..request(0.0, 8, 100)
        });
        assert_eq!(resolver.frames().len(), 3);
        assert!(resolution.ended);
    }

    #[test]
    fn octave_detune_doubles_the_step() {
        let mut resolver = PlayheadResolver::with_capacity(4);
        resolver.resolve(&ResolveRequest {
            detune: Some(ParamValues::Constant(1_200.0)),
            ..request(0.0, 4, 100)
        });
        assert_eq!(indices(&resolver), vec![0, 2, 4, 6]);
    }

    #[test]
    fn reverse_playback_without_loop_stops_at_zero() {
        let mut resolver = PlayheadResolver::with_capacity(8);
        let resolution = resolver.resolve(&ResolveRequest {
            playback_rate: Some(ParamValues::Constant(-1.0)),
            ..request(2.0, 8, 10)
        });
        assert_eq!(indices(&resolver), vec![2, 1, 0]);
        assert!(resolution.ended);
    }
}
