//! Equal-power blending across the loop seam.
//!
//! The crossfade never moves the playhead. It reads a second source sample for
//! frames near the seam and mixes it with the sample already gathered, so the
//! block keeps the exact index sequence produced by the resolver.
//!
//! Two placements exist for each direction. Post-wrap blends the head of the loop
//! with the material that would have followed the loop end; it needs source past
//! the seam. Pre-wrap blends the tail of the loop with the material leading into
//! the loop start; it needs source before the loop start. The placement with
//! enough material wins, post-wrap first.

use std::f64::consts::FRAC_PI_2;

use crate::{
    buffer::SourceBuffer,
    error::ErrorKind,
    resolver::{LoopRegion, ResolvedFrame},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeamPlacement {
    PostWrap,
    PreWrap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Seam {
    pub placement: SeamPlacement,
    pub window: usize,
}

impl Seam {
    fn choose(requested: usize, post_room: usize, pre_room: usize) -> Option<Self> {
        let post = requested.min(post_room);
        let pre = requested.min(pre_room);
        let (placement, window) = if post >= requested {
            (SeamPlacement::PostWrap, post)
        } else if pre >= requested {
            (SeamPlacement::PreWrap, pre)
        } else if post >= pre {
            (SeamPlacement::PostWrap, post)
        } else {
            (SeamPlacement::PreWrap, pre)
        };
        (window > 0).then_some(Self { placement, window })
    }
}

/// Crossfade layout for one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrossfadePlan {
    pub region: LoopRegion,
    pub buffer_len: usize,
    pub forward: Option<Seam>,
    pub reverse: Option<Seam>,
    /// The loop already wrapped before this block started.
    pub wrapped_before: bool,
    pub first_wrap: Option<usize>,
}

impl CrossfadePlan {
    /// Returns `None` when no window fits the loop and the surrounding material.
    #[must_use]
    pub fn new(
        region: LoopRegion,
        buffer_len: usize,
        crossfade_samples: usize,
        wrapped_before: bool,
        first_wrap: Option<usize>,
    ) -> Option<Self> {
        if region.is_empty() || region.end > buffer_len {
            return None;
        }

        let requested = crossfade_samples.min(region.len());
        if requested == 0 {
            return None;
        }

        let after_end = buffer_len - region.end;
        let before_start = region.start;
        let forward = Seam::choose(requested, after_end, before_start);
        let reverse = Seam::choose(requested, before_start, after_end);
        if forward.is_none() && reverse.is_none() {
            return None;
        }

        Some(Self {
            region,
            buffer_len,
            forward,
            reverse,
            wrapped_before,
            first_wrap,
        })
    }

    fn is_post_wrap(&self, position: usize) -> bool {
        self.wrapped_before || self.first_wrap.is_some_and(|wrap| position >= wrap)
    }

    /// Blend partner and weights for the frame at `position`, if it sits in a fade zone.
    fn blend(&self, position: usize, frame: ResolvedFrame) -> Option<Blend> {
        let LoopRegion { start, end } = self.region;
        let index = frame.index;
        let seam = if frame.reverse {
            self.reverse?
        } else {
            self.forward?
        };
        let window = seam.window;

        // Distance from the seam, and the partner sample on the other side of it.
        let (distance, partner, post) = match (frame.reverse, seam.placement) {
            (false, SeamPlacement::PostWrap) | (true, SeamPlacement::PreWrap) => {
                if index < start || index >= start + window {
                    return None;
                }
                let distance = index - start;
                (
                    distance,
                    end + distance,
                    seam.placement == SeamPlacement::PostWrap,
                )
            }
            (false, SeamPlacement::PreWrap) | (true, SeamPlacement::PostWrap) => {
                if index >= end || index + window < end {
                    return None;
                }
                let distance = end - 1 - index;
                (
                    distance,
                    start.wrapping_sub(1 + distance),
                    seam.placement == SeamPlacement::PostWrap,
                )
            }
        };

        if post && !self.is_post_wrap(position) {
            return None;
        }

        let (direct, other) = if post {
            let progress = distance as f64 / window as f64;
            ((FRAC_PI_2 * progress).sin(), (FRAC_PI_2 * progress).cos())
        } else {
            let progress = (window - distance) as f64 / window as f64;
            ((FRAC_PI_2 * progress).cos(), (FRAC_PI_2 * progress).sin())
        };

        Some(Blend {
            partner,
            direct: direct as f32,
            other: other as f32,
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct Blend {
    partner: usize,
    direct: f32,
    other: f32,
}

/// Blends the gathered samples in `channels` in place. Returns the first
/// out-of-range partner index, which is clamped before use.
pub fn apply_crossfade(
    channels: &mut [Vec<f32>],
    source: &SourceBuffer,
    frames: &[ResolvedFrame],
    plan: &CrossfadePlan,
) -> Option<ErrorKind> {
    let mut fault = None;
    let source_channels = source.channel_count().min(channels.len());
    let last = plan.buffer_len.saturating_sub(1);

    for (position, frame) in frames.iter().enumerate() {
        let Some(blend) = plan.blend(position, *frame) else {
            continue;
        };

        debug_assert!(
            blend.partner < plan.buffer_len,
            "crossfade partner {} outside buffer of {}",
            blend.partner,
            plan.buffer_len
        );
        let partner = if blend.partner < plan.buffer_len {
            blend.partner
        } else {
            fault.get_or_insert(ErrorKind::IndexOutOfBounds {
                index: blend.partner,
                len: plan.buffer_len,
            });
            last
        };

        for (channel_index, channel) in channels.iter_mut().enumerate().take(source_channels) {
            let other = source.channel(channel_index)[partner];
            channel[position] = channel[position] * blend.direct + other * blend.other;
        }
    }

    fault
}
