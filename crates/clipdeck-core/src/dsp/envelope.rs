//! Linear fade-in and fade-out ramps.

/// A ramp of `length` samples with `remaining` samples left at the start of the block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FadeRamp {
    pub remaining: u64,
    pub length: u64,
}

impl FadeRamp {
    /// Fade-in position after `played` samples, if the ramp is still running.
    #[must_use]
    pub fn fade_in(length: u64, played: u64) -> Option<Self> {
        (length > 0 && played < length).then(|| Self {
            remaining: length - played,
            length,
        })
    }

    /// Fade-out with `remaining` samples left before silence.
    #[must_use]
    pub fn fade_out(length: u64, remaining: u64) -> Option<Self> {
        (length > 0).then_some(Self { remaining, length })
    }

    #[must_use]
    pub fn fade_in_gain(&self, frame: usize) -> f32 {
        let frame = frame as u64;
        if frame >= self.remaining {
            return 1.0;
        }
        (1.0 - (self.remaining - frame) as f64 / self.length as f64) as f32
    }

    #[must_use]
    pub fn fade_out_gain(&self, frame: usize) -> f32 {
        let frame = frame as u64;
        if frame >= self.remaining {
            return 0.0;
        }
        ((self.remaining - frame) as f64 / self.length as f64).min(1.0) as f32
    }
}

pub fn apply_fade_in(channels: &mut [Vec<f32>], frames: usize, ramp: FadeRamp) {
    let ramp_frames = frames.min(usize::try_from(ramp.remaining).unwrap_or(usize::MAX));
    for channel in channels {
        for (frame, sample) in channel[..ramp_frames].iter_mut().enumerate() {
            *sample *= ramp.fade_in_gain(frame);
        }
    }
}

/// Applies the fade-out and hard-zeroes every frame at or past `remaining`.
pub fn apply_fade_out(channels: &mut [Vec<f32>], frames: usize, ramp: FadeRamp) {
    for channel in channels {
        for (frame, sample) in channel[..frames].iter_mut().enumerate() {
            *sample *= ramp.fade_out_gain(frame);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fade_in_rises_from_silence() {
        let ramp = FadeRamp::fade_in(4, 0).expect("ramp");
        let gains: Vec<f32> = (0..6).map(|frame| ramp.fade_in_gain(frame)).collect();
        assert_eq!(gains, vec![0.0, 0.25, 0.5, 0.75, 1.0, 1.0]);
        assert!(FadeRamp::fade_in(4, 4).is_none());
        assert!(FadeRamp::fade_in(0, 0).is_none());
    }

    #[test]
    fn fade_in_resumes_mid_ramp() {
        let ramp = FadeRamp::fade_in(4, 2).expect("ramp");
        assert_eq!(ramp.fade_in_gain(0), 0.5);
        assert_eq!(ramp.fade_in_gain(2), 1.0);
    }

    #[test]
    fn fade_out_zeroes_past_remaining() {
        let mut channels = vec![vec![1.0; 8]];
        let ramp = FadeRamp::fade_out(4, 3).expect("ramp");
        apply_fade_out(&mut channels, 8, ramp);
        assert_eq!(channels[0], vec![0.75, 0.5, 0.25, 0.0, 0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn fade_out_gain_caps_at_unity() {
        let ramp = FadeRamp::fade_out(4, 100).expect("ramp");
        assert_eq!(ramp.fade_out_gain(0), 1.0);
        assert_eq!(ramp.fade_out_gain(97), 0.75);
    }
}
