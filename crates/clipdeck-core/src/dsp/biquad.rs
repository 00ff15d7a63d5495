//! Second-order lowpass and highpass sections with per-channel history.

use std::f64::consts::PI;

use crate::params::{HIGHPASS_BYPASS_HZ, LOWPASS_BYPASS_HZ, ParamValues};

pub const MIN_CUTOFF_HZ: f64 = 20.0;
/// Cutoffs are clamped below Nyquist so the sections stay stable.
pub const MAX_CUTOFF_RATIO: f64 = 0.49;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    Lowpass,
    Highpass,
}

impl FilterKind {
    /// Whether a block-constant cutoff leaves the signal untouched.
    #[must_use]
    pub fn is_bypassed_at(self, cutoff_hz: f32) -> bool {
        match self {
            Self::Lowpass => cutoff_hz >= LOWPASS_BYPASS_HZ,
            Self::Highpass => cutoff_hz <= HIGHPASS_BYPASS_HZ,
        }
    }
}

/// Coefficients normalized by `a0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoefficients {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl BiquadCoefficients {
    #[must_use]
    pub fn new(kind: FilterKind, cutoff_hz: f32, sample_rate: u32) -> Self {
        let sample_rate = f64::from(sample_rate.max(1));
        let cutoff = f64::from(cutoff_hz);
        let cutoff = if cutoff.is_finite() {
            cutoff.clamp(MIN_CUTOFF_HZ, (MAX_CUTOFF_RATIO * sample_rate).max(MIN_CUTOFF_HZ))
        } else {
            MIN_CUTOFF_HZ
        };

        let w0 = 2.0 * PI * cutoff / sample_rate;
        let (sin_w0, cos_w0) = w0.sin_cos();
        let alpha = sin_w0 / 2.0;

        let (b0, b1, b2) = match kind {
            FilterKind::Lowpass => ((1.0 - cos_w0) / 2.0, 1.0 - cos_w0, (1.0 - cos_w0) / 2.0),
            FilterKind::Highpass => ((1.0 + cos_w0) / 2.0, -(1.0 + cos_w0), (1.0 + cos_w0) / 2.0),
        };
        let a0 = 1.0 + alpha;

        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: (-2.0 * cos_w0) / a0,
            a2: (1.0 - alpha) / a0,
        }
    }
}

/// Direct form I history: previous two inputs and outputs.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BiquadState {
    x1: f64,
    x2: f64,
    y1: f64,
    y2: f64,
}

impl BiquadState {
    #[inline]
    pub fn process(&mut self, coefficients: &BiquadCoefficients, input: f32) -> f32 {
        let x0 = f64::from(input);
        let y0 = coefficients.b0 * x0 + coefficients.b1 * self.x1 + coefficients.b2 * self.x2
            - coefficients.a1 * self.y1
            - coefficients.a2 * self.y2;

        self.x2 = self.x1;
        self.x1 = x0;
        self.y2 = self.y1;
        self.y1 = y0;
        y0 as f32
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// One filter kind applied to up to two channels.
#[derive(Debug, Clone)]
pub struct BiquadBank {
    kind: FilterKind,
    sample_rate: u32,
    states: [BiquadState; 2],
}

impl BiquadBank {
    #[must_use]
    pub fn new(kind: FilterKind, sample_rate: u32) -> Self {
        Self {
            kind,
            sample_rate,
            states: [BiquadState::default(); 2],
        }
    }

    #[must_use]
    pub fn kind(&self) -> FilterKind {
        self.kind
    }

    pub fn reset(&mut self) {
        for state in &mut self.states {
            state.reset();
        }
    }

    /// Filters `frames` samples of each channel in place.
    pub fn process(&mut self, channels: &mut [Vec<f32>], frames: usize, cutoff: ParamValues<'_>) {
        let fallback = match self.kind {
            FilterKind::Lowpass => LOWPASS_BYPASS_HZ,
            FilterKind::Highpass => HIGHPASS_BYPASS_HZ,
        };

        if let Some(cutoff) = cutoff.as_constant() {
            if self.kind.is_bypassed_at(cutoff) {
                return;
            }
            let coefficients = BiquadCoefficients::new(self.kind, cutoff, self.sample_rate);
            for (channel, state) in channels.iter_mut().zip(&mut self.states) {
                for sample in &mut channel[..frames] {
                    *sample = state.process(&coefficients, *sample);
                }
            }
            return;
        }

        for frame in 0..frames {
            let coefficients =
                BiquadCoefficients::new(self.kind, cutoff.at(frame, fallback), self.sample_rate);
            for (channel, state) in channels.iter_mut().zip(&mut self.states) {
                channel[frame] = state.process(&coefficients, channel[frame]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(frequency: f64, sample_rate: u32, frames: usize) -> Vec<f32> {
        (0..frames)
            .map(|n| (2.0 * PI * frequency * n as f64 / f64::from(sample_rate)).sin() as f32)
            .collect()
    }

    fn rms(samples: &[f32]) -> f64 {
        let sum: f64 = samples.iter().map(|s| f64::from(*s).powi(2)).sum();
        (sum / samples.len() as f64).sqrt()
    }

    #[test]
    fn lowpass_attenuates_above_cutoff() {
        let mut bank = BiquadBank::new(FilterKind::Lowpass, 48_000);
        let mut channels = vec![sine(8_000.0, 48_000, 4_800)];
        bank.process(&mut channels, 4_800, ParamValues::Constant(500.0));
        assert!(rms(&channels[0][2_400..]) < 0.05);
    }

    #[test]
    fn highpass_passes_above_cutoff() {
        let mut bank = BiquadBank::new(FilterKind::Highpass, 48_000);
        let mut channels = vec![sine(8_000.0, 48_000, 4_800)];
        bank.process(&mut channels, 4_800, ParamValues::Constant(200.0));
        let level = rms(&channels[0][2_400..]);
        assert!((level - std::f64::consts::FRAC_1_SQRT_2).abs() < 0.05);
    }

    #[test]
    fn bypass_thresholds_leave_signal_untouched() {
        let original = sine(1_000.0, 48_000, 256);
        let mut channels = vec![original.clone()];
        let mut lowpass = BiquadBank::new(FilterKind::Lowpass, 48_000);
        let mut highpass = BiquadBank::new(FilterKind::Highpass, 48_000);
        lowpass.process(&mut channels, 256, ParamValues::Constant(LOWPASS_BYPASS_HZ));
        highpass.process(&mut channels, 256, ParamValues::Constant(HIGHPASS_BYPASS_HZ));
        assert_eq!(channels[0], original);
    }

    #[test]
    fn per_frame_cutoff_matches_constant_when_uniform() {
        let input = sine(3_000.0, 48_000, 128);
        let cutoffs = [1_000.0_f32, 1_000.0];
        let mut constant = vec![input.clone()];
        let mut varying = vec![input];
        BiquadBank::new(FilterKind::Lowpass, 48_000).process(
            &mut constant,
            128,
            ParamValues::Constant(1_000.0),
        );
        BiquadBank::new(FilterKind::Lowpass, 48_000).process(
            &mut varying,
            128,
            ParamValues::PerFrame(&cutoffs),
        );
        assert_eq!(constant, varying);
    }
}
