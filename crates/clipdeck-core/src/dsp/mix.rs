use crate::params::{ParamId, ParamValues};

/// Linear pan law: the side away from the pan direction is attenuated.
#[inline]
#[must_use]
pub fn pan_gains(pan: f32) -> (f32, f32) {
    let pan = ParamId::Pan.clamp(pan);
    let left = if pan <= 0.0 { 1.0 } else { 1.0 - pan };
    let right = if pan >= 0.0 { 1.0 } else { 1.0 + pan };
    (left, right)
}

pub fn apply_gain(channels: &mut [Vec<f32>], frames: usize, gain: ParamValues<'_>) {
    match gain.as_constant() {
        Some(gain) if gain.to_bits() == 1.0_f32.to_bits() => {}
        Some(gain) => {
            let gain = ParamId::Gain.clamp(gain);
            for channel in channels {
                for sample in &mut channel[..frames] {
                    *sample *= gain;
                }
            }
        }
        None => {
            for channel in channels {
                for (frame, sample) in channel[..frames].iter_mut().enumerate() {
                    *sample *= ParamId::Gain.clamp(gain.at(frame, 1.0));
                }
            }
        }
    }
}

/// Duplicates channel 0 into channel 1.
pub fn upmix_mono(channels: &mut [Vec<f32>], frames: usize) {
    if let [left, right, ..] = channels {
        right[..frames].copy_from_slice(&left[..frames]);
    }
}

pub fn apply_pan(channels: &mut [Vec<f32>], frames: usize, pan: ParamValues<'_>) {
    let [left, right, ..] = channels else {
        return;
    };

    if let Some(pan) = pan.as_constant() {
        let (left_gain, right_gain) = pan_gains(pan);
        if left_gain.to_bits() == 1.0_f32.to_bits() && right_gain.to_bits() == 1.0_f32.to_bits() {
            return;
        }
        for (l, r) in left[..frames].iter_mut().zip(&mut right[..frames]) {
            *l *= left_gain;
            *r *= right_gain;
        }
        return;
    }

    for (frame, (l, r)) in left[..frames]
        .iter_mut()
        .zip(&mut right[..frames])
        .enumerate()
    {
        let (left_gain, right_gain) = pan_gains(pan.at(frame, 0.0));
        *l *= left_gain;
        *r *= right_gain;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pan_law_is_linear() {
        assert_eq!(pan_gains(0.0), (1.0, 1.0));
        assert_eq!(pan_gains(0.5), (0.5, 1.0));
        assert_eq!(pan_gains(-0.25), (1.0, 0.75));
        assert_eq!(pan_gains(4.0), (0.0, 1.0));
    }

    #[test]
    fn per_frame_gain_scales_each_sample() {
        let gains = [0.0, 0.5, 2.0];
        let mut channels = vec![vec![1.0; 4]];
        apply_gain(&mut channels, 4, ParamValues::PerFrame(&gains));
        assert_eq!(channels[0], vec![0.0, 0.5, 2.0, 2.0]);
    }

    #[test]
    fn negative_gain_is_clamped_to_silence() {
        let mut channels = vec![vec![1.0; 2]];
        apply_gain(&mut channels, 2, ParamValues::Constant(-3.0));
        assert_eq!(channels[0], vec![0.0, 0.0]);
    }

    #[test]
    fn upmix_then_pan_right() {
        let mut channels = vec![vec![0.8; 3], vec![0.0; 3]];
        upmix_mono(&mut channels, 3);
        apply_pan(&mut channels, 3, ParamValues::Constant(1.0));
        assert_eq!(channels[0], vec![0.0; 3]);
        assert_eq!(channels[1], vec![0.8; 3]);
    }
}
