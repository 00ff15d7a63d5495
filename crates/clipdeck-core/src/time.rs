#[must_use]
pub fn seconds_to_samples(seconds: f64, sample_rate: u32) -> f64 {
    if sample_rate == 0 || !seconds.is_finite() {
        return 0.0;
    }

    seconds.max(0.0) * f64::from(sample_rate)
}

#[must_use]
pub fn samples_to_seconds(samples: u64, sample_rate: u32) -> f64 {
    if sample_rate == 0 {
        return 0.0;
    }

    samples as f64 / f64::from(sample_rate)
}

/// Converts a frame index of the audio clock into seconds.
#[must_use]
pub fn frame_to_seconds(frame: u64, sample_rate: u32) -> f64 {
    samples_to_seconds(frame, sample_rate)
}

#[must_use]
pub fn cents_to_ratio(cents: f32) -> f64 {
    2_f64.powf(f64::from(cents) / 1200.0)
}
