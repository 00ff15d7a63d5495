/// Replaces NaN and infinite samples with silence. Returns how many were replaced.
pub fn sanitize(samples: &mut [f32]) -> usize {
    let mut replaced = 0;
    for sample in samples.iter_mut().filter(|sample| !sample.is_finite()) {
        *sample = 0.0;
        replaced += 1;
    }
    replaced
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zeroes_non_finite_samples() {
        let mut samples = [0.5, f32::NAN, f32::INFINITY, -0.5, f32::NEG_INFINITY];
        assert_eq!(sanitize(&mut samples), 3);
        assert_eq!(samples, [0.5, 0.0, 0.0, -0.5, 0.0]);
    }
}
