use std::f64::consts::TAU;

use crate::{
    buffer::SourceBuffer,
    config::EngineConfig,
    error::EngineError,
    messages::{Command, StartOptions},
    params::ConstantParams,
    render::RenderScript,
};

pub const DEMO_SAMPLE_RATE: u32 = 48_000;

/// Mono sine of `frames` samples.
pub fn sine_buffer(
    frequency: f64,
    sample_rate: u32,
    frames: usize,
    amplitude: f32,
) -> Result<SourceBuffer, EngineError> {
    let step = TAU * frequency / f64::from(sample_rate.max(1));
    SourceBuffer::mono(
        (0..frames)
            .map(|n| (step * n as f64).sin() as f32 * amplitude)
            .collect(),
    )
}

/// Stereo sine with the right channel in quadrature to the left.
pub fn stereo_sine_buffer(
    frequency: f64,
    sample_rate: u32,
    frames: usize,
    amplitude: f32,
) -> Result<SourceBuffer, EngineError> {
    let step = TAU * frequency / f64::from(sample_rate.max(1));
    let left = (0..frames)
        .map(|n| (step * n as f64).sin() as f32 * amplitude)
        .collect();
    let right = (0..frames)
        .map(|n| (step * n as f64).cos() as f32 * amplitude)
        .collect();
    SourceBuffer::new(vec![left, right])
}

/// Mono buffer whose sample values equal their index.
pub fn ramp_buffer(frames: usize) -> Result<SourceBuffer, EngineError> {
    SourceBuffer::mono((0..frames).map(|n| n as f32).collect())
}

/// Deterministic scenario exercising scheduling, looping, crossfade, envelopes,
/// filtering and panning. Returns the buffer, the script and the frames to render.
pub fn demo_scenario() -> Result<(EngineConfig, SourceBuffer, RenderScript, u64), EngineError> {
    let config = EngineConfig {
        sample_rate: DEMO_SAMPLE_RATE,
        ..EngineConfig::default()
    };
    let buffer = stereo_sine_buffer(220.0, DEMO_SAMPLE_RATE, 24_000, 0.6)?;

    let script = RenderScript::new()
        .with_params(ConstantParams {
            playback_rate: 1.5,
            gain: 0.8,
            pan: -0.25,
            lowpass: 6_000.0,
            highpass: 60.0,
            ..ConstantParams::default()
        })
        .at(0, Command::SetLoop(true))
        .at(
            0,
            Command::SetLoopBounds {
                start: Some(0.05),
                end: Some(0.4),
            },
        )
        .at(0, Command::SetLoopCrossfade(0.02))
        .at(0, Command::SetFadeIn(0.01))
        .at(0, Command::SetFadeOut(0.05))
        .at(
            0,
            Command::Start(StartOptions {
                when: Some(0.01),
                ..StartOptions::default()
            }),
        )
        .at(24_000, Command::Pause { when: None })
        .at(28_800, Command::Resume { when: None })
        .at(72_000, Command::Stop { when: None });

    Ok((config, buffer, script, 96_000))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ramp_values_match_indices() {
        let buffer = ramp_buffer(5).expect("ramp");
        assert_eq!(buffer.channel(0), &[0.0, 1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn demo_scenario_is_valid() {
        let (config, buffer, script, frames) = demo_scenario().expect("scenario");
        assert!(config.validate().is_ok());
        assert_eq!(buffer.channel_count(), 2);
        assert!(!script.commands.is_empty());
        assert_eq!(frames, 96_000);
    }
}
