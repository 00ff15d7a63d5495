//! Offline driver: runs a processor block by block against a command script.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::{
    buffer::{AudioBlock, SourceBuffer},
    config::EngineConfig,
    error::EngineError,
    handle::channel,
    messages::{Command, Notification},
    params::ConstantParams,
};

/// A command delivered at the start of the block that contains `frame`.
#[derive(Debug, Clone)]
pub struct ScriptedCommand {
    pub frame: u64,
    pub command: Command,
}

#[derive(Debug, Clone, Default)]
pub struct RenderScript {
    pub commands: Vec<ScriptedCommand>,
    pub params: ConstantParams,
}

impl RenderScript {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn at(mut self, frame: u64, command: Command) -> Self {
        self.commands.push(ScriptedCommand { frame, command });
        self
    }

    #[must_use]
    pub fn with_params(mut self, params: ConstantParams) -> Self {
        self.params = params;
        self
    }
}

/// A notification tagged with the first frame of the block that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimedNotification {
    pub block_frame: u64,
    pub notification: Notification,
}

#[derive(Debug, Clone)]
pub struct RenderOutput {
    pub sample_rate: u32,
    pub channels: usize,
    /// Interleaved frames.
    pub samples: Vec<f32>,
    pub notifications: Vec<TimedNotification>,
    pub telemetry_frames: usize,
}

impl RenderOutput {
    #[must_use]
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1)
    }

    /// Samples of one output channel.
    #[must_use]
    pub fn channel(&self, channel: usize) -> Vec<f32> {
        self.samples
            .iter()
            .skip(channel)
            .step_by(self.channels.max(1))
            .copied()
            .collect()
    }

    /// Notifications that satisfy `predicate`, without their timestamps.
    pub fn events_matching(&self, predicate: impl Fn(&Notification) -> bool) -> Vec<Notification> {
        self.notifications
            .iter()
            .map(|timed| timed.notification)
            .filter(|notification| predicate(notification))
            .collect()
    }
}

/// Renders `total_frames` frames of `buffer` under `script`.
#[instrument(skip(config, buffer, script), fields(commands = script.commands.len()))]
pub fn render_clip(
    config: &EngineConfig,
    buffer: SourceBuffer,
    script: &RenderScript,
    total_frames: u64,
) -> Result<RenderOutput, EngineError> {
    config.validate()?;

    let (mut processor, mut handle) = channel(config);
    handle.install_buffer(buffer)?;

    let mut pending: Vec<&ScriptedCommand> = script.commands.iter().collect();
    pending.sort_by_key(|scripted| scripted.frame);
    let mut pending = pending.into_iter().peekable();

    let block_size = config.block_size;
    let params = script.params.as_block_params();
    let mut outputs = vec![AudioBlock::new(config.output_channels, block_size)];
    let mut samples = Vec::with_capacity(
        usize::try_from(total_frames).unwrap_or(0) * config.output_channels,
    );
    let mut notifications = Vec::new();
    let mut drained = Vec::new();
    let mut telemetry_frames = 0;

    let mut frame = 0_u64;
    while frame < total_frames {
        let len = usize::try_from(total_frames - frame)
            .unwrap_or(block_size)
            .min(block_size);
        if outputs[0].frames() != len {
            outputs = vec![AudioBlock::new(config.output_channels, len)];
        }

        let block_end = frame + len as u64;
        while let Some(scripted) = pending.next_if(|scripted| scripted.frame < block_end) {
            handle.send(scripted.command.clone())?;
        }

        processor.process(frame, &params, &mut outputs);
        outputs[0].append_interleaved(&mut samples);

        drained.clear();
        handle.drain_notifications(&mut drained);
        notifications.extend(drained.iter().map(|notification| TimedNotification {
            block_frame: frame,
            notification: *notification,
        }));
        if handle.poll_telemetry().is_some() {
            telemetry_frames += 1;
        }
        handle.reclaim_retired();

        frame = block_end;
    }

    debug!(
        notifications = notifications.len(),
        dropped = processor.dropped_notifications(),
        "render completed"
    );

    Ok(RenderOutput {
        sample_rate: config.sample_rate,
        channels: config.output_channels,
        samples,
        notifications,
        telemetry_frames,
    })
}

/// Writes the rendered output as 16-bit PCM.
#[instrument(skip(output), fields(path = %path.display(), frames = output.frames()))]
pub fn write_wav(path: &Path, output: &RenderOutput) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| {
            format!(
                "failed to create wav output directory: {}",
                parent.display()
            )
        })?;
    }

    let spec = hound::WavSpec {
        channels: u16::try_from(output.channels).context("too many output channels")?,
        sample_rate: output.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)
        .with_context(|| format!("failed to create wav file: {}", path.display()))?;

    for sample in &output.samples {
        let quantized = (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)).round() as i16;
        writer
            .write_sample(quantized)
            .context("failed to write wav sample")?;
    }

    writer.finalize().context("failed to finalize wav file")?;
    info!("wav written");
    Ok(())
}

/// Reads a PCM WAV file into a source buffer. Returns the buffer and its sample rate.
#[instrument(fields(path = %path.display()))]
pub fn read_wav(path: &Path) -> Result<(SourceBuffer, u32)> {
    let mut reader = hound::WavReader::open(path)
        .with_context(|| format!("failed to open wav file: {}", path.display()))?;
    let spec = reader.spec();

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .context("failed to read float samples")?,
        hound::SampleFormat::Int => {
            let scale = 2_f32.powi(i32::from(spec.bits_per_sample) - 1);
            reader
                .samples::<i32>()
                .map(|sample| sample.map(|value| value as f32 / scale))
                .collect::<Result<_, _>>()
                .context("failed to read integer samples")?
        }
    };

    let buffer = SourceBuffer::from_interleaved(&interleaved, usize::from(spec.channels))
        .map_err(anyhow::Error::from)
        .with_context(|| format!("unusable wav file: {}", path.display()))?;
    debug!(
        frames = buffer.len(),
        channels = buffer.channel_count(),
        sample_rate = spec.sample_rate,
        "wav loaded"
    );
    Ok((buffer, spec.sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silent_script_renders_requested_frames() {
        let buffer = SourceBuffer::mono(vec![0.5; 64]).expect("buffer");
        let output = render_clip(&EngineConfig::default(), buffer, &RenderScript::new(), 300)
            .expect("render should succeed");
        assert_eq!(output.frames(), 300);
        assert!(output.samples.iter().all(|sample| *sample == 0.0));
        assert_eq!(output.telemetry_frames, 3);
    }

    #[test]
    fn wav_round_trip_keeps_length() {
        let temp = tempfile::tempdir().expect("tempdir should be creatable");
        let path = temp.path().join("out/clip.wav");
        let buffer = SourceBuffer::mono(vec![0.25; 480]).expect("buffer");
        let script = RenderScript::new().at(0, Command::Start(Default::default()));
        let output =
            render_clip(&EngineConfig::default(), buffer, &script, 512).expect("render");

        write_wav(&path, &output).expect("wav should be written");
        let (restored, sample_rate) = read_wav(&path).expect("wav should be readable");
        assert_eq!(sample_rate, 48_000);
        assert_eq!(restored.len(), 512);
        assert_eq!(restored.channel_count(), 2);
    }
}
