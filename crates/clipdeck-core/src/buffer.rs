use crate::error::EngineError;

pub const MAX_SOURCE_CHANNELS: usize = 2;

/// Immutable multi-channel PCM owned by a processor once installed.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceBuffer {
    channels: Vec<Vec<f32>>,
    len: usize,
}

impl SourceBuffer {
    pub fn new(channels: Vec<Vec<f32>>) -> Result<Self, EngineError> {
        if channels.is_empty() || channels.len() > MAX_SOURCE_CHANNELS {
            return Err(EngineError::InvalidBuffer(format!(
                "expected 1 or {MAX_SOURCE_CHANNELS} channels, got {}",
                channels.len()
            )));
        }

        let len = channels[0].len();
        if len == 0 {
            return Err(EngineError::InvalidBuffer(
                "buffer contains no samples".to_string(),
            ));
        }
        if let Some(mismatch) = channels.iter().position(|channel| channel.len() != len) {
            return Err(EngineError::InvalidBuffer(format!(
                "channel {mismatch} has {} samples, channel 0 has {len}",
                channels[mismatch].len()
            )));
        }

        Ok(Self { channels, len })
    }

    pub fn mono(samples: Vec<f32>) -> Result<Self, EngineError> {
        Self::new(vec![samples])
    }

    /// Splits interleaved frames into channels.
    pub fn from_interleaved(samples: &[f32], channel_count: usize) -> Result<Self, EngineError> {
        if channel_count == 0 || channel_count > MAX_SOURCE_CHANNELS {
            return Err(EngineError::InvalidBuffer(format!(
                "unsupported channel count {channel_count}"
            )));
        }

        let frames = samples.len() / channel_count;
        let mut channels = vec![Vec::with_capacity(frames); channel_count];
        for frame in samples.chunks_exact(channel_count) {
            for (channel, sample) in channels.iter_mut().zip(frame) {
                channel.push(*sample);
            }
        }
        Self::new(channels)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    #[must_use]
    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index]
    }

    #[must_use]
    pub fn duration_seconds(&self, sample_rate: u32) -> f64 {
        crate::time::samples_to_seconds(self.len as u64, sample_rate)
    }
}

/// One output bus: `channels × frames` of planar samples.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBlock {
    channels: Vec<Vec<f32>>,
    frames: usize,
}

impl AudioBlock {
    #[must_use]
    pub fn new(channel_count: usize, frames: usize) -> Self {
        Self {
            channels: vec![vec![0.0; frames]; channel_count.max(1)],
            frames,
        }
    }

    #[must_use]
    pub fn frames(&self) -> usize {
        self.frames
    }

    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    #[must_use]
    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index]
    }

    pub fn channel_mut(&mut self, index: usize) -> &mut [f32] {
        &mut self.channels[index]
    }

    pub fn channels_mut(&mut self) -> &mut [Vec<f32>] {
        &mut self.channels
    }

    pub fn fill_silence(&mut self) {
        for channel in &mut self.channels {
            channel.fill(0.0);
        }
    }

    /// Copies every channel of `source` that this block also has.
    pub fn copy_from(&mut self, source: &AudioBlock) {
        for (target, origin) in self.channels.iter_mut().zip(&source.channels) {
            let frames = target.len().min(origin.len());
            target[..frames].copy_from_slice(&origin[..frames]);
        }
    }

    /// Interleaves the block into `out`, appending `frames × channels` samples.
    pub fn append_interleaved(&self, out: &mut Vec<f32>) {
        out.reserve(self.frames * self.channels.len());
        for frame in 0..self.frames {
            for channel in &self.channels {
                out.push(channel[frame]);
            }
        }
    }
}
