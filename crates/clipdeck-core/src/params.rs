//! A-rate parameters supplied alongside each processed block.
//!
//! Every parameter is either a single block-constant value or one value per
//! output frame. When a per-frame array is shorter than the block, its last
//! value holds for the remaining frames.

use serde::{Deserialize, Serialize};

pub const LOWPASS_BYPASS_HZ: f32 = 20_000.0;
pub const HIGHPASS_BYPASS_HZ: f32 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamValues<'a> {
    Constant(f32),
    PerFrame(&'a [f32]),
}

impl ParamValues<'_> {
    /// Value for `frame`, holding the last entry past the end of the array.
    #[inline]
    #[must_use]
    pub fn at(&self, frame: usize, fallback: f32) -> f32 {
        match self {
            Self::Constant(value) => *value,
            Self::PerFrame(values) => values
                .get(frame)
                .or_else(|| values.last())
                .copied()
                .unwrap_or(fallback),
        }
    }

    /// The block-constant value, also for per-frame arrays whose entries are all equal.
    #[must_use]
    pub fn as_constant(&self) -> Option<f32> {
        match self {
            Self::Constant(value) => Some(*value),
            Self::PerFrame([]) => None,
            Self::PerFrame([first, rest @ ..]) => rest
                .iter()
                .all(|value| value.to_bits() == first.to_bits())
                .then_some(*first),
        }
    }
}

/// Identifies one of the six a-rate parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamId {
    PlaybackRate,
    Detune,
    Gain,
    Pan,
    Lowpass,
    Highpass,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamDescriptor {
    pub id: ParamId,
    pub default_value: f32,
    pub min_value: f32,
    pub max_value: f32,
}

pub const PARAM_DESCRIPTORS: [ParamDescriptor; 6] = [
    ParamDescriptor {
        id: ParamId::PlaybackRate,
        default_value: 1.0,
        min_value: f32::MIN,
        max_value: f32::MAX,
    },
    ParamDescriptor {
        id: ParamId::Detune,
        default_value: 0.0,
        min_value: f32::MIN,
        max_value: f32::MAX,
    },
    ParamDescriptor {
        id: ParamId::Gain,
        default_value: 1.0,
        min_value: 0.0,
        max_value: f32::MAX,
    },
    ParamDescriptor {
        id: ParamId::Pan,
        default_value: 0.0,
        min_value: -1.0,
        max_value: 1.0,
    },
    ParamDescriptor {
        id: ParamId::Lowpass,
        default_value: LOWPASS_BYPASS_HZ,
        min_value: HIGHPASS_BYPASS_HZ,
        max_value: LOWPASS_BYPASS_HZ,
    },
    ParamDescriptor {
        id: ParamId::Highpass,
        default_value: HIGHPASS_BYPASS_HZ,
        min_value: HIGHPASS_BYPASS_HZ,
        max_value: LOWPASS_BYPASS_HZ,
    },
];

impl ParamId {
    #[must_use]
    pub fn descriptor(self) -> &'static ParamDescriptor {
        let index = match self {
            Self::PlaybackRate => 0,
            Self::Detune => 1,
            Self::Gain => 2,
            Self::Pan => 3,
            Self::Lowpass => 4,
            Self::Highpass => 5,
        };
        &PARAM_DESCRIPTORS[index]
    }

    #[must_use]
    pub fn default_value(self) -> f32 {
        self.descriptor().default_value
    }

    /// Limits `value` to the descriptor range; non-finite input falls back to the default.
    #[inline]
    #[must_use]
    pub fn clamp(self, value: f32) -> f32 {
        let descriptor = self.descriptor();
        if value.is_finite() {
            value.clamp(descriptor.min_value, descriptor.max_value)
        } else {
            descriptor.default_value
        }
    }
}

/// The parameter set for one block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockParams<'a> {
    pub playback_rate: ParamValues<'a>,
    pub detune: ParamValues<'a>,
    pub gain: ParamValues<'a>,
    pub pan: ParamValues<'a>,
    pub lowpass: ParamValues<'a>,
    pub highpass: ParamValues<'a>,
}

impl Default for BlockParams<'_> {
    fn default() -> Self {
        Self {
            playback_rate: ParamValues::Constant(ParamId::PlaybackRate.default_value()),
            detune: ParamValues::Constant(ParamId::Detune.default_value()),
            gain: ParamValues::Constant(ParamId::Gain.default_value()),
            pan: ParamValues::Constant(ParamId::Pan.default_value()),
            lowpass: ParamValues::Constant(ParamId::Lowpass.default_value()),
            highpass: ParamValues::Constant(ParamId::Highpass.default_value()),
        }
    }
}

impl<'a> BlockParams<'a> {
    #[must_use]
    pub fn get(&self, id: ParamId) -> ParamValues<'a> {
        match id {
            ParamId::PlaybackRate => self.playback_rate,
            ParamId::Detune => self.detune,
            ParamId::Gain => self.gain,
            ParamId::Pan => self.pan,
            ParamId::Lowpass => self.lowpass,
            ParamId::Highpass => self.highpass,
        }
    }

    /// The same parameter set restricted to frames `offset..`, used when a host
    /// block is processed in several internal slices.
    #[must_use]
    pub fn slice_from(&self, offset: usize) -> Self {
        let shift = |values: ParamValues<'a>| match values {
            ParamValues::Constant(value) => ParamValues::Constant(value),
            ParamValues::PerFrame(values) if offset < values.len() => {
                ParamValues::PerFrame(&values[offset..])
            }
            ParamValues::PerFrame(values) => match values.last() {
                Some(last) => ParamValues::Constant(*last),
                None => ParamValues::PerFrame(values),
            },
        };

        Self {
            playback_rate: shift(self.playback_rate),
            detune: shift(self.detune),
            gain: shift(self.gain),
            pan: shift(self.pan),
            lowpass: shift(self.lowpass),
            highpass: shift(self.highpass),
        }
    }
}

/// Owned, block-constant parameter values. Handy for scripted renders.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstantParams {
    pub playback_rate: f32,
    pub detune: f32,
    pub gain: f32,
    pub pan: f32,
    pub lowpass: f32,
    pub highpass: f32,
}

impl Default for ConstantParams {
    fn default() -> Self {
        Self {
            playback_rate: ParamId::PlaybackRate.default_value(),
            detune: ParamId::Detune.default_value(),
            gain: ParamId::Gain.default_value(),
            pan: ParamId::Pan.default_value(),
            lowpass: ParamId::Lowpass.default_value(),
            highpass: ParamId::Highpass.default_value(),
        }
    }
}

impl ConstantParams {
    #[must_use]
    pub fn as_block_params(&self) -> BlockParams<'static> {
        BlockParams {
            playback_rate: ParamValues::Constant(self.playback_rate),
            detune: ParamValues::Constant(self.detune),
            gain: ParamValues::Constant(self.gain),
            pan: ParamValues::Constant(self.pan),
            lowpass: ParamValues::Constant(self.lowpass),
            highpass: ParamValues::Constant(self.highpass),
        }
    }
}
