use serde::{Deserialize, Serialize};

/// A stage or parameter path that can be switched off at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Gain,
    Pan,
    Highpass,
    Lowpass,
    Detune,
    PlaybackRate,
    FadeIn,
    FadeOut,
    LoopCrossfade,
}

impl Feature {
    pub const ALL: [Feature; 9] = [
        Feature::Gain,
        Feature::Pan,
        Feature::Highpass,
        Feature::Lowpass,
        Feature::Detune,
        Feature::PlaybackRate,
        Feature::FadeIn,
        Feature::FadeOut,
        Feature::LoopCrossfade,
    ];

    const fn bit(self) -> u16 {
        1 << (self as u16)
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Gain => "gain",
            Self::Pan => "pan",
            Self::Highpass => "highpass",
            Self::Lowpass => "lowpass",
            Self::Detune => "detune",
            Self::PlaybackRate => "playback_rate",
            Self::FadeIn => "fade_in",
            Self::FadeOut => "fade_out",
            Self::LoopCrossfade => "loop_crossfade",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized = name.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|feature| feature.name() == normalized)
    }
}

/// Bit set of enabled features. `Copy` so it can cross the command queue cheaply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "FeatureToggles", into = "FeatureToggles")]
pub struct FeatureSet(u16);

impl Default for FeatureSet {
    fn default() -> Self {
        Self::all()
    }
}

impl FeatureSet {
    #[must_use]
    pub fn all() -> Self {
        Self(Feature::ALL.iter().fold(0, |bits, feature| bits | feature.bit()))
    }

    #[must_use]
    pub fn none() -> Self {
        Self(0)
    }

    #[must_use]
    pub fn is_enabled(self, feature: Feature) -> bool {
        self.0 & feature.bit() != 0
    }

    pub fn set(&mut self, feature: Feature, enabled: bool) {
        if enabled {
            self.0 |= feature.bit();
        } else {
            self.0 &= !feature.bit();
        }
    }

    /// Applies a toggle request; `None` flips the current value. Returns the new value.
    pub fn toggle(&mut self, feature: Feature, enabled: Option<bool>) -> bool {
        let next = enabled.unwrap_or(!self.is_enabled(feature));
        self.set(feature, next);
        next
    }
}

/// Serialized, human-editable form of [`FeatureSet`] used in config files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureToggles {
    pub gain: bool,
    pub pan: bool,
    pub highpass: bool,
    pub lowpass: bool,
    pub detune: bool,
    pub playback_rate: bool,
    pub fade_in: bool,
    pub fade_out: bool,
    pub loop_crossfade: bool,
}

impl Default for FeatureToggles {
    fn default() -> Self {
        FeatureSet::all().into()
    }
}

impl From<FeatureToggles> for FeatureSet {
    fn from(value: FeatureToggles) -> Self {
        let mut set = FeatureSet::none();
        set.set(Feature::Gain, value.gain);
        set.set(Feature::Pan, value.pan);
        set.set(Feature::Highpass, value.highpass);
        set.set(Feature::Lowpass, value.lowpass);
        set.set(Feature::Detune, value.detune);
        set.set(Feature::PlaybackRate, value.playback_rate);
        set.set(Feature::FadeIn, value.fade_in);
        set.set(Feature::FadeOut, value.fade_out);
        set.set(Feature::LoopCrossfade, value.loop_crossfade);
        set
    }
}

impl From<FeatureSet> for FeatureToggles {
    fn from(value: FeatureSet) -> Self {
        Self {
            gain: value.is_enabled(Feature::Gain),
            pan: value.is_enabled(Feature::Pan),
            highpass: value.is_enabled(Feature::Highpass),
            lowpass: value.is_enabled(Feature::Lowpass),
            detune: value.is_enabled(Feature::Detune),
            playback_rate: value.is_enabled(Feature::PlaybackRate),
            fade_in: value.is_enabled(Feature::FadeIn),
            fade_out: value.is_enabled(Feature::FadeOut),
            loop_crossfade: value.is_enabled(Feature::LoopCrossfade),
        }
    }
}
