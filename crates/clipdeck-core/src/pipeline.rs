//! The fixed chain of per-block processing stages.
//!
//! Stages run in a fixed order on the gathered source channels: loop crossfade,
//! fade-in, fade-out, lowpass, highpass, gain, mono upmix, pan. Whether a stage
//! runs is decided once per block from the feature set; a disabled stage is
//! replaced by [`Bypass`].

use crate::{
    buffer::{AudioBlock, SourceBuffer},
    dsp::{
        BiquadBank, CrossfadePlan, FadeRamp, FilterKind, apply_crossfade, apply_fade_in,
        apply_fade_out, apply_gain, apply_pan, upmix_mono,
    },
    error::ErrorKind,
    features::{Feature, FeatureSet},
    params::{BlockParams, ParamId},
    resolver::ResolvedFrame,
};

/// Everything a stage may read while processing one block.
#[derive(Debug, Clone, Copy)]
pub struct StageContext<'a> {
    pub params: BlockParams<'a>,
    pub source: &'a SourceBuffer,
    pub frames: &'a [ResolvedFrame],
    pub output_channels: usize,
    pub crossfade: Option<CrossfadePlan>,
    pub fade_in: Option<FadeRamp>,
    pub fade_out: Option<FadeRamp>,
}

impl StageContext<'_> {
    #[must_use]
    pub fn source_channels(&self) -> usize {
        self.source.channel_count()
    }
}

pub trait BlockStage {
    /// Processes the first `frames` frames of `block` in place.
    fn apply(&mut self, block: &mut AudioBlock, frames: usize, ctx: &StageContext<'_>);
}

/// The identity stage.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bypass;

impl BlockStage for Bypass {
    fn apply(&mut self, _block: &mut AudioBlock, _frames: usize, _ctx: &StageContext<'_>) {}
}

#[derive(Debug, Default)]
pub struct LoopCrossfadeStage {
    fault: Option<ErrorKind>,
}

impl BlockStage for LoopCrossfadeStage {
    fn apply(&mut self, block: &mut AudioBlock, _frames: usize, ctx: &StageContext<'_>) {
        let Some(plan) = ctx.crossfade else {
            return;
        };
        let channels = ctx.source_channels().min(block.channel_count());
        if let Some(fault) = apply_crossfade(
            &mut block.channels_mut()[..channels],
            ctx.source,
            ctx.frames,
            &plan,
        ) {
            self.fault.get_or_insert(fault);
        }
    }
}

#[derive(Debug, Default)]
pub struct FadeInStage;

impl BlockStage for FadeInStage {
    fn apply(&mut self, block: &mut AudioBlock, frames: usize, ctx: &StageContext<'_>) {
        if let Some(ramp) = ctx.fade_in {
            let channels = ctx.source_channels().min(block.channel_count());
            apply_fade_in(&mut block.channels_mut()[..channels], frames, ramp);
        }
    }
}

#[derive(Debug, Default)]
pub struct FadeOutStage;

impl BlockStage for FadeOutStage {
    fn apply(&mut self, block: &mut AudioBlock, frames: usize, ctx: &StageContext<'_>) {
        if let Some(ramp) = ctx.fade_out {
            let channels = ctx.source_channels().min(block.channel_count());
            apply_fade_out(&mut block.channels_mut()[..channels], frames, ramp);
        }
    }
}

#[derive(Debug, Clone)]
pub struct FilterStage {
    bank: BiquadBank,
}

impl FilterStage {
    #[must_use]
    pub fn new(kind: FilterKind, sample_rate: u32) -> Self {
        Self {
            bank: BiquadBank::new(kind, sample_rate),
        }
    }

    pub fn reset(&mut self) {
        self.bank.reset();
    }
}

impl BlockStage for FilterStage {
    fn apply(&mut self, block: &mut AudioBlock, frames: usize, ctx: &StageContext<'_>) {
        let cutoff = ctx.params.get(match self.bank.kind() {
            FilterKind::Lowpass => ParamId::Lowpass,
            FilterKind::Highpass => ParamId::Highpass,
        });
        let channels = ctx.source_channels().min(block.channel_count());
        self.bank
            .process(&mut block.channels_mut()[..channels], frames, cutoff);
    }
}

#[derive(Debug, Default)]
pub struct GainStage;

impl BlockStage for GainStage {
    fn apply(&mut self, block: &mut AudioBlock, frames: usize, ctx: &StageContext<'_>) {
        let channels = ctx.source_channels().min(block.channel_count());
        apply_gain(&mut block.channels_mut()[..channels], frames, ctx.params.gain);
    }
}

#[derive(Debug, Default)]
pub struct UpmixStage;

impl BlockStage for UpmixStage {
    fn apply(&mut self, block: &mut AudioBlock, frames: usize, ctx: &StageContext<'_>) {
        if ctx.source_channels() == 1 && ctx.output_channels >= 2 {
            upmix_mono(block.channels_mut(), frames);
        }
    }
}

#[derive(Debug, Default)]
pub struct PanStage;

impl BlockStage for PanStage {
    fn apply(&mut self, block: &mut AudioBlock, frames: usize, ctx: &StageContext<'_>) {
        if ctx.output_channels >= 2 {
            apply_pan(block.channels_mut(), frames, ctx.params.pan);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StageSlot {
    Crossfade,
    FadeIn,
    FadeOut,
    Lowpass,
    Highpass,
    Gain,
    Upmix,
    Pan,
}

impl StageSlot {
    const ORDER: [StageSlot; 8] = [
        StageSlot::Crossfade,
        StageSlot::FadeIn,
        StageSlot::FadeOut,
        StageSlot::Lowpass,
        StageSlot::Highpass,
        StageSlot::Gain,
        StageSlot::Upmix,
        StageSlot::Pan,
    ];

    fn feature(self) -> Option<Feature> {
        match self {
            Self::Crossfade => Some(Feature::LoopCrossfade),
            Self::FadeIn => Some(Feature::FadeIn),
            Self::FadeOut => Some(Feature::FadeOut),
            Self::Lowpass => Some(Feature::Lowpass),
            Self::Highpass => Some(Feature::Highpass),
            Self::Gain => Some(Feature::Gain),
            Self::Upmix => None,
            Self::Pan => Some(Feature::Pan),
        }
    }
}

#[derive(Debug)]
pub struct Pipeline {
    crossfade: LoopCrossfadeStage,
    fade_in: FadeInStage,
    fade_out: FadeOutStage,
    lowpass: FilterStage,
    highpass: FilterStage,
    gain: GainStage,
    upmix: UpmixStage,
    pan: PanStage,
}

impl Pipeline {
    #[must_use]
    pub fn new(sample_rate: u32) -> Self {
        Self {
            crossfade: LoopCrossfadeStage::default(),
            fade_in: FadeInStage,
            fade_out: FadeOutStage,
            lowpass: FilterStage::new(FilterKind::Lowpass, sample_rate),
            highpass: FilterStage::new(FilterKind::Highpass, sample_rate),
            gain: GainStage,
            upmix: UpmixStage,
            pan: PanStage,
        }
    }

    fn stage_mut(&mut self, slot: StageSlot) -> &mut dyn BlockStage {
        match slot {
            StageSlot::Crossfade => &mut self.crossfade,
            StageSlot::FadeIn => &mut self.fade_in,
            StageSlot::FadeOut => &mut self.fade_out,
            StageSlot::Lowpass => &mut self.lowpass,
            StageSlot::Highpass => &mut self.highpass,
            StageSlot::Gain => &mut self.gain,
            StageSlot::Upmix => &mut self.upmix,
            StageSlot::Pan => &mut self.pan,
        }
    }

    pub fn run(
        &mut self,
        block: &mut AudioBlock,
        frames: usize,
        ctx: &StageContext<'_>,
        features: FeatureSet,
    ) {
        let mut bypass = Bypass;
        for slot in StageSlot::ORDER {
            let enabled = slot
                .feature()
                .is_none_or(|feature| features.is_enabled(feature));
            let stage: &mut dyn BlockStage = if enabled {
                self.stage_mut(slot)
            } else {
                &mut bypass
            };
            stage.apply(block, frames, ctx);
        }
    }

    pub fn reset_filters(&mut self) {
        self.lowpass.reset();
        self.highpass.reset();
    }

    /// The first crossfade fault since the last call.
    pub fn take_fault(&mut self) -> Option<ErrorKind> {
        self.crossfade.fault.take()
    }
}
