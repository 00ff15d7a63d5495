pub mod biquad;
pub mod crossfade;
pub mod envelope;
pub mod guard;
pub mod mix;

pub use biquad::{BiquadBank, BiquadCoefficients, BiquadState, FilterKind};
pub use crossfade::{CrossfadePlan, Seam, SeamPlacement, apply_crossfade};
pub use envelope::{FadeRamp, apply_fade_in, apply_fade_out};
pub use guard::sanitize;
pub use mix::{apply_gain, apply_pan, pan_gains, upmix_mono};
