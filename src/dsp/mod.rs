//! DSP Effects
//!
//! The two fixed stages every cue passes through before playback.
//! All stages implement the `EffectStage` trait.

mod chain;
mod effect;
mod gain;
mod limiter;

pub use chain::EffectsChain;
pub use effect::EffectStage;
pub use gain::{Gain, DEFAULT_GAIN_DB, MAX_GAIN_DB, MIN_GAIN_DB};
pub use limiter::{Limiter, DEFAULT_THRESHOLD_DB, MAX_THRESHOLD_DB, MIN_THRESHOLD_DB};
