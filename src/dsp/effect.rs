//! Effect stage trait
//!
//! Every stage of the cue effects chain implements [`EffectStage`].

use crate::engine::AudioBuffer;
use serde_json::Value;

/// A stateless transform applied to a whole clip
///
/// Stages take `&self`: any working state (envelopes, lookahead windows)
/// lives only for the duration of one `process` call, so the same input
/// always produces the same output.
pub trait EffectStage: Send + Sync + std::fmt::Debug {
    /// Process a clip in place. The buffer's sample rate is authoritative.
    fn process(&self, buffer: &mut AudioBuffer);

    /// Get the effect type identifier
    fn effect_type(&self) -> &'static str;

    /// Get all parameters as JSON (for logging and diagnostics)
    fn get_params(&self) -> Value;
}
