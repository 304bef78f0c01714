//! Cue effects chain
//!
//! Fixed two-stage pipeline: gain first, then limiter. The limiter must
//! be last so its ceiling holds on the final output.

use log::debug;

use super::{EffectStage, Gain, Limiter};
use crate::config::EffectsConfig;
use crate::engine::AudioBuffer;

/// Ordered, immutable list of effect stages applied to every clip
#[derive(Debug)]
pub struct EffectsChain {
    stages: Vec<Box<dyn EffectStage>>,
}

impl EffectsChain {
    /// Build the cue chain: `Gain(gain_db)` → `Limiter(threshold_db)`
    pub fn new(gain_db: f32, threshold_db: f32) -> Self {
        Self {
            stages: vec![
                Box::new(Gain::new(gain_db)),
                Box::new(Limiter::new(threshold_db)),
            ],
        }
    }

    /// Build the chain from engine configuration
    pub fn from_config(config: &EffectsConfig) -> Self {
        Self::new(config.gain_db, config.limiter_threshold_db)
    }

    /// Run every stage in order and hand back the processed clip
    pub fn process(&self, mut buffer: AudioBuffer) -> AudioBuffer {
        for stage in &self.stages {
            stage.process(&mut buffer);
            debug!(
                "{} applied, peak now {:.2} dBFS",
                stage.effect_type(),
                buffer.peak_db()
            );
        }
        buffer
    }

    /// Effect types in processing order
    pub fn stage_types(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.effect_type()).collect()
    }

    /// Serialize chain parameters to JSON
    pub fn to_json(&self) -> serde_json::Value {
        let stages: Vec<serde_json::Value> = self
            .stages
            .iter()
            .map(|s| {
                serde_json::json!({
                    "type": s.effect_type(),
                    "params": s.get_params(),
                })
            })
            .collect();

        serde_json::json!({ "stages": stages })
    }
}

impl Default for EffectsChain {
    fn default() -> Self {
        Self::from_config(&EffectsConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_order() {
        let chain = EffectsChain::default();
        assert_eq!(chain.stage_types(), vec!["gain", "limiter"]);
    }

    #[test]
    fn test_chain_json() {
        let chain = EffectsChain::new(-8.0, -0.5);
        let json = chain.to_json();
        assert_eq!(json["stages"][0]["type"], "gain");
        assert_eq!(json["stages"][1]["type"], "limiter");
        assert_eq!(json["stages"][1]["params"]["threshold_db"], -0.5);
    }
}
