//! Gain Stage
//!
//! Fixed attenuation applied ahead of the limiter to open up headroom.

use crate::dsp::effect::EffectStage;
use crate::engine::buffer::db_to_linear;
use crate::engine::AudioBuffer;
use serde_json::{json, Value};

// ============================================================================
// Constants
// ============================================================================

/// Minimum gain in dB (-96 dB = effectively silent)
pub const MIN_GAIN_DB: f32 = -96.0;

/// Maximum gain in dB (+24 dB)
pub const MAX_GAIN_DB: f32 = 24.0;

/// Default cue attenuation
pub const DEFAULT_GAIN_DB: f32 = -8.0;

// ============================================================================
// Gain Stage
// ============================================================================

/// Multiplies every sample by a constant derived from `gain_db`
///
/// # Example
/// ```
/// use cue_engine::dsp::{EffectStage, Gain};
/// use cue_engine::engine::AudioBuffer;
///
/// let gain = Gain::new(-6.0);
/// let mut buffer = AudioBuffer::from_interleaved(&[1.0, -1.0], 1, 48000).unwrap();
/// gain.process(&mut buffer);
/// assert!((buffer.channel(0)[0] - 0.501187).abs() < 1e-4);
/// ```
#[derive(Debug, Clone)]
pub struct Gain {
    gain_db: f32,
    gain_linear: f32,
}

impl Gain {
    /// Create a new gain stage
    ///
    /// `gain_db` is clamped to -96..=+24 dB.
    pub fn new(gain_db: f32) -> Self {
        let clamped = gain_db.clamp(MIN_GAIN_DB, MAX_GAIN_DB);
        Self {
            gain_db: clamped,
            gain_linear: db_to_linear(clamped),
        }
    }

    /// Get the gain in decibels
    pub fn gain_db(&self) -> f32 {
        self.gain_db
    }

    /// Get the linear gain multiplier
    pub fn gain_linear(&self) -> f32 {
        self.gain_linear
    }
}

impl Default for Gain {
    fn default() -> Self {
        Self::new(DEFAULT_GAIN_DB)
    }
}

impl EffectStage for Gain {
    fn process(&self, buffer: &mut AudioBuffer) {
        // Unity gain optimization
        if (self.gain_linear - 1.0).abs() < f32::EPSILON {
            return;
        }

        for channel in buffer.samples.iter_mut() {
            for sample in channel.iter_mut() {
                *sample *= self.gain_linear;
            }
        }
    }

    fn effect_type(&self) -> &'static str {
        "gain"
    }

    fn get_params(&self) -> Value {
        json!({
            "gain_db": self.gain_db,
            "gain_linear": self.gain_linear,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
