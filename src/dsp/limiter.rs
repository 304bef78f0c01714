//! Limiter Stage
//!
//! Lookahead peak limiter. Output never exceeds the threshold and is always
//! finite (NaN and infinite input samples become silence). The gain
//! envelope starts ducking before a peak arrives so most limiting happens
//! without the final hard ceiling having to engage.

use std::collections::VecDeque;

use crate::dsp::effect::EffectStage;
use crate::engine::buffer::db_to_linear;
use crate::engine::AudioBuffer;
use serde_json::{json, Value};

// ============================================================================
// Constants
// ============================================================================

/// Minimum threshold in dB
pub const MIN_THRESHOLD_DB: f32 = -24.0;
/// Maximum threshold in dB (full scale)
pub const MAX_THRESHOLD_DB: f32 = 0.0;

/// Default cue ceiling
pub const DEFAULT_THRESHOLD_DB: f32 = -0.5;

/// Lookahead window in ms
const LOOKAHEAD_MS: f32 = 1.5;

/// Release time for gain recovery in ms
const RELEASE_MS: f32 = 100.0;

// ============================================================================
// Helper Functions
// ============================================================================

/// Calculate envelope coefficient from time constant
#[inline]
fn time_to_coeff(time_ms: f32, sample_rate: f32) -> f32 {
    let samples = (time_ms * sample_rate / 1000.0).max(1.0);
    (-1.0 / samples).exp()
}

/// Minimum of `values[i..=i + window]` for every `i`, via a monotonic deque
fn forward_window_min(values: &[f32], window: usize) -> Vec<f32> {
    let n = values.len();
    let mut out = Vec::with_capacity(n);
    let mut deque: VecDeque<usize> = VecDeque::new();
    let mut next = 0;

    for i in 0..n {
        let end = (i + window).min(n - 1);
        while next <= end {
            while deque.back().is_some_and(|&j| values[j] >= values[next]) {
                deque.pop_back();
            }
            deque.push_back(next);
            next += 1;
        }
        while deque.front().is_some_and(|&j| j < i) {
            deque.pop_front();
        }
        out.push(deque.front().map_or(1.0, |&j| values[j]));
    }

    out
}

// ============================================================================
// Limiter Stage
// ============================================================================

/// Peak limiter with a fixed threshold
///
/// Channels are linked: one gain curve is computed from the loudest
/// channel at each frame and applied to all of them, preserving the stereo
/// image.
#[derive(Debug, Clone)]
pub struct Limiter {
    threshold_db: f32,
    threshold_linear: f32,
}

impl Limiter {
    /// Create a limiter
    ///
    /// `threshold_db` is clamped to -24..=0 dBFS.
    pub fn new(threshold_db: f32) -> Self {
        let clamped = threshold_db.clamp(MIN_THRESHOLD_DB, MAX_THRESHOLD_DB);
        Self {
            threshold_db: clamped,
            threshold_linear: db_to_linear(clamped),
        }
    }

    /// Get threshold in dB
    pub fn threshold_db(&self) -> f32 {
        self.threshold_db
    }

    /// Get threshold as linear amplitude
    pub fn threshold_linear(&self) -> f32 {
        self.threshold_linear
    }

    /// Gain each frame needs so its peak lands on the threshold
    fn required_gains(&self, buffer: &AudioBuffer) -> Vec<f32> {
        (0..buffer.len())
            .map(|frame| {
                let peak = buffer
                    .samples
                    .iter()
                    .map(|ch| ch[frame].abs())
                    .fold(0.0_f32, f32::max);
                if peak > self.threshold_linear {
                    self.threshold_linear / peak
                } else {
                    1.0
                }
            })
            .collect()
    }
}

impl Default for Limiter {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD_DB)
    }
}

impl EffectStage for Limiter {
    fn process(&self, buffer: &mut AudioBuffer) {
        if buffer.channels() == 0 || buffer.is_empty() {
            return;
        }
        buffer.sanitize();

        let sample_rate = buffer.sample_rate.max(1) as f32;
        let lookahead = (LOOKAHEAD_MS * sample_rate / 1000.0).round().max(1.0) as usize;
        // Attack settles within the lookahead window
        let attack_coeff = time_to_coeff(LOOKAHEAD_MS / 5.0, sample_rate);
        let release_coeff = time_to_coeff(RELEASE_MS, sample_rate);

        let targets = forward_window_min(&self.required_gains(buffer), lookahead);

        let mut envelope = 1.0_f32;
        for (frame, &target) in targets.iter().enumerate() {
            let coeff = if target < envelope {
                attack_coeff
            } else {
                release_coeff
            };
            envelope = target + coeff * (envelope - target);

            for channel in buffer.samples.iter_mut() {
                let sample = &mut channel[frame];
                *sample *= envelope;

                // Hard ceiling catches whatever the envelope has not yet absorbed
                if sample.abs() > self.threshold_linear {
                    *sample = sample.signum() * self.threshold_linear;
                }
            }
        }
    }

    fn effect_type(&self) -> &'static str {
        "limiter"
    }

    fn get_params(&self) -> Value {
        json!({
            "threshold_db": self.threshold_db,
            "lookahead_ms": LOOKAHEAD_MS,
            "release_ms": RELEASE_MS,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
