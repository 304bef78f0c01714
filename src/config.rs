//! Engine configuration
//!
//! Built once at startup (defaults, then an optional JSON file, then CLI
//! overrides), validated, and shared read-only afterwards.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::dsp::{
    DEFAULT_GAIN_DB, DEFAULT_THRESHOLD_DB, MAX_GAIN_DB, MAX_THRESHOLD_DB, MIN_GAIN_DB,
    MIN_THRESHOLD_DB,
};
use crate::error::{CueError, Result};

/// Default output block size in frames
pub const DEFAULT_BLOCK_SIZE: u32 = 2048;

/// Name of the sound asset directory next to the executable
const SOUNDS_DIR_NAME: &str = "sounds";

/// Complete engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory clips are resolved against (None = auto-detect)
    pub sounds_dir: Option<PathBuf>,
    pub clips: CueClips,
    pub effects: EffectsConfig,
    pub output: OutputSettings,
}

/// File names of the clips behind each play command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CueClips {
    pub open: String,
    pub close: String,
}

impl Default for CueClips {
    fn default() -> Self {
        Self {
            open: "WormholeOpen.mp3".to_string(),
            close: "WormholeClose.mp3".to_string(),
        }
    }
}

/// Parameters of the fixed effects chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectsConfig {
    pub gain_db: f32,
    pub limiter_threshold_db: f32,
}

impl Default for EffectsConfig {
    fn default() -> Self {
        Self {
            gain_db: DEFAULT_GAIN_DB,
            limiter_threshold_db: DEFAULT_THRESHOLD_DB,
        }
    }
}

/// Latency class requested from the output device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LatencyClass {
    /// Smallest block the device supports
    Low,
    /// Configured block size, favoring underrun avoidance
    #[default]
    High,
}

/// Sample representation handed to the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleRepr {
    #[default]
    F32,
    I16,
}

/// Engine-wide output device defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub latency: LatencyClass,
    /// Block size in frames
    pub block_size: u32,
    pub sample_format: SampleRepr,
    /// Output device name (None = host default)
    pub device: Option<String>,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            latency: LatencyClass::High,
            block_size: DEFAULT_BLOCK_SIZE,
            sample_format: SampleRepr::F32,
            device: None,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file
    ///
    /// Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&text)?;
        Ok(config)
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.output.block_size == 0 {
            return Err(CueError::Config {
                reason: "output block size must be greater than zero".to_string(),
            });
        }
        // Ranges the stages accept without clamping
        let gain_db = self.effects.gain_db;
        if !(MIN_GAIN_DB..=MAX_GAIN_DB).contains(&gain_db) {
            return Err(CueError::Config {
                reason: format!(
                    "gain must be within {} to {} dB, got {}",
                    MIN_GAIN_DB, MAX_GAIN_DB, gain_db
                ),
            });
        }
        let threshold_db = self.effects.limiter_threshold_db;
        if !(MIN_THRESHOLD_DB..=MAX_THRESHOLD_DB).contains(&threshold_db) {
            return Err(CueError::Config {
                reason: format!(
                    "limiter threshold must be within {} to {} dBFS, got {}",
                    MIN_THRESHOLD_DB, MAX_THRESHOLD_DB, threshold_db
                ),
            });
        }
        if self.clips.open.is_empty() || self.clips.close.is_empty() {
            return Err(CueError::Config {
                reason: "clip names must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Sound directory to use, falling back to auto-detection next to
    /// `exe_dir`
    pub fn resolve_sounds_dir(&self, exe_dir: &Path) -> PathBuf {
        match &self.sounds_dir {
            Some(dir) => dir.clone(),
            None => detect_sounds_dir(exe_dir),
        }
    }
}

/// Find the sound directory: `<exe_dir>/sounds`, else `<exe_dir>/../sounds`
///
/// The first candidate is returned when neither exists; playback then
/// reports each clip as missing.
pub fn detect_sounds_dir(exe_dir: &Path) -> PathBuf {
    let beside = exe_dir.join(SOUNDS_DIR_NAME);
    let candidate = if beside.is_dir() {
        beside
    } else {
        let parent = exe_dir.join("..").join(SOUNDS_DIR_NAME);
        if parent.is_dir() {
            parent
        } else {
            beside
        }
    };

    candidate.canonicalize().unwrap_or(candidate)
}
