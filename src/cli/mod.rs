//! CLI Module
//!
//! Command-line flags and how they layer over the configuration file.

use clap::Parser;
use std::path::PathBuf;

use crate::config::EngineConfig;
use crate::error::Result;

/// Cue Engine - plays short audio cues on command from stdin
#[derive(Parser, Debug, Default)]
#[command(name = "cue-engine")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// JSON configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory holding the cue clips
    #[arg(short, long)]
    pub sounds_dir: Option<PathBuf>,

    /// Output device name
    #[arg(short, long)]
    pub device: Option<String>,

    /// Output block size in frames
    #[arg(long)]
    pub block_size: Option<u32>,

    /// Gain applied before limiting, in dB
    #[arg(long, allow_negative_numbers = true)]
    pub gain_db: Option<f32>,

    /// Limiter ceiling, in dBFS
    #[arg(long, allow_negative_numbers = true)]
    pub threshold_db: Option<f32>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Print available output devices and exit
    #[arg(long)]
    pub list_devices: bool,
}

impl Cli {
    /// Build the effective configuration
    ///
    /// Defaults, then the `--config` file if given, then individual flags.
    /// The result is validated.
    pub fn to_config(&self) -> Result<EngineConfig> {
        let mut config = match &self.config {
            Some(path) => EngineConfig::from_json_file(path)?,
            None => EngineConfig::default(),
        };
        self.apply_overrides(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// Overwrite config fields with any flags that were given
    pub fn apply_overrides(&self, config: &mut EngineConfig) {
        if let Some(dir) = &self.sounds_dir {
            config.sounds_dir = Some(dir.clone());
        }
        if let Some(device) = &self.device {
            config.output.device = Some(device.clone());
        }
        if let Some(block_size) = self.block_size {
            config.output.block_size = block_size;
        }
        if let Some(gain_db) = self.gain_db {
            config.effects.gain_db = gain_db;
        }
        if let Some(threshold_db) = self.threshold_db {
            config.effects.limiter_threshold_db = threshold_db;
        }
    }
}
