//! Cue Engine CLI
//!
//! Plays the open/close cues on command. Commands arrive on stdin, the
//! readiness line goes to stdout, and logs go to stderr.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use env_logger::Env;
use log::{debug, info};

use cue_engine::cli::Cli;
use cue_engine::control::Dispatcher;
use cue_engine::dsp::EffectsChain;
use cue_engine::engine::{list_output_devices, ClipLoader, CpalDriver, CuePipeline, InterruptController};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_level)).init();

    if cli.list_devices {
        for name in list_output_devices().context("failed to enumerate output devices")? {
            println!("{}", name);
        }
        return Ok(());
    }

    let config = cli.to_config().context("invalid configuration")?;
    debug!("Effective configuration: {:?}", config);

    let loader = ClipLoader::new(config.resolve_sounds_dir(&exe_dir()));
    info!(
        "Cue Engine v{} using sounds from {}",
        env!("CARGO_PKG_VERSION"),
        loader.sounds_dir().display()
    );

    let chain = EffectsChain::from_config(&config.effects);
    debug!("Effects chain: {}", chain.to_json());

    // Each component takes its own section of the configuration
    let driver = Arc::new(CpalDriver::new(config.output));
    let pipeline = CuePipeline::new(loader, chain);
    let dispatcher = Dispatcher::new(InterruptController::new(driver, pipeline), config.clips);

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    dispatcher
        .run(stdin.lock(), stdout.lock())
        .context("control channel failed")?;

    Ok(())
}

/// Directory of the running executable, or the working directory if that
/// cannot be determined
fn exe_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."))
}
