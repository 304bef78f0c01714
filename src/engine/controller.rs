//! Interrupt controller
//!
//! Keeps at most one cue audible: every play request stops the driver
//! before its own pipeline is spawned, and mute is a bare stop.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{debug, warn};

use crate::dsp::EffectsChain;
use crate::engine::driver::{PlaybackDriver, PlaybackOutcome};
use crate::engine::io::{ClipLoader, ClipRequest};
use crate::error::Result;

/// Load → process → render for one request
#[derive(Debug)]
pub struct CuePipeline {
    loader: ClipLoader,
    chain: EffectsChain,
}

impl CuePipeline {
    pub fn new(loader: ClipLoader, chain: EffectsChain) -> Self {
        Self { loader, chain }
    }

    /// Run the whole pipeline on the calling thread
    ///
    /// Each stage reports its own failure kind: `ClipNotFound` or
    /// `DecodeFailure` from loading, `DeviceFailure` from rendering.
    pub fn run(&self, request: &ClipRequest, driver: &dyn PlaybackDriver) -> Result<PlaybackOutcome> {
        let buffer = self.loader.load(request)?;
        let processed = self.chain.process(buffer);
        driver.play(processed)
    }
}

/// Owns the stop-then-start policy around a shared playback driver
pub struct InterruptController {
    driver: Arc<dyn PlaybackDriver>,
    pipeline: Arc<CuePipeline>,
}

impl InterruptController {
    pub fn new(driver: Arc<dyn PlaybackDriver>, pipeline: CuePipeline) -> Self {
        Self {
            driver,
            pipeline: Arc::new(pipeline),
        }
    }

    /// Stop whatever is playing; returns once the stop has been issued
    pub fn halt(&self) {
        self.driver.stop();
    }

    /// Halt current audio, then run the pipeline for `request` on a new
    /// thread
    ///
    /// The returned handle may be dropped to detach the thread. Failures
    /// inside the thread are logged and go no further. `None` means the
    /// thread could not be spawned, which is logged as well.
    pub fn start_playback(&self, request: ClipRequest) -> Option<JoinHandle<()>> {
        self.halt();

        let driver = Arc::clone(&self.driver);
        let pipeline = Arc::clone(&self.pipeline);
        let name = format!("cue-{}", request.clip());

        let spawned = thread::Builder::new().name(name).spawn(move || {
            match pipeline.run(&request, driver.as_ref()) {
                Ok(PlaybackOutcome::Completed) => debug!("Cue '{}' finished", request.clip()),
                Ok(PlaybackOutcome::Stopped) => debug!("Cue '{}' interrupted", request.clip()),
                Err(e) => warn!(
                    "[{}] Cue '{}' not played: {}",
                    e.error_code(),
                    request.clip(),
                    e
                ),
            }
        });

        match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("Failed to spawn playback thread: {}", e);
                None
            }
        }
    }
}
