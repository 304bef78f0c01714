//! Line-oriented command loop

use std::io::{BufRead, Write};

use log::{debug, info};

use crate::config::CueClips;
use crate::control::command::{Action, Command, READY_LINE};
use crate::engine::InterruptController;
use crate::error::Result;

/// Reads commands from an input stream and drives the interrupt controller
///
/// Dispatch never waits on playback, so a command arriving mid-cue is
/// handled immediately.
pub struct Dispatcher {
    controller: InterruptController,
    clips: CueClips,
}

impl Dispatcher {
    pub fn new(controller: InterruptController, clips: CueClips) -> Self {
        Self { controller, clips }
    }

    /// Announce readiness, then process lines until end of input
    ///
    /// # Arguments
    /// * `input` - Command source, one command per line
    /// * `output` - Receives the single readiness line
    ///
    /// # Returns
    /// `Ok(())` at end of input. Errors only come from the streams
    /// themselves; playback failures stay inside their threads.
    pub fn run<R: BufRead, W: Write>(&self, mut input: R, mut output: W) -> Result<()> {
        writeln!(output, "{}", READY_LINE)?;
        output.flush()?;
        info!("Listening for commands");

        let mut raw = Vec::new();
        loop {
            raw.clear();
            if input.read_until(b'\n', &mut raw)? == 0 {
                break;
            }
            let line = String::from_utf8_lossy(&raw);
            self.dispatch_line(&line);
        }

        info!("Input closed, shutting down");
        Ok(())
    }

    /// Handle one raw input line; returns the command it matched, if any
    pub fn dispatch_line(&self, line: &str) -> Option<Command> {
        let Some(command) = Command::parse(line) else {
            debug!("Ignoring unrecognized line {:?}", line.trim());
            return None;
        };

        debug!("Received {}", command);
        match command.action(&self.clips) {
            Action::Play(request) => {
                // Detached: the thread outlives this call
                let _ = self.controller.start_playback(request);
            }
            Action::Halt => self.controller.halt(),
        }
        Some(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::EffectsChain;
    use crate::engine::{AudioBuffer, ClipLoader, CuePipeline, PlaybackDriver, PlaybackOutcome};
    use std::io::Cursor;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct StopCounter(Mutex<usize>);

    impl PlaybackDriver for StopCounter {
        fn stop(&self) {
            *self.0.lock().unwrap() += 1;
        }

        fn play(&self, _buffer: AudioBuffer) -> crate::error::Result<PlaybackOutcome> {
            Ok(PlaybackOutcome::Completed)
        }
    }

    fn dispatcher(driver: Arc<StopCounter>) -> Dispatcher {
        let pipeline = CuePipeline::new(
            ClipLoader::new("/nonexistent/sounds"),
            EffectsChain::default(),
        );
        Dispatcher::new(
            InterruptController::new(driver, pipeline),
            CueClips::default(),
        )
    }

    #[test]
    fn test_ready_written_on_empty_input() {
        let dispatcher = dispatcher(Arc::new(StopCounter::default()));
        let mut out = Vec::new();

        dispatcher.run(Cursor::new(""), &mut out).unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "READY\n");
    }

    #[test]
    fn test_ready_is_the_only_output() {
        let dispatcher = dispatcher(Arc::new(StopCounter::default()));
        let mut out = Vec::new();

        dispatcher
            .run(Cursor::new("FOO\nMUTE_TOGGLE\nbar\n"), &mut out)
            .unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "READY\n");
    }

    #[test]
    fn test_unknown_lines_do_nothing() {
        let driver = Arc::new(StopCounter::default());
        let dispatcher = dispatcher(Arc::clone(&driver));

        assert_eq!(dispatcher.dispatch_line("FOO"), None);
        assert_eq!(dispatcher.dispatch_line(""), None);
        assert_eq!(*driver.0.lock().unwrap(), 0);
    }

    #[test]
    fn test_mute_toggle_always_stops() {
        let driver = Arc::new(StopCounter::default());
        let dispatcher = dispatcher(Arc::clone(&driver));

        dispatcher.dispatch_line("mute_toggle");
        dispatcher.dispatch_line("MUTE_TOGGLE");

        assert_eq!(*driver.0.lock().unwrap(), 2);
    }

    #[test]
    fn test_invalid_utf8_does_not_end_loop() {
        let driver = Arc::new(StopCounter::default());
        let dispatcher = dispatcher(Arc::clone(&driver));
        let mut input = vec![0xff, 0xfe, b'\n'];
        input.extend_from_slice(b"MUTE_TOGGLE\n");

        dispatcher.run(Cursor::new(input), Vec::new()).unwrap();

        assert_eq!(*driver.0.lock().unwrap(), 1);
    }

    #[test]
    fn test_last_line_without_newline() {
        let driver = Arc::new(StopCounter::default());
        let dispatcher = dispatcher(Arc::clone(&driver));

        dispatcher
            .run(Cursor::new("MUTE_TOGGLE"), Vec::new())
            .unwrap();

        assert_eq!(*driver.0.lock().unwrap(), 1);
    }
}
