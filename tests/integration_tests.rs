//! Integration Tests
//!
//! End-to-end tests from control lines to rendered buffers, with a
//! recording driver standing in for the sound card.

use std::io::Cursor;
use std::path::Path;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use approx::assert_relative_eq;
use pretty_assertions::assert_eq;
use tempfile::{tempdir, TempDir};

use cue_engine::config::CueClips;
use cue_engine::control::Dispatcher;
use cue_engine::dsp::EffectsChain;
use cue_engine::engine::{
    AudioBuffer, ClipLoader, ClipRequest, CuePipeline, InterruptController, PlaybackDriver,
    PlaybackOutcome,
};
use cue_engine::Result;

const OPEN_FRAMES: usize = 4800;
const CLOSE_FRAMES: usize = 9600;
const TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Stop,
    Play { frames: usize, peak: f32 },
    Ended(PlaybackOutcome),
}

/// Driver that records every call and holds each render until stopped or
/// `hold` elapses
struct RecordingDriver {
    events: Mutex<Vec<Event>>,
    changed: Condvar,
    hold: Duration,
}

impl RecordingDriver {
    fn new(hold: Duration) -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(Vec::new()),
            changed: Condvar::new(),
            hold,
        })
    }

    fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    /// Block until `done` holds for the event log, panicking on timeout
    fn wait_until(&self, done: impl Fn(&[Event]) -> bool) -> Vec<Event> {
        let guard = self.events.lock().unwrap();
        let (guard, result) = self
            .changed
            .wait_timeout_while(guard, TIMEOUT, |events| !done(events.as_slice()))
            .unwrap();
        assert!(!result.timed_out(), "timed out, events so far: {:?}", *guard);
        guard.clone()
    }

    fn wait_for_plays(&self, n: usize) -> Vec<Event> {
        self.wait_until(|events| plays(events).len() >= n)
    }

    fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
        self.changed.notify_all();
    }
}

impl PlaybackDriver for RecordingDriver {
    fn stop(&self) {
        self.push(Event::Stop);
    }

    fn play(&self, buffer: AudioBuffer) -> Result<PlaybackOutcome> {
        let mut events = self.events.lock().unwrap();
        events.push(Event::Play {
            frames: buffer.len(),
            peak: buffer.peak(),
        });
        let start = events.len();
        self.changed.notify_all();

        let (mut events, result) = self
            .changed
            .wait_timeout_while(events, self.hold, |events| {
                !events[start..].contains(&Event::Stop)
            })
            .unwrap();

        let outcome = if result.timed_out() {
            PlaybackOutcome::Completed
        } else {
            PlaybackOutcome::Stopped
        };
        events.push(Event::Ended(outcome));
        self.changed.notify_all();
        Ok(outcome)
    }
}

fn plays(events: &[Event]) -> Vec<usize> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::Play { frames, .. } => Some(*frames),
            _ => None,
        })
        .collect()
}

fn stops(events: &[Event]) -> usize {
    events.iter().filter(|e| **e == Event::Stop).count()
}

/// Helper to write a constant-level mono 16-bit WAV clip
fn write_clip(dir: &Path, name: &str, frames: usize, level: i16) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 48000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(dir.join(name), spec).unwrap();
    for i in 0..frames {
        let sample = if i % 2 == 0 { level } else { -level };
        writer.write_sample(sample).unwrap();
    }
    writer.finalize().unwrap();
}

struct Rig {
    _dir: TempDir,
    driver: Arc<RecordingDriver>,
    dispatcher: Dispatcher,
}

fn rig(hold: Duration) -> Rig {
    let dir = tempdir().unwrap();
    write_clip(dir.path(), "open.wav", OPEN_FRAMES, 16000);
    write_clip(dir.path(), "close.wav", CLOSE_FRAMES, 16000);

    let driver = RecordingDriver::new(hold);
    let pipeline = CuePipeline::new(ClipLoader::new(dir.path()), EffectsChain::default());
    let controller = InterruptController::new(driver.clone(), pipeline);
    let clips = CueClips {
        open: "open.wav".to_string(),
        close: "close.wav".to_string(),
    };

    Rig {
        _dir: dir,
        driver,
        dispatcher: Dispatcher::new(controller, clips),
    }
}

fn sine(frames: usize, amplitude: f32) -> AudioBuffer {
    let samples = (0..frames)
        .map(|i| amplitude * (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 48000.0).sin())
        .collect();
    AudioBuffer::from_channels(vec![samples], 48000).unwrap()
}

// ============================================================================
// Control channel
// ============================================================================

#[test]
fn test_empty_input_prints_ready_and_exits() {
    let rig = rig(Duration::ZERO);
    let mut out = Vec::new();

    rig.dispatcher.run(Cursor::new(""), &mut out).unwrap();

    assert_eq!(String::from_utf8(out).unwrap(), "READY\n");
    assert!(rig.driver.events().is_empty());
}

#[test]
fn test_unknown_command_is_ignored() {
    let rig = rig(Duration::ZERO);
    let mut out = Vec::new();

    rig.dispatcher.run(Cursor::new("FOO\n\n"), &mut out).unwrap();

    assert_eq!(String::from_utf8(out).unwrap(), "READY\n");
    assert!(rig.driver.events().is_empty());
}

#[test]
fn test_play_open_stops_then_plays_open_clip() {
    let rig = rig(Duration::ZERO);

    rig.dispatcher
        .run(Cursor::new("PLAY_OPEN\n"), Vec::new())
        .unwrap();

    let events = rig.driver.wait_for_plays(1);
    assert_eq!(events[0], Event::Stop);
    assert_eq!(plays(&events), vec![OPEN_FRAMES]);
}

#[test]
fn test_commands_are_case_insensitive() {
    let rig = rig(Duration::ZERO);

    rig.dispatcher
        .run(Cursor::new("  play_close  \n"), Vec::new())
        .unwrap();

    let events = rig.driver.wait_for_plays(1);
    assert_eq!(plays(&events), vec![CLOSE_FRAMES]);
}

#[test]
fn test_mute_toggle_when_idle_only_stops() {
    let rig = rig(Duration::ZERO);

    rig.dispatcher
        .run(Cursor::new("MUTE_TOGGLE\n"), Vec::new())
        .unwrap();

    assert_eq!(rig.driver.events(), vec![Event::Stop]);
}

// ============================================================================
// Interruption
// ============================================================================

#[test]
fn test_close_interrupts_open() {
    let rig = rig(TIMEOUT * 2);

    rig.dispatcher.dispatch_line("PLAY_OPEN");
    rig.driver.wait_for_plays(1);
    rig.dispatcher.dispatch_line("PLAY_CLOSE");

    let events = rig.driver.wait_until(|events| {
        plays(events).len() == 2 && events.contains(&Event::Ended(PlaybackOutcome::Stopped))
    });

    assert_eq!(plays(&events), vec![OPEN_FRAMES, CLOSE_FRAMES]);
    // The second stop lands before the close clip starts
    let second_stop = events
        .iter()
        .enumerate()
        .filter(|(_, e)| **e == Event::Stop)
        .nth(1)
        .map(|(i, _)| i)
        .unwrap();
    let close_play = events
        .iter()
        .position(|e| matches!(e, Event::Play { frames, .. } if *frames == CLOSE_FRAMES))
        .unwrap();
    assert!(second_stop < close_play);
}

#[test]
fn test_mute_toggle_silences_playing_cue() {
    let rig = rig(TIMEOUT * 2);

    rig.dispatcher.dispatch_line("PLAY_OPEN");
    rig.driver.wait_for_plays(1);
    rig.dispatcher.dispatch_line("MUTE_TOGGLE");

    let events = rig
        .driver
        .wait_until(|events| events.contains(&Event::Ended(PlaybackOutcome::Stopped)));

    assert_eq!(plays(&events), vec![OPEN_FRAMES]);
    assert_eq!(stops(&events), 2);
}

#[test]
fn test_back_to_back_commands_play_both_clips() {
    let rig = rig(Duration::ZERO);

    rig.dispatcher
        .run(Cursor::new("PLAY_OPEN\nPLAY_CLOSE\n"), Vec::new())
        .unwrap();

    let events = rig.driver.wait_for_plays(2);
    assert!(stops(&events) >= 2);
    assert_eq!(events[0], Event::Stop);

    // The k-th render to reach the driver follows at least k stops
    let mut stops_seen = 0;
    let mut plays_seen = 0;
    for event in &events {
        match event {
            Event::Stop => stops_seen += 1,
            Event::Play { .. } => {
                plays_seen += 1;
                assert!(
                    stops_seen >= plays_seen,
                    "play #{} preceded by only {} stops: {:?}",
                    plays_seen,
                    stops_seen,
                    events
                );
            }
            Event::Ended(_) => {}
        }
    }

    // Which clip reaches the driver last is not fixed, but both get there
    let mut played = plays(&events);
    played.sort_unstable();
    assert_eq!(played, vec![OPEN_FRAMES, CLOSE_FRAMES]);
}

// ============================================================================
// Failure containment
// ============================================================================

#[test]
fn test_missing_clip_does_not_stop_the_engine() {
    let dir = tempdir().unwrap();
    write_clip(dir.path(), "close.wav", CLOSE_FRAMES, 16000);

    let driver = RecordingDriver::new(Duration::ZERO);
    let pipeline = CuePipeline::new(ClipLoader::new(dir.path()), EffectsChain::default());
    let controller = InterruptController::new(driver.clone(), pipeline);

    let handle = controller
        .start_playback(ClipRequest::new("missing.mp3"))
        .unwrap();
    handle.join().unwrap();
    assert_eq!(driver.events(), vec![Event::Stop]);

    let handle = controller
        .start_playback(ClipRequest::new("close.wav"))
        .unwrap();
    handle.join().unwrap();
    assert_eq!(plays(&driver.events()), vec![CLOSE_FRAMES]);
}

#[test]
fn test_undecodable_clip_is_contained() {
    let rig = rig(Duration::ZERO);
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("open.wav"), b"not a wave file").unwrap();

    let pipeline = CuePipeline::new(ClipLoader::new(dir.path()), EffectsChain::default());
    let controller = InterruptController::new(rig.driver.clone(), pipeline);
    let handle = controller
        .start_playback(ClipRequest::new("open.wav"))
        .unwrap();

    assert!(handle.join().is_ok());
    assert!(plays(&rig.driver.events()).is_empty());
}

// ============================================================================
// Effects chain
// ============================================================================

#[test]
fn test_full_scale_input_is_attenuated_not_limited() {
    let input = sine(4800, 1.0);
    let output = EffectsChain::default().process(input.clone());

    // 0 dBFS - 8 dB sits well under the -0.5 dBFS ceiling. With the
    // limiter first the peak would be capped before attenuation.
    let gain = 10.0_f32.powf(-8.0 / 20.0);
    for (a, b) in input.channel(0).iter().zip(output.channel(0)) {
        assert_relative_eq!(*b, a * gain, epsilon = 1e-4);
    }
}

#[test]
fn test_hot_input_is_held_under_ceiling() {
    let output = EffectsChain::default().process(sine(4800, 4.0));
    let ceiling = 10.0_f32.powf(-0.5 / 20.0);

    assert!(
        output.peak() <= ceiling + 1e-6,
        "peak {} exceeds ceiling {}",
        output.peak(),
        ceiling
    );
}

#[test]
fn test_non_finite_input_comes_out_silent() {
    let mut input = sine(4800, 1.0);
    input.set_sample(0, 100, f32::NAN);
    input.set_sample(0, 200, f32::INFINITY);

    let output = EffectsChain::default().process(input);

    assert!(output.is_finite());
    assert_eq!(output.get_sample(0, 100), Some(0.0));
    assert_eq!(output.get_sample(0, 200), Some(0.0));
}

#[test]
fn test_chain_is_deterministic() {
    let chain = EffectsChain::default();
    let input = sine(2400, 3.0);

    assert_eq!(chain.process(input.clone()), chain.process(input));
}

#[test]
fn test_rendered_level_matches_chain() {
    let rig = rig(Duration::ZERO);

    rig.dispatcher.dispatch_line("PLAY_OPEN");
    let events = rig.driver.wait_for_plays(1);

    let peak = events
        .iter()
        .find_map(|e| match e {
            Event::Play { peak, .. } => Some(*peak),
            _ => None,
        })
        .unwrap();
    let expected = 16000.0 / 32768.0 * 10.0_f32.powf(-8.0 / 20.0);
    assert_relative_eq!(peak, expected, epsilon = 1e-4);
}
