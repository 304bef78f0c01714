//! Cue Engine - command-driven audio cue player
//!
//! Plays one of two short clips on request from a line-oriented control
//! channel, interrupting whatever was playing before.
//!
//! # Architecture
//!
//! A play request flows through:
//! - Control: parse the line, map it to an action
//! - Interrupt controller: stop current audio, spawn the pipeline
//! - Pipeline: load and decode, then Gain followed by Limiter
//! - Playback driver: render to the output device until done or stopped

pub mod cli;
pub mod config;
pub mod control;
pub mod dsp;
pub mod engine;
pub mod error;

pub use error::{CueError, Result};
