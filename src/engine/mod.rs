//! Playback Engine
//!
//! Everything between a clip request and sound coming out:
//! - Audio buffer type
//! - Clip loading and decoding
//! - Effects pipeline and interrupt controller
//! - Playback driver contract and the cpal implementation

pub mod buffer;
pub mod controller;
pub mod driver;
pub mod io;
pub mod output;

pub use buffer::AudioBuffer;
pub use controller::{CuePipeline, InterruptController};
pub use driver::{HandleState, PlaybackDriver, PlaybackHandle, PlaybackOutcome};
pub use io::{decode_file, ClipLoader, ClipRequest};
pub use output::{list_output_devices, CpalDriver};
