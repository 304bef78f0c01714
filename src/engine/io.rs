//! Clip loading
//!
//! Turns a clip request into an in-memory [`AudioBuffer`]. WAV files go
//! through `hound`; everything else (MP3, FLAC, Vorbis, AAC) goes through
//! `symphonia`. Either way the result is 32-bit float, converted once
//! here so the effects chain never sees another sample format.

use std::fs::File;
use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavReader};
use log::{debug, warn};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::engine::buffer::AudioBuffer;
use crate::error::{CueError, Result};

/// A request to play one clip, identified by its file name in the sound
/// directory
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClipRequest {
    clip: String,
}

impl ClipRequest {
    pub fn new(clip: impl Into<String>) -> Self {
        Self { clip: clip.into() }
    }

    /// Clip identifier
    pub fn clip(&self) -> &str {
        &self.clip
    }
}

/// Resolves clip identifiers inside a sound directory and decodes them
#[derive(Debug, Clone)]
pub struct ClipLoader {
    sounds_dir: PathBuf,
}

impl ClipLoader {
    /// Create a loader rooted at `sounds_dir`
    ///
    /// The directory is not required to exist; missing clips are reported
    /// per request.
    pub fn new(sounds_dir: impl Into<PathBuf>) -> Self {
        Self {
            sounds_dir: sounds_dir.into(),
        }
    }

    /// Directory clips are resolved against
    pub fn sounds_dir(&self) -> &Path {
        &self.sounds_dir
    }

    /// Path a request resolves to
    pub fn resolve(&self, request: &ClipRequest) -> PathBuf {
        self.sounds_dir.join(request.clip())
    }

    /// Load and decode the clip behind `request`
    ///
    /// # Errors
    /// * `ClipNotFound` - the resolved path is not a file
    /// * `DecodeFailure` / `UnsupportedFormat` - the file cannot be decoded
    pub fn load(&self, request: &ClipRequest) -> Result<AudioBuffer> {
        let path = self.resolve(request);
        if !path.is_file() {
            return Err(CueError::ClipNotFound {
                path: path.display().to_string(),
            });
        }

        let buffer = decode_file(&path)?;
        debug!(
            "Loaded {}: {} ch, {} frames @ {} Hz ({:.2}s)",
            path.display(),
            buffer.channels(),
            buffer.len(),
            buffer.sample_rate,
            buffer.duration_secs()
        );
        Ok(buffer)
    }
}

/// Decode an entire audio file to an f32 buffer
///
/// The decoder is chosen by extension: `.wav`/`.wave` use hound, anything
/// else is probed by symphonia.
pub fn decode_file(path: &Path) -> Result<AudioBuffer> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    let mut buffer = match extension.as_deref() {
        Some("wav") | Some("wave") => decode_wav(path)?,
        _ => decode_compressed(path, extension.as_deref())?,
    };

    if buffer.is_empty() {
        return Err(CueError::decode(
            path.display().to_string(),
            "file contains no audio frames",
        ));
    }

    let replaced = buffer.sanitize();
    if replaced > 0 {
        warn!(
            "{}: replaced {} non-finite samples with silence",
            path.display(),
            replaced
        );
    }

    Ok(buffer)
}

// ============================================================================
// WAV (hound)
// ============================================================================

fn decode_wav(path: &Path) -> Result<AudioBuffer> {
    let display = path.display().to_string();
    let reader = WavReader::open(path).map_err(|e| CueError::DecodeFailure {
        path: display.clone(),
        reason: format!("failed to open WAV file: {}", e),
        source: Some(Box::new(e)),
    })?;

    let spec = reader.spec();
    let interleaved =
        read_samples_as_f32(reader, spec.bits_per_sample, spec.sample_format, &display)?;

    AudioBuffer::from_interleaved(&interleaved, spec.channels as usize, spec.sample_rate)
}

/// Read samples from WAV reader and convert to f32
fn read_samples_as_f32<R: std::io::Read>(
    mut reader: WavReader<R>,
    bits_per_sample: u16,
    sample_format: SampleFormat,
    display: &str,
) -> Result<Vec<f32>> {
    let failed = |bits: &str, e: hound::Error| CueError::DecodeFailure {
        path: display.to_string(),
        reason: format!("failed to read {} samples: {}", bits, e),
        source: Some(Box::new(e)),
    };

    match sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(|e| failed("float", e)),
        SampleFormat::Int => match bits_per_sample {
            8 => reader
                .samples::<i8>()
                .map(|s| s.map(|v| v as f32 / 128.0))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(|e| failed("8-bit", e)),
            16 => reader
                .samples::<i16>()
                .map(|s| s.map(|v| v as f32 / 32768.0))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(|e| failed("16-bit", e)),
            // 24-bit is stored as i32 in hound
            24 => reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / 8388608.0))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(|e| failed("24-bit", e)),
            32 => reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / 2147483648.0))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(|e| failed("32-bit int", e)),
            _ => Err(CueError::UnsupportedFormat {
                format: format!("{}-bit integer audio", bits_per_sample),
            }),
        },
    }
}

// ============================================================================
// Compressed formats (symphonia)
// ============================================================================

fn decode_compressed(path: &Path, extension: Option<&str>) -> Result<AudioBuffer> {
    let display = path.display().to_string();

    let file = File::open(path).map_err(|e| CueError::DecodeFailure {
        path: display.clone(),
        reason: format!("failed to open file: {}", e),
        source: Some(Box::new(e)),
    })?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| CueError::DecodeFailure {
            path: display.clone(),
            reason: format!("failed to probe format: {}", e),
            source: Some(Box::new(e)),
        })?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| CueError::decode(display.clone(), "no audio track found"))?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate;
    let mut channels = track.codec_params.channels.map(|c| c.count());

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| CueError::DecodeFailure {
            path: display.clone(),
            reason: format!("failed to create decoder: {}", e),
            source: Some(Box::new(e)),
        })?;

    let mut interleaved: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => {
                return Err(CueError::DecodeFailure {
                    path: display,
                    reason: format!("failed to read packet: {}", e),
                    source: Some(Box::new(e)),
                });
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            // Corrupt frames are skipped, the rest of the clip still plays
            Err(SymphoniaError::DecodeError(e)) => {
                warn!("Skipping undecodable packet in {}: {}", display, e);
                continue;
            }
            Err(e) => {
                return Err(CueError::DecodeFailure {
                    path: display,
                    reason: format!("decoder error: {}", e),
                    source: Some(Box::new(e)),
                });
            }
        };

        let spec = *decoded.spec();
        sample_rate.get_or_insert(spec.rate);
        channels.get_or_insert(spec.channels.count());

        let needed = decoded.capacity() as u64;
        if sample_buf
            .as_ref()
            .map_or(true, |buf| (buf.capacity() as u64) < needed)
        {
            sample_buf = Some(SampleBuffer::<f32>::new(needed, spec));
        }
        if let Some(buf) = sample_buf.as_mut() {
            buf.copy_interleaved_ref(decoded);
            interleaved.extend_from_slice(buf.samples());
        }
    }

    let sample_rate =
        sample_rate.ok_or_else(|| CueError::decode(display.clone(), "sample rate not found"))?;
    let channels =
        channels.ok_or_else(|| CueError::decode(display.clone(), "channel count not found"))?;

    AudioBuffer::from_interleaved(&interleaved, channels, sample_rate)
}

// ============================================================================
// Tests
// ============================================================================
