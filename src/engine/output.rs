//! Audio output using cpal
//!
//! [`CpalDriver`] renders one clip at a time. Each `play` opens a stream
//! sized for the clip, feeds it from memory, and blocks until the clip has
//! been consumed by the device or `stop()` retires its handle.

use std::sync::{Arc, Mutex, PoisonError};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{
    BufferSize, Device, FromSample, Sample, SampleFormat, SampleRate, SizedSample, Stream,
    StreamConfig, SupportedBufferSize,
};
use log::{debug, error, info, warn};

use crate::config::{LatencyClass, OutputSettings, SampleRepr};
use crate::engine::driver::{HandleState, PlaybackDriver, PlaybackHandle, PlaybackOutcome};
use crate::engine::AudioBuffer;
use crate::error::{CueError, Result};

/// List the names of all output devices on the default host
pub fn list_output_devices() -> Result<Vec<String>> {
    let host = cpal::default_host();

    let devices: Vec<String> = host
        .output_devices()
        .map_err(|e| CueError::device(format!("failed to enumerate devices: {}", e)))?
        .filter_map(|device| device.name().ok())
        .collect();

    debug!("Found {} output devices", devices.len());
    Ok(devices)
}

/// Playback driver backed by the default cpal host
pub struct CpalDriver {
    settings: OutputSettings,
    /// Handle of the render in progress, if any
    current: Mutex<Option<Arc<PlaybackHandle>>>,
}

impl CpalDriver {
    /// Create a driver; no device is opened until the first `play`
    pub fn new(settings: OutputSettings) -> Self {
        info!(
            "Output: latency={:?}, block_size={}, format={:?}, device={}",
            settings.latency,
            settings.block_size,
            settings.sample_format,
            settings.device.as_deref().unwrap_or("default")
        );
        Self {
            settings,
            current: Mutex::new(None),
        }
    }

    /// Install a fresh handle, retiring any render still registered
    fn register(&self) -> Arc<PlaybackHandle> {
        let handle = Arc::new(PlaybackHandle::new());
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = current.replace(Arc::clone(&handle)) {
            previous.stop();
        }
        handle
    }

    /// Clear the registered handle if it is still ours
    fn release(&self, handle: &Arc<PlaybackHandle>) {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if current.as_ref().is_some_and(|c| Arc::ptr_eq(c, handle)) {
            *current = None;
        }
    }

    /// Open the configured device, falling back to the host default
    fn open_device(&self) -> Result<Device> {
        let host = cpal::default_host();

        if let Some(name) = self.settings.device.as_ref() {
            let mut devices = host
                .output_devices()
                .map_err(|e| CueError::device(format!("failed to enumerate devices: {}", e)))?;

            match devices.find(|d| d.name().ok().as_ref() == Some(name)) {
                Some(device) => return Ok(device),
                None => warn!(
                    "Requested device '{}' not found, falling back to default device",
                    name
                ),
            }
        }

        host.default_output_device()
            .ok_or_else(|| CueError::device("no default output device found"))
    }

    /// Pick a stream configuration for `buffer`, converting the buffer when
    /// the device cannot take it as-is
    fn negotiate(
        &self,
        device: &Device,
        buffer: AudioBuffer,
    ) -> Result<(StreamConfig, SampleFormat, AudioBuffer)> {
        let channels = buffer.channels() as u16;
        let rate = buffer.sample_rate;
        let preferred = match self.settings.sample_format {
            SampleRepr::F32 => SampleFormat::F32,
            SampleRepr::I16 => SampleFormat::I16,
        };

        let supported: Vec<_> = device
            .supported_output_configs()
            .map_err(|e| CueError::device(format!("failed to get device configs: {}", e)))?
            .filter(|c| is_renderable(c.sample_format()))
            .collect();

        let native = supported
            .iter()
            .filter(|c| {
                c.channels() == channels
                    && c.min_sample_rate().0 <= rate
                    && c.max_sample_rate().0 >= rate
            })
            .min_by_key(|c| c.sample_format() != preferred);

        if let Some(range) = native {
            let buffer_size = block_frames(&self.settings, range.buffer_size());
            let format = range.sample_format();
            let mut config = range.clone().with_sample_rate(SampleRate(rate)).config();
            config.buffer_size = buffer_size;
            return Ok((config, format, buffer));
        }

        let default = device
            .default_output_config()
            .map_err(|e| CueError::device(format!("failed to get default config: {}", e)))?;
        let format = default.sample_format();
        let buffer_size = block_frames(&self.settings, default.buffer_size());
        let mut config = default.config();
        config.buffer_size = buffer_size;

        debug!(
            "Device cannot play {} ch @ {} Hz natively, converting to {} ch @ {} Hz",
            channels, rate, config.channels, config.sample_rate.0
        );
        let buffer = conform(buffer, config.channels as usize, config.sample_rate.0);
        Ok((config, format, buffer))
    }

    fn render(&self, buffer: AudioBuffer, handle: &Arc<PlaybackHandle>) -> Result<PlaybackOutcome> {
        let device = self.open_device()?;
        let (config, format, buffer) = self.negotiate(&device, buffer)?;

        // A stop may have landed while the device was being set up
        if !handle.is_rendering() {
            return Ok(PlaybackOutcome::Stopped);
        }

        debug!(
            "Rendering {} frames: {} ch @ {} Hz, {:?}, {:?}",
            buffer.len(),
            config.channels,
            config.sample_rate.0,
            format,
            config.buffer_size
        );

        let samples = buffer.to_interleaved();
        let stream = match format {
            SampleFormat::F32 => build_stream::<f32>(&device, &config, samples, handle)?,
            SampleFormat::I16 => build_stream::<i16>(&device, &config, samples, handle)?,
            SampleFormat::U16 => build_stream::<u16>(&device, &config, samples, handle)?,
            other => {
                return Err(CueError::device(format!(
                    "unsupported sample format: {:?}",
                    other
                )));
            }
        };

        stream
            .play()
            .map_err(|e| CueError::device(format!("failed to start stream: {}", e)))?;

        let outcome = match handle.wait() {
            HandleState::Finished | HandleState::Rendering => PlaybackOutcome::Completed,
            HandleState::Stopped => PlaybackOutcome::Stopped,
            HandleState::Failed(reason) => return Err(CueError::DeviceFailure { reason }),
        };

        drop(stream);
        Ok(outcome)
    }
}

impl PlaybackDriver for CpalDriver {
    fn stop(&self) {
        let previous = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(handle) = previous {
            if handle.stop() {
                debug!("Stopped active cue");
            }
        }
    }

    fn play(&self, buffer: AudioBuffer) -> Result<PlaybackOutcome> {
        let handle = self.register();
        let result = self.render(buffer, &handle);
        if let Err(e) = &result {
            handle.fail(e.to_string());
        }
        self.release(&handle);
        result
    }
}

fn is_renderable(format: SampleFormat) -> bool {
    matches!(
        format,
        SampleFormat::F32 | SampleFormat::I16 | SampleFormat::U16
    )
}

/// Block size to request for the configured latency class
fn block_frames(settings: &OutputSettings, supported: &SupportedBufferSize) -> BufferSize {
    match (settings.latency, supported) {
        (LatencyClass::High, SupportedBufferSize::Range { min, max }) => {
            BufferSize::Fixed(settings.block_size.max(*min).min(*max))
        }
        (LatencyClass::Low, SupportedBufferSize::Range { min, .. }) => BufferSize::Fixed(*min),
        (LatencyClass::High, SupportedBufferSize::Unknown) => {
            BufferSize::Fixed(settings.block_size)
        }
        (LatencyClass::Low, SupportedBufferSize::Unknown) => BufferSize::Default,
    }
}

/// Silent callbacks required after the clip runs out
///
/// The first one only means the device has taken the last clip block. The
/// second means that block has been played.
const DRAIN_CALLBACKS: u32 = 2;

/// Callback-side state of one render: copies the clip into device blocks,
/// then pads with silence until the device has drained
struct ClipFeeder {
    samples: Vec<f32>,
    position: usize,
    silent_callbacks: u32,
}

impl ClipFeeder {
    fn new(samples: Vec<f32>) -> Self {
        Self {
            samples,
            position: 0,
            silent_callbacks: 0,
        }
    }

    /// Fill one device block
    ///
    /// # Returns
    /// `true` exactly once, on the callback where the clip has drained
    fn fill<T: Sample + FromSample<f32>>(&mut self, data: &mut [T]) -> bool {
        let remaining = self.samples.len() - self.position;
        let n = remaining.min(data.len());

        for (out, &sample) in data[..n]
            .iter_mut()
            .zip(&self.samples[self.position..self.position + n])
        {
            *out = T::from_sample(sample);
        }
        for out in data[n..].iter_mut() {
            *out = T::EQUILIBRIUM;
        }
        self.position += n;

        if n > 0 {
            return false;
        }
        self.silent_callbacks = self.silent_callbacks.saturating_add(1);
        self.silent_callbacks == DRAIN_CALLBACKS
    }
}

/// Build an output stream that plays `samples` once, then reports the
/// handle finished
///
/// The handle is marked finished only after the device has asked for a
/// further block of silence past the one that followed the clip, so the
/// final clip block has been played out, not just queued. Until then the
/// handle stays `Rendering` and `stop()` can still cut the render short.
fn build_stream<T>(
    device: &Device,
    config: &StreamConfig,
    samples: Vec<f32>,
    handle: &Arc<PlaybackHandle>,
) -> Result<Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let data_handle = Arc::clone(handle);
    let error_handle = Arc::clone(handle);
    let mut feeder = ClipFeeder::new(samples);

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                if feeder.fill(data) {
                    data_handle.finish();
                }
            },
            move |err| {
                error!("Audio stream error: {}", err);
                error_handle.fail(err.to_string());
            },
            None,
        )
        .map_err(|e| CueError::device(format!("failed to build stream: {}", e)))
}

/// Convert a buffer to the device's channel count and sample rate
fn conform(buffer: AudioBuffer, channels: usize, sample_rate: u32) -> AudioBuffer {
    let source_rate = buffer.sample_rate;
    let mapped = map_channels(buffer.samples, channels);

    let samples = if source_rate != sample_rate && source_rate > 0 {
        let ratio = sample_rate as f64 / source_rate as f64;
        mapped.iter().map(|ch| resample_linear(ch, ratio)).collect()
    } else {
        mapped
    };

    AudioBuffer {
        samples,
        sample_rate,
    }
}

/// Map source channels onto `target` output channels
///
/// Mono output averages every source channel; otherwise output channel `i`
/// carries source channel `i`, repeating the last source channel when the
/// device has more.
fn map_channels(source: Vec<Vec<f32>>, target: usize) -> Vec<Vec<f32>> {
    if source.len() == target || source.is_empty() || target == 0 {
        return source;
    }

    if target == 1 {
        let frames = source[0].len();
        let scale = 1.0 / source.len() as f32;
        let mixed = (0..frames)
            .map(|i| source.iter().map(|ch| ch[i]).sum::<f32>() * scale)
            .collect();
        return vec![mixed];
    }

    let last = source.len() - 1;
    (0..target).map(|i| source[i.min(last)].clone()).collect()
}

/// Linear interpolation resampling
fn resample_linear(samples: &[f32], ratio: f64) -> Vec<f32> {
    if samples.is_empty() {
        return Vec::new();
    }

    let source_len = samples.len();
    let target_len = ((source_len as f64) * ratio).ceil() as usize;
    let mut output = Vec::with_capacity(target_len);

    for i in 0..target_len {
        // Map output index to source position
        let src_pos = i as f64 / ratio;
        let src_idx = src_pos.floor() as usize;
        let frac = (src_pos - src_idx as f64) as f32;

        let sample = if src_idx + 1 < source_len {
            samples[src_idx] * (1.0 - frac) + samples[src_idx + 1] * frac
        } else if src_idx < source_len {
            samples[src_idx]
        } else {
            0.0
        };

        output.push(sample);
    }

    output
}
