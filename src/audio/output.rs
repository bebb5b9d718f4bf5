//! Speaker output via `cpal`.
//!
//! [`CpalOutput`] wraps the cpal host/device/stream lifecycle for one
//! playback session.  The decoder pushes interleaved `f32` samples into a
//! bounded [`RingBuffer`]; the cpal callback pops them on the audio thread,
//! scales by the current gain and converts to the device sample format.
//! Underruns play silence.  Dropping the output stops the stream and
//! releases the device.

use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc, Mutex,
};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SizedSample};
use thiserror::Error;

use crate::playback::AudioOutput;

use super::RingBuffer;

/// Sample queue shared between the decoder and the cpal callback.
pub type SharedQueue = Arc<Mutex<RingBuffer<f32>>>;

// ---------------------------------------------------------------------------
// OutputError
// ---------------------------------------------------------------------------

/// Errors that can occur while opening the output stream.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("no output device found on the default audio host")]
    NoDevice,

    #[error("failed to query default output config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("unsupported output sample format {0:?}")]
    UnsupportedFormat(cpal::SampleFormat),

    #[error("failed to build output stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),
}

// ---------------------------------------------------------------------------
// Gain
// ---------------------------------------------------------------------------

/// `f32` gain shared lock-free with the audio thread.
#[derive(Clone)]
struct Gain(Arc<AtomicU32>);

impl Gain {
    fn new(gain: f32) -> Self {
        Self(Arc::new(AtomicU32::new(gain.to_bits())))
    }

    fn set(&self, gain: f32) {
        self.0.store(gain.to_bits(), Ordering::Relaxed);
    }

    fn get(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }
}

// ---------------------------------------------------------------------------
// CpalOutput
// ---------------------------------------------------------------------------

/// The default output device, claimed for one session.
pub struct CpalOutput {
    _stream: cpal::Stream,
    queue: SharedQueue,
    gain: Gain,
    sample_rate: u32,
    channels: u16,
}

impl CpalOutput {
    /// Open the default output device and start a stream that plays from a
    /// queue holding `buffer_ms` of audio.
    ///
    /// # Errors
    ///
    /// Returns [`OutputError::NoDevice`] when no output device is available,
    /// [`OutputError::UnsupportedFormat`] for sample formats other than
    /// `f32` / `i16`, or the cpal error that stopped the stream from starting.
    pub fn open(gain: f32, buffer_ms: u32) -> Result<Self, OutputError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(OutputError::NoDevice)?;

        let supported = device.default_output_config()?;
        let format = supported.sample_format();
        let channels = supported.channels();
        let sample_rate = supported.sample_rate().0;
        let config: cpal::StreamConfig = supported.into();

        let capacity =
            (sample_rate as usize * channels as usize * buffer_ms.max(10) as usize) / 1000;
        let queue: SharedQueue = Arc::new(Mutex::new(RingBuffer::new(capacity.max(1))));
        let gain = Gain::new(gain);

        let stream = match format {
            cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config, &queue, &gain)?,
            cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config, &queue, &gain)?,
            other => return Err(OutputError::UnsupportedFormat(other)),
        };
        stream.play()?;

        log::debug!(
            "playback: output open ({sample_rate} Hz, {channels} ch, {format:?}, {capacity} sample queue)"
        );

        Ok(Self {
            _stream: stream,
            queue,
            gain,
            sample_rate,
            channels,
        })
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    queue: &SharedQueue,
    gain: &Gain,
) -> Result<cpal::Stream, OutputError>
where
    T: SizedSample + FromSample<f32>,
{
    let queue = Arc::clone(queue);
    let gain = gain.clone();

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            let g = gain.get();
            match queue.lock() {
                Ok(mut q) => {
                    for slot in data.iter_mut() {
                        *slot = match q.pop() {
                            Some(s) => T::from_sample(s * g),
                            None => T::EQUILIBRIUM,
                        };
                    }
                }
                Err(_) => data.fill(T::EQUILIBRIUM),
            }
        },
        |err: cpal::StreamError| {
            log::error!("cpal stream error: {err}");
        },
        None,
    )?;
    Ok(stream)
}

impl AudioOutput for CpalOutput {
    fn set_gain(&mut self, gain: f32) {
        self.gain.set(gain);
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn write(&mut self, samples: &[f32]) -> usize {
        match self.queue.lock() {
            Ok(mut q) => q.push_slice(samples),
            Err(_) => 0,
        }
    }

    fn queued(&self) -> usize {
        self.queue.lock().map(|q| q.len()).unwrap_or(0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
