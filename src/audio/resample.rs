//! Channel remixing and sample-rate conversion for playback.
//!
//! Decoded clips arrive in whatever layout they were encoded with (usually
//! 44.1 kHz mono or stereo); the output device wants its own.  Conversion
//! happens packet by packet:
//!
//! 1. [`remix_channels`]: interleaved `from` channels → `to` channels.
//! 2. [`SincResampler`]: `rubato`'s fixed-input sinc resampler.  MP3
//!    packets rarely line up with its chunk size, so input is staged until
//!    a whole chunk is available and the tail is flushed at end of clip.

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use thiserror::Error;

// ---------------------------------------------------------------------------
// remix_channels
// ---------------------------------------------------------------------------

/// Convert interleaved audio from `from` to `to` channels.
///
/// * Same count: copied unchanged.
/// * To mono: all channels averaged.
/// * Otherwise: output channel `c` takes input channel `c % from`, so mono
///   is duplicated to every speaker.
///
/// # Example
///
/// ```rust
/// use soundboard::audio::remix_channels;
///
/// assert_eq!(remix_channels(&[0.5, -0.5, 0.25, 0.75], 2, 1), vec![0.0, 0.5]);
/// assert_eq!(remix_channels(&[0.1, 0.2], 1, 2), vec![0.1, 0.1, 0.2, 0.2]);
/// ```
pub fn remix_channels(samples: &[f32], from: u16, to: u16) -> Vec<f32> {
    if from == 0 || to == 0 {
        return Vec::new();
    }
    if from == to {
        return samples.to_vec();
    }

    let from = from as usize;
    let to = to as usize;
    let frames = samples.chunks_exact(from);

    if to == 1 {
        return frames
            .map(|frame| frame.iter().sum::<f32>() / from as f32)
            .collect();
    }

    let mut out = Vec::with_capacity(samples.len() / from * to);
    for frame in frames {
        out.extend((0..to).map(|c| frame[c % from]));
    }
    out
}

// ---------------------------------------------------------------------------
// SincResampler
// ---------------------------------------------------------------------------

/// Input frames handed to rubato per call.
const CHUNK_FRAMES: usize = 1_024;

#[derive(Debug, Error)]
pub enum ResampleError {
    #[error("resampler setup failed: {0}")]
    Setup(#[from] rubato::ResamplerConstructionError),

    #[error("resampling failed: {0}")]
    Process(#[from] rubato::ResampleError),
}

/// Streaming sample-rate converter over interleaved frames.
pub struct SincResampler {
    inner: SincFixedIn<f32>,
    channels: usize,
    ratio: f64,
    /// Planar input waiting for a full chunk.
    staged: Vec<Vec<f32>>,
    frames_in: usize,
    frames_out: usize,
}

impl SincResampler {
    pub fn new(from_rate: u32, to_rate: u32, channels: u16) -> Result<Self, ResampleError> {
        let channels = channels.max(1) as usize;
        let ratio = to_rate.max(1) as f64 / from_rate.max(1) as f64;
        let params = SincInterpolationParameters {
            sinc_len: 256,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Linear,
            oversampling_factor: 256,
            window: WindowFunction::BlackmanHarris2,
        };
        let inner = SincFixedIn::<f32>::new(ratio, 2.0, params, CHUNK_FRAMES, channels)?;
        log::debug!("playback: resampling {from_rate} Hz -> {to_rate} Hz, {channels} ch");

        Ok(Self {
            inner,
            channels,
            ratio,
            staged: vec![Vec::with_capacity(CHUNK_FRAMES); channels],
            frames_in: 0,
            frames_out: 0,
        })
    }

    /// Feed interleaved frames; returns whatever whole chunks produced.
    pub fn process(&mut self, samples: &[f32]) -> Result<Vec<f32>, ResampleError> {
        let frames = samples.len() / self.channels;
        for frame in samples.chunks_exact(self.channels) {
            for (lane, &s) in self.staged.iter_mut().zip(frame) {
                lane.push(s);
            }
        }
        self.frames_in += frames;

        let mut out = Vec::new();
        loop {
            let need = self.inner.input_frames_next();
            if self.staged[0].len() < need {
                break;
            }
            let chunk: Vec<Vec<f32>> = self
                .staged
                .iter_mut()
                .map(|lane| lane.drain(..need).collect())
                .collect();
            let planar = self.inner.process(&chunk, None)?;
            self.interleave_into(&planar, usize::MAX, &mut out);
        }
        Ok(out)
    }

    /// Push the staged remainder through and trim the padding, so the total
    /// output matches the input length scaled by the rate ratio.
    pub fn flush(&mut self) -> Result<Vec<f32>, ResampleError> {
        let expected = (self.frames_in as f64 * self.ratio).round() as usize;
        let room = expected.saturating_sub(self.frames_out);
        let mut out = Vec::new();
        if room == 0 {
            return Ok(out);
        }

        let staged = std::mem::replace(
            &mut self.staged,
            vec![Vec::with_capacity(CHUNK_FRAMES); self.channels],
        );
        let planar = self.inner.process_partial(Some(staged.as_slice()), None)?;
        self.interleave_into(&planar, room, &mut out);
        Ok(out)
    }

    fn interleave_into(&mut self, planar: &[Vec<f32>], limit: usize, out: &mut Vec<f32>) {
        let frames = planar.first().map_or(0, Vec::len).min(limit);
        out.reserve(frames * self.channels);
        for i in 0..frames {
            out.extend(planar.iter().map(|lane| lane[i]));
        }
        self.frames_out += frames;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
