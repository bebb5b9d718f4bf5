//! MP3 decoding via `symphonia`, one packet per [`Decoder::step`].
//!
//! # Step
//!
//! ```text
//! pending samples? ──▶ write to output; still backed up → Continue
//! input exhausted? ──▶ output drained → Finished, else Continue
//! next_packet ──▶ decode ──▶ SampleBuffer<f32> ──▶ remix ──▶ resample ──▶ output
//!    ├─ UnexpectedEof   → flush the resampler tail, input exhausted
//!    ├─ ResetRequired   → reset codec, Continue
//!    └─ other error     → Failed
//! decode
//!    ├─ DecodeError     → skip the packet (corrupt frame), Continue
//!    └─ other error     → Failed
//! ```
//!
//! The decoder owns the [`ClipSource`] through symphonia's
//! `MediaSourceStream`, so dropping the decoder closes the source.

use std::io::{Read, Seek, SeekFrom};

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder as CodecDecoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::playback::{AudioOutput, DecodeStep, Decoder, PlaybackError};
use crate::storage::ClipSource;

use super::{remix_channels, ResampleError, SincResampler};

// ---------------------------------------------------------------------------
// SourceStream
// ---------------------------------------------------------------------------

/// Adapts a [`ClipSource`] to symphonia's [`MediaSource`].
struct SourceStream(Box<dyn ClipSource>);

impl Read for SourceStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.0.read(buf)
    }
}

impl Seek for SourceStream {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        self.0.seek(pos)
    }
}

impl MediaSource for SourceStream {
    fn is_seekable(&self) -> bool {
        true
    }

    fn byte_len(&self) -> Option<u64> {
        None
    }
}

// ---------------------------------------------------------------------------
// Converter
// ---------------------------------------------------------------------------

/// Converts decoded packets to the output's channel layout and rate.
struct Converter {
    out_rate: u32,
    out_channels: u16,
    /// Input rate of the current stream; `None` before the first packet.
    in_rate: Option<u32>,
    /// Absent when the stream already runs at the output rate.
    resampler: Option<SincResampler>,
}

impl Converter {
    fn new(out_rate: u32, out_channels: u16) -> Self {
        Self {
            out_rate,
            out_channels,
            in_rate: None,
            resampler: None,
        }
    }

    fn convert(
        &mut self,
        samples: &[f32],
        rate: u32,
        channels: u16,
    ) -> Result<Vec<f32>, ResampleError> {
        let mut out = Vec::new();
        if self.in_rate != Some(rate) {
            if self.in_rate.is_some() {
                log::debug!("playback: stream rate changed to {rate} Hz");
                out = self.finish()?;
            }
            self.in_rate = Some(rate);
            self.resampler = if rate == self.out_rate {
                None
            } else {
                Some(SincResampler::new(rate, self.out_rate, self.out_channels)?)
            };
        }

        let remixed = remix_channels(samples, channels, self.out_channels);
        match self.resampler.as_mut() {
            Some(r) => out.extend(r.process(&remixed)?),
            None => out.extend(remixed),
        }
        Ok(out)
    }

    /// Whatever the resampler still holds back.
    fn finish(&mut self) -> Result<Vec<f32>, ResampleError> {
        match self.resampler.as_mut() {
            Some(r) => r.flush(),
            None => Ok(Vec::new()),
        }
    }
}

/// Hand as much of `pending` to `output` as it accepts.  Returns `true` once
/// everything has been accepted.
fn flush_pending(pending: &mut Vec<f32>, output: &mut dyn AudioOutput) -> bool {
    if !pending.is_empty() {
        let accepted = output.write(pending);
        pending.drain(..accepted.min(pending.len()));
    }
    pending.is_empty()
}

// ---------------------------------------------------------------------------
// Mp3Decoder
// ---------------------------------------------------------------------------

pub struct Mp3Decoder {
    format: Box<dyn FormatReader>,
    codec: Box<dyn CodecDecoder>,
    track_id: u32,
    converter: Converter,
    pending: Vec<f32>,
    input_done: bool,
}

impl Mp3Decoder {
    /// Probe `source` and prepare a decoder producing audio for an output
    /// running at `out_rate` Hz with `out_channels` channels.
    pub fn new(
        source: Box<dyn ClipSource>,
        out_rate: u32,
        out_channels: u16,
    ) -> Result<Self, PlaybackError> {
        let mss = MediaSourceStream::new(Box::new(SourceStream(source)), Default::default());

        let mut hint = Hint::new();
        hint.with_extension("mp3");

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| PlaybackError::DecodeStartFailed(format!("probe failed: {e}")))?;
        let format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| PlaybackError::DecodeStartFailed("no audio track".into()))?;
        let track_id = track.id;

        let codec = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| PlaybackError::DecodeStartFailed(format!("no codec: {e}")))?;

        Ok(Self {
            format,
            codec,
            track_id,
            converter: Converter::new(out_rate, out_channels.max(1)),
            pending: Vec::new(),
            input_done: false,
        })
    }
}

impl Decoder for Mp3Decoder {
    fn step(&mut self, output: &mut dyn AudioOutput) -> DecodeStep {
        if !flush_pending(&mut self.pending, output) {
            return DecodeStep::Continue;
        }

        if self.input_done {
            return if output.queued() == 0 {
                DecodeStep::Finished
            } else {
                DecodeStep::Continue
            };
        }

        let packet = match self.format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                self.input_done = true;
                return match self.converter.finish() {
                    Ok(tail) => {
                        self.pending = tail;
                        flush_pending(&mut self.pending, output);
                        DecodeStep::Continue
                    }
                    Err(e) => DecodeStep::Failed(e.to_string()),
                };
            }
            Err(SymphoniaError::ResetRequired) => {
                self.codec.reset();
                return DecodeStep::Continue;
            }
            Err(e) => return DecodeStep::Failed(format!("reading packet: {e}")),
        };

        if packet.track_id() != self.track_id {
            return DecodeStep::Continue;
        }

        let (samples, rate, channels) = match self.codec.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                buf.copy_interleaved_ref(decoded);
                (buf.samples().to_vec(), spec.rate, spec.channels.count() as u16)
            }
            Err(SymphoniaError::DecodeError(e)) => {
                log::warn!("playback: skipping corrupt frame: {e}");
                return DecodeStep::Continue;
            }
            Err(e) => return DecodeStep::Failed(format!("decoding: {e}")),
        };

        match self.converter.convert(&samples, rate, channels) {
            Ok(converted) => self.pending = converted,
            Err(e) => return DecodeStep::Failed(e.to_string()),
        }
        flush_pending(&mut self.pending, output);
        DecodeStep::Continue
    }

    fn stop(&mut self) {
        self.pending.clear();
        self.input_done = true;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Output that accepts at most `room` samples per write.
    struct NarrowOutput {
        room: usize,
        written: Vec<f32>,
    }

    impl AudioOutput for NarrowOutput {
        fn set_gain(&mut self, _gain: f32) {}
        fn sample_rate(&self) -> u32 {
            44_100
        }
        fn channels(&self) -> u16 {
            2
        }
        fn write(&mut self, samples: &[f32]) -> usize {
            let n = samples.len().min(self.room);
            self.written.extend_from_slice(&samples[..n]);
            n
        }
        fn queued(&self) -> usize {
            0
        }
    }

    #[test]
    fn garbage_input_fails_to_start() {
        let source: Box<dyn ClipSource> = Box::new(Cursor::new(vec![0x42u8; 64]));
        let err = Mp3Decoder::new(source, 44_100, 2).err().expect("should fail");
        assert!(matches!(err, PlaybackError::DecodeStartFailed(_)));
    }

    #[test]
    fn empty_input_fails_to_start() {
        let source: Box<dyn ClipSource> = Box::new(Cursor::new(Vec::new()));
        assert!(Mp3Decoder::new(source, 48_000, 2).is_err());
    }

    #[test]
    fn pending_samples_drain_across_writes() {
        let mut pending = vec![1.0_f32, 2.0, 3.0, 4.0, 5.0];
        let mut out = NarrowOutput {
            room: 2,
            written: Vec::new(),
        };

        assert!(!flush_pending(&mut pending, &mut out));
        assert!(!flush_pending(&mut pending, &mut out));
        assert!(flush_pending(&mut pending, &mut out));
        assert_eq!(out.written, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        assert!(flush_pending(&mut pending, &mut out));
    }

    #[test]
    fn converter_upmixes_mono_at_same_rate() {
        let mut c = Converter::new(44_100, 2);
        let out = c.convert(&[0.25, 0.5], 44_100, 1).expect("convert");
        assert_eq!(out, vec![0.25, 0.25, 0.5, 0.5]);
        assert!(c.finish().expect("finish").is_empty());
    }

    #[test]
    fn converter_resamples_to_output_rate() {
        let mut c = Converter::new(48_000, 2);
        let mut out = Vec::new();
        for _ in 0..4 {
            out.extend(c.convert(&vec![0.0; 2 * 1_152], 24_000, 2).expect("convert"));
        }
        out.extend(c.finish().expect("finish"));
        // Twice as many stereo frames as went in.
        assert!(out.len().abs_diff(2 * 2 * 4 * 1_152) <= 4, "got {}", out.len());
    }

    #[test]
    fn rate_change_flushes_previous_stream() {
        let mut c = Converter::new(48_000, 1);
        let first = c.convert(&[0.0; 100], 24_000, 1).expect("convert");
        assert!(first.is_empty(), "short input is staged");

        // Switching to the output rate drains the 200 staged frames.
        let out = c.convert(&[0.5; 10], 48_000, 1).expect("convert");
        assert_eq!(out.len(), 210);
        assert_eq!(&out[200..], &[0.5; 10]);
    }
}
