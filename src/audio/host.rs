//! [`AudioBackend`] for a desktop host: cpal output plus symphonia MP3
//! decoding.

use crate::playback::{AudioBackend, AudioOutput, Decoder, PlaybackError};
use crate::storage::ClipSource;

use super::{CpalOutput, Mp3Decoder};

pub struct HostAudio {
    buffer_ms: u32,
}

impl HostAudio {
    /// `buffer_ms` sizes the queue between decoder and device.
    pub fn new(buffer_ms: u32) -> Self {
        Self { buffer_ms }
    }
}

impl AudioBackend for HostAudio {
    fn claim_output(&mut self, gain: f32) -> Result<Box<dyn AudioOutput>, PlaybackError> {
        let output = CpalOutput::open(gain, self.buffer_ms)
            .map_err(|e| PlaybackError::DecodeStartFailed(format!("audio output: {e}")))?;
        Ok(Box::new(output))
    }

    fn start_decoder(
        &mut self,
        source: Box<dyn ClipSource>,
        output: &mut dyn AudioOutput,
    ) -> Result<Box<dyn Decoder>, PlaybackError> {
        let decoder = Mp3Decoder::new(source, output.sample_rate(), output.channels())?;
        Ok(Box::new(decoder))
    }
}
