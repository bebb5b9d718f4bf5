//! Playback lifecycle: at most one audio session and the resources it owns.
//!
//! # Architecture
//!
//! ```text
//! PlaybackManager::play(clip)
//!   ├─ stop()                        release output → decoder → source
//!   ├─ ClipStore::open(clip)         ── NotFound ──▶ Err, no session
//!   ├─ Id3Stripper::new(source)      hide the leading ID3v2 tag
//!   ├─ AudioBackend::claim_output(volume)
//!   └─ AudioBackend::start_decoder(source, output)
//!         └─ failure: drop everything acquired so far ──▶ DecodeStartFailed
//!
//! PlaybackManager::poll()   once per tick, one bounded unit of decode work
//!   └─ Finished | Failed ──▶ same teardown as stop()
//! ```
//!
//! The decoder owns its source, so releasing the decoder releases the source
//! right after it.  [`AudioBackend`], [`AudioOutput`] and [`Decoder`] are the
//! hardware seams; the host build implements them in [`crate::audio`].

pub mod volume;

#[cfg(test)]
pub mod testing;

pub use volume::Volume;

use thiserror::Error;

use crate::audio::Id3Stripper;
use crate::input::ButtonId;
use crate::storage::{ClipSource, ClipStore, StorageError};

// ---------------------------------------------------------------------------
// Seams
// ---------------------------------------------------------------------------

/// A claimed audio output.  Dropping it releases the device.
pub trait AudioOutput {
    /// Apply a gain in `[0.0, 1.0]` to everything played from now on.
    fn set_gain(&mut self, gain: f32);

    fn sample_rate(&self) -> u32;

    fn channels(&self) -> u16;

    /// Queue interleaved samples; returns how many were accepted.
    fn write(&mut self, samples: &[f32]) -> usize;

    /// Samples queued but not yet played.
    fn queued(&self) -> usize;
}

/// Result of one unit of decode work.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeStep {
    Continue,
    Finished,
    Failed(String),
}

/// An incremental decoder bound to one source.
pub trait Decoder {
    /// Advance by one bounded unit of work, feeding `output`.
    fn step(&mut self, output: &mut dyn AudioOutput) -> DecodeStep;

    /// Halt decoding.  The decoder is dropped right after.
    fn stop(&mut self);
}

/// Factory for outputs and decoders.
pub trait AudioBackend {
    fn claim_output(&mut self, gain: f32) -> Result<Box<dyn AudioOutput>, PlaybackError>;

    fn start_decoder(
        &mut self,
        source: Box<dyn ClipSource>,
        output: &mut dyn AudioOutput,
    ) -> Result<Box<dyn Decoder>, PlaybackError>;
}

// ---------------------------------------------------------------------------
// PlaybackError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("clip not found: {0}")]
    NotFound(String),

    #[error("failed to start decoder: {0}")]
    DecodeStartFailed(String),
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Who asked for the current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOrigin {
    /// A physical button press.
    Button(ButtonId),
    /// A control-plane request.
    Remote,
}

/// How a session ended on its own.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEnd {
    Finished,
    Failed(String),
}

struct PlaybackSession {
    output: Box<dyn AudioOutput>,
    decoder: Box<dyn Decoder>,
    clip: String,
    origin: PlayOrigin,
}

impl PlaybackSession {
    fn teardown(self) {
        let PlaybackSession {
            output,
            mut decoder,
            ..
        } = self;
        drop(output);
        decoder.stop();
        drop(decoder);
    }
}

// ---------------------------------------------------------------------------
// PlaybackManager
// ---------------------------------------------------------------------------

/// Owner of the single playback session and the volume setting.
pub struct PlaybackManager {
    backend: Box<dyn AudioBackend>,
    session: Option<PlaybackSession>,
    volume: Volume,
}

impl PlaybackManager {
    pub fn new(backend: Box<dyn AudioBackend>, volume: Volume) -> Self {
        Self {
            backend,
            session: None,
            volume,
        }
    }

    /// Start playing `clip`, replacing any active session.
    pub fn play(
        &mut self,
        store: &dyn ClipStore,
        clip: &str,
        origin: PlayOrigin,
    ) -> Result<(), PlaybackError> {
        self.stop();

        if !store.exists(clip) {
            log::warn!("playback: {clip} not found");
            return Err(PlaybackError::NotFound(clip.to_string()));
        }

        let source = store.open(clip).map_err(|e| match e {
            StorageError::NotFound(name) => PlaybackError::NotFound(name),
            other => PlaybackError::DecodeStartFailed(other.to_string()),
        })?;
        let source = Id3Stripper::new(source)
            .map_err(|e| PlaybackError::DecodeStartFailed(format!("reading {clip}: {e}")))?;

        let mut output = self.backend.claim_output(self.volume.get())?;
        let decoder = match self.backend.start_decoder(Box::new(source), output.as_mut()) {
            Ok(d) => d,
            Err(e) => {
                log::error!("playback: {clip}: {e}");
                drop(output);
                return Err(e);
            }
        };

        log::info!("playback: started {clip} ({origin:?})");
        self.session = Some(PlaybackSession {
            output,
            decoder,
            clip: clip.to_string(),
            origin,
        });
        Ok(())
    }

    /// Stop the active session, if any.  Returns whether one was stopped.
    pub fn stop(&mut self) -> bool {
        match self.session.take() {
            Some(session) => {
                log::info!("playback: stopped {}", session.clip);
                session.teardown();
                true
            }
            None => false,
        }
    }

    /// Advance the active session; returns how it ended if it just did.
    pub fn poll(&mut self) -> Option<SessionEnd> {
        let session = self.session.as_mut()?;
        let end = match session.decoder.step(session.output.as_mut()) {
            DecodeStep::Continue => return None,
            DecodeStep::Finished => SessionEnd::Finished,
            DecodeStep::Failed(reason) => SessionEnd::Failed(reason),
        };

        if let Some(session) = self.session.take() {
            match &end {
                SessionEnd::Finished => log::info!("playback: finished {}", session.clip),
                SessionEnd::Failed(reason) => {
                    log::error!("playback: {} ended with error: {reason}", session.clip)
                }
            }
            session.teardown();
        }
        Some(end)
    }

    pub fn is_playing(&self) -> bool {
        self.session.is_some()
    }

    /// Name of the clip being played.
    pub fn active_clip(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.clip.as_str())
    }

    pub fn origin(&self) -> Option<PlayOrigin> {
        self.session.as_ref().map(|s| s.origin)
    }

    pub fn volume(&self) -> Volume {
        self.volume
    }

    /// Store the clamped volume and apply it to the active output.
    pub fn set_volume(&mut self, requested: f32) -> Volume {
        self.volume = Volume::new(requested);
        if let Some(session) = self.session.as_mut() {
            session.output.set_gain(self.volume.get());
        }
        self.volume
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
