//! Audio pipeline: clip bytes → ID3 strip → MP3 decode → remix/resample →
//! sample queue → speaker.
//!
//! # Pipeline
//!
//! ```text
//! ClipSource → Id3Stripper → Mp3Decoder (symphonia, one packet per step)
//!            → remix_channels → SincResampler (rubato) → RingBuffer → cpal callback
//! ```
//!
//! [`HostAudio`] bundles the pieces as the [`crate::playback::AudioBackend`]
//! used by the binary.

pub mod buffer;
pub mod decoder;
pub mod host;
pub mod metadata;
pub mod output;
pub mod resample;

pub use buffer::RingBuffer;
pub use decoder::Mp3Decoder;
pub use host::HostAudio;
pub use metadata::Id3Stripper;
pub use output::{CpalOutput, OutputError};
pub use resample::{remix_channels, ResampleError, SincResampler};
