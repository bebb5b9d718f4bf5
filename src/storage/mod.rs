//! Clip storage: a flat store of named files, one per button slot.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────── ClipStore (trait) ───────────────────────────┐
//! │ exists(name)   open(name) → Box<dyn ClipSource>   remove(name)           │
//! │ begin_write(name) → Box<dyn PendingWrite> ──write──▶ commit | abort      │
//! └──────────────────────────────────────────────────────────────────────────┘
//!            ▲                                   ▲
//!      FsClipStore (directory)          MemoryClipStore (tests)
//! ```
//!
//! A [`PendingWrite`] is invisible under its final name until
//! [`PendingWrite::commit`]; dropping it uncommitted discards it.  The
//! previously committed clip stays readable for the whole transfer.
//!
//! [`UploadManager`] drives the upload state machine on top of a store.

pub mod fs;
pub mod upload;

pub use fs::FsClipStore;
pub use upload::{UploadError, UploadManager, UploadState, UploadTicket};

#[cfg(test)]
pub use memory::MemoryClipStore;

use std::io::{Read, Seek};

use thiserror::Error;

// ---------------------------------------------------------------------------
// StorageError
// ---------------------------------------------------------------------------

/// Errors raised by a [`ClipStore`].
#[derive(Debug, Error)]
pub enum StorageError {
    /// No file with this name exists.
    #[error("file not found: {0}")]
    NotFound(String),

    /// The name is empty or would escape the store (path separators, `..`).
    #[error("invalid file name: {0:?}")]
    InvalidName(String),

    /// The backing medium failed.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// ClipSource
// ---------------------------------------------------------------------------

/// Readable, seekable clip bytes handed to the decoder.
pub trait ClipSource: Read + Seek + Send + Sync {}

impl<T: Read + Seek + Send + Sync> ClipSource for T {}

// ---------------------------------------------------------------------------
// PendingWrite
// ---------------------------------------------------------------------------

/// An in-progress write that becomes visible only on commit.
pub trait PendingWrite {
    /// Append `bytes` to the pending file.
    fn write(&mut self, bytes: &[u8]) -> Result<(), StorageError>;

    /// Replace any committed file of the same name with the pending bytes.
    fn commit(self: Box<Self>) -> Result<(), StorageError>;
}

// ---------------------------------------------------------------------------
// ClipStore
// ---------------------------------------------------------------------------

/// Byte-addressable named-file store.
pub trait ClipStore {
    /// Whether a committed file named `name` exists.
    fn exists(&self, name: &str) -> bool;

    /// Open a committed file for reading.
    fn open(&self, name: &str) -> Result<Box<dyn ClipSource>, StorageError>;

    /// Delete a committed file.
    ///
    /// Returns [`StorageError::NotFound`] and leaves the store untouched when
    /// `name` does not exist.
    fn remove(&mut self, name: &str) -> Result<(), StorageError>;

    /// Start a pending write that will replace `name` on commit.
    fn begin_write(&mut self, name: &str) -> Result<Box<dyn PendingWrite>, StorageError>;
}

/// Reject names that are empty or could address anything outside the store.
pub fn validate_name(name: &str) -> Result<(), StorageError> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0'])
        || name.ends_with(fs::PART_SUFFIX);
    if bad {
        Err(StorageError::InvalidName(name.to_string()))
    } else {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryClipStore (test double)
// ---------------------------------------------------------------------------
