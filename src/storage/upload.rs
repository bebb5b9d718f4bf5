//! Upload state machine: one transfer at a time into a button's clip slot.
//!
//! ```text
//!  Idle ──start──▶ Receiving ──finish──▶ Committed
//!                     │  ▲
//!                     │  └─ write (bounded by max_size)
//!                     └──── abort / oversize / write error ──▶ Aborted
//! ```
//!
//! Each [`UploadManager::start`] hands out a fresh [`UploadTicket`].  Chunks
//! and the final commit must present the ticket of the transfer currently
//! `Receiving`; anything else is rejected as stale.  Starting a new upload
//! aborts the one in flight.

use std::fmt;

use thiserror::Error;

use crate::input::ButtonId;

use super::{ClipStore, PendingWrite, StorageError};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Identifies one upload attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadTicket(u32);

impl UploadTicket {
    pub fn id(self) -> u32 {
        self.0
    }
}

impl fmt::Display for UploadTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where the most recent transfer stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    Idle,
    Receiving,
    Committed,
    Aborted,
}

#[derive(Debug, Error)]
pub enum UploadError {
    /// Accepting the chunk would push the clip past the size cap.  The
    /// transfer has been aborted.
    #[error("upload of {attempted} bytes exceeds the {limit}-byte limit")]
    ResourceExceeded { limit: usize, attempted: usize },

    /// No transfer is in progress.
    #[error("no upload in progress")]
    NoTransfer,

    /// The ticket belongs to a transfer that is no longer receiving.
    #[error("upload {0} is no longer active")]
    StaleTicket(UploadTicket),

    /// The store failed; the transfer has been aborted.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

struct Transfer {
    ticket: UploadTicket,
    button: ButtonId,
    received: usize,
    pending: Box<dyn PendingWrite>,
}

// ---------------------------------------------------------------------------
// UploadManager
// ---------------------------------------------------------------------------

/// Drives [`UploadState`] transitions against a [`ClipStore`].
pub struct UploadManager {
    max_size: usize,
    next_ticket: u32,
    active: Option<Transfer>,
    state: UploadState,
}

impl UploadManager {
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            next_ticket: 1,
            active: None,
            state: UploadState::Idle,
        }
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn state(&self) -> UploadState {
        self.state
    }

    /// Slot written by `ticket`, provided it is the transfer in flight.
    pub fn receiving_for(&self, ticket: UploadTicket) -> Option<ButtonId> {
        self.active
            .as_ref()
            .filter(|t| t.ticket == ticket)
            .map(|t| t.button)
    }

    /// Begin a transfer into `button`'s slot.
    pub fn start(
        &mut self,
        store: &mut dyn ClipStore,
        button: ButtonId,
    ) -> Result<UploadTicket, UploadError> {
        if let Some(previous) = self.active.take() {
            log::warn!(
                "upload: {} for {} superseded by a new upload, aborting",
                previous.ticket,
                previous.button
            );
        }

        let pending = match store.begin_write(&button.clip_name()) {
            Ok(p) => p,
            Err(e) => {
                self.state = UploadState::Aborted;
                return Err(e.into());
            }
        };

        let ticket = UploadTicket(self.next_ticket);
        self.next_ticket = self.next_ticket.wrapping_add(1);
        self.active = Some(Transfer {
            ticket,
            button,
            received: 0,
            pending,
        });
        self.state = UploadState::Receiving;

        log::info!("upload: {ticket} started for {button}");
        Ok(ticket)
    }

    /// Append a chunk to the transfer identified by `ticket`.
    pub fn write(&mut self, ticket: UploadTicket, bytes: &[u8]) -> Result<(), UploadError> {
        let limit = self.max_size;
        let transfer = self.active_mut(ticket)?;

        let attempted = transfer.received.saturating_add(bytes.len());
        if attempted > limit {
            self.abort_active("size limit exceeded");
            return Err(UploadError::ResourceExceeded { limit, attempted });
        }

        if let Err(e) = transfer.pending.write(bytes) {
            self.abort_active("write failed");
            return Err(e.into());
        }
        transfer.received = attempted;
        Ok(())
    }

    /// Commit the transfer, replacing any previous clip in the slot.
    ///
    /// Returns the button whose clip was replaced and the clip size.
    pub fn finish(&mut self, ticket: UploadTicket) -> Result<(ButtonId, usize), UploadError> {
        self.active_mut(ticket)?;
        let Some(transfer) = self.active.take() else {
            return Err(UploadError::NoTransfer);
        };

        match transfer.pending.commit() {
            Ok(()) => {
                self.state = UploadState::Committed;
                log::info!(
                    "upload: {} committed {} bytes to {}",
                    ticket,
                    transfer.received,
                    transfer.button
                );
                Ok((transfer.button, transfer.received))
            }
            Err(e) => {
                self.state = UploadState::Aborted;
                log::error!("upload: {ticket} commit failed: {e}");
                Err(e.into())
            }
        }
    }

    /// Discard the transfer identified by `ticket`.
    pub fn abort(&mut self, ticket: UploadTicket) -> Result<(), UploadError> {
        self.active_mut(ticket)?;
        self.abort_active("cancelled");
        Ok(())
    }

    fn active_mut(&mut self, ticket: UploadTicket) -> Result<&mut Transfer, UploadError> {
        match self.active.as_mut() {
            Some(t) if t.ticket == ticket => Ok(t),
            Some(_) => Err(UploadError::StaleTicket(ticket)),
            None if ticket.0 < self.next_ticket => Err(UploadError::StaleTicket(ticket)),
            None => Err(UploadError::NoTransfer),
        }
    }

    fn abort_active(&mut self, reason: &str) {
        if let Some(t) = self.active.take() {
            log::warn!(
                "upload: {} for {} aborted after {} bytes: {reason}",
                t.ticket,
                t.button,
                t.received
            );
            // Dropping the pending write discards it.
            drop(t.pending);
        }
        self.state = UploadState::Aborted;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryClipStore;

    const CAP: usize = 500_000;

    fn button(n: u8) -> ButtonId {
        ButtonId::new(n).expect("valid button")
    }

    #[test]
    fn upload_exactly_at_cap_succeeds() {
        let mut store = MemoryClipStore::new();
        let mut up = UploadManager::new(CAP);

        let t = up.start(&mut store, button(1)).expect("start");
        up.write(t, &vec![1u8; CAP - 10]).expect("first chunk");
        up.write(t, &[2u8; 10]).expect("last chunk");
        let (b, size) = up.finish(t).expect("finish");

        assert_eq!(b, button(1));
        assert_eq!(size, CAP);
        assert_eq!(up.state(), UploadState::Committed);
        assert_eq!(store.contents("button1.mp3").map(|c| c.len()), Some(CAP));
    }

    #[test]
    fn one_byte_over_cap_keeps_prior_file() {
        let mut store = MemoryClipStore::new().with_file("button2.mp3", b"previous");
        let mut up = UploadManager::new(CAP);

        let t = up.start(&mut store, button(2)).expect("start");
        up.write(t, &vec![0u8; CAP]).expect("fill to cap");
        let err = up.write(t, &[0u8]).unwrap_err();

        assert!(matches!(
            err,
            UploadError::ResourceExceeded {
                limit: CAP,
                attempted
            } if attempted == CAP + 1
        ));
        assert_eq!(up.state(), UploadState::Aborted);
        assert_eq!(store.contents("button2.mp3").as_deref(), Some(&b"previous"[..]));

        // The aborted ticket is dead.
        assert!(matches!(up.finish(t), Err(UploadError::StaleTicket(_))));
    }

    #[test]
    fn write_failure_aborts_without_visible_file() {
        let mut store = MemoryClipStore::new();
        store.fail_writes_after(4);
        let mut up = UploadManager::new(CAP);

        let t = up.start(&mut store, button(3)).expect("start");
        up.write(t, b"abcd").expect("fits");
        assert!(matches!(
            up.write(t, b"e"),
            Err(UploadError::Storage(StorageError::Io(_)))
        ));
        assert_eq!(up.state(), UploadState::Aborted);
        assert!(store.contents("button3.mp3").is_none());
    }

    #[test]
    fn new_start_supersedes_in_flight_transfer() {
        let mut store = MemoryClipStore::new();
        let mut up = UploadManager::new(CAP);

        let first = up.start(&mut store, button(1)).expect("start");
        up.write(first, b"one").expect("write");
        let second = up.start(&mut store, button(4)).expect("start");

        assert_ne!(first, second);
        assert!(matches!(
            up.write(first, b"late"),
            Err(UploadError::StaleTicket(t)) if t == first
        ));
        assert_eq!(up.receiving_for(second), Some(button(4)));
        assert_eq!(up.receiving_for(first), None);

        up.write(second, b"four").expect("write");
        up.finish(second).expect("finish");
        assert!(store.contents("button1.mp3").is_none());
        assert_eq!(store.contents("button4.mp3").as_deref(), Some(&b"four"[..]));
    }

    #[test]
    fn abort_discards_pending_bytes() {
        let mut store = MemoryClipStore::new();
        let mut up = UploadManager::new(CAP);

        let t = up.start(&mut store, button(5)).expect("start");
        up.write(t, b"partial").expect("write");
        up.abort(t).expect("abort");

        assert_eq!(up.state(), UploadState::Aborted);
        assert_eq!(up.receiving_for(t), None);
        assert!(store.names().is_empty());
    }

    #[test]
    fn chunk_without_transfer_is_rejected() {
        let mut up = UploadManager::new(CAP);
        assert_eq!(up.state(), UploadState::Idle);
        assert!(matches!(
            up.write(UploadTicket(1), b"x"),
            Err(UploadError::NoTransfer)
        ));
    }
}
