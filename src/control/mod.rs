//! Control plane: named external actions, their replies and errors, and the
//! message channel that carries them into the tick loop.
//!
//! # Architecture
//!
//! ```text
//! axum handler ──ControlHandle::request(action)──▶ mpsc ──▶ Controller::tick
//!      ▲                                                        │
//!      └──────────── oneshot Result<ControlReply, ControlError> ◀┘ dispatch()
//! ```
//!
//! Handlers never touch device state.  They send a [`ControlRequest`] and
//! await its reply; the controller drains a bounded number of requests per
//! tick and answers each through [`dispatch`].  Once the device has gone to
//! sleep the channel closes and every request fails with
//! [`ControlError::Unavailable`].
//!
//! Every HTTP request also raises the handle's [`ActivityPulse`] before any
//! extraction, so traffic that is rejected without reaching a handler
//! still holds off sleep.

pub mod dispatch;
pub mod http;

pub use dispatch::dispatch;
pub use http::{router, serve};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use crate::input::ButtonId;
use crate::playback::PlaybackError;
use crate::storage::{StorageError, UploadError, UploadTicket};

// ---------------------------------------------------------------------------
// ControlAction / ControlReply
// ---------------------------------------------------------------------------

/// An external command.  Arguments arrive unparsed; validation happens in
/// [`dispatch`] so that malformed input still counts as activity.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlAction {
    TestButton { button: String },
    StopAudio,
    SetVolume { raw: String },
    GetVolume,
    ListFiles,
    DeleteFile { filename: String },
    UploadStart { button: String },
    UploadChunk { ticket: UploadTicket, bytes: Vec<u8> },
    UploadFinish { ticket: UploadTicket },
    UploadAbort { ticket: UploadTicket },
    ReadBattery,
    SetSleepEnabled(bool),
}

impl ControlAction {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            ControlAction::TestButton { .. } => "test-button",
            ControlAction::StopAudio => "stop-audio",
            ControlAction::SetVolume { .. } => "set-volume",
            ControlAction::GetVolume => "get-volume",
            ControlAction::ListFiles => "list-files",
            ControlAction::DeleteFile { .. } => "delete-file",
            ControlAction::UploadStart { .. } => "upload-start",
            ControlAction::UploadChunk { .. } => "upload-chunk",
            ControlAction::UploadFinish { .. } => "upload-finish",
            ControlAction::UploadAbort { .. } => "upload-abort",
            ControlAction::ReadBattery => "read-battery",
            ControlAction::SetSleepEnabled(_) => "set-sleep-enabled",
        }
    }
}

/// Successful outcome of a [`ControlAction`].
#[derive(Debug, Clone, PartialEq)]
pub enum ControlReply {
    Testing(ButtonId),
    Stopped,
    Volume(f32),
    Files(Vec<String>),
    Deleted(String),
    UploadStarted(UploadTicket),
    ChunkAccepted,
    Uploaded { button: ButtonId, bytes: usize },
    UploadAborted,
    Battery(f32),
    SleepEnabled(bool),
}

// ---------------------------------------------------------------------------
// ControlError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ControlError {
    #[error("{0}")]
    InvalidArgument(String),

    #[error("{0}")]
    NotFound(String),

    #[error("upload of {attempted} bytes exceeds the {limit}-byte limit")]
    ResourceExceeded { limit: usize, attempted: usize },

    #[error("failed to start playback: {0}")]
    DecodeStartFailed(String),

    #[error("storage error: {0}")]
    Storage(String),

    /// The controller is no longer servicing requests.
    #[error("device unavailable")]
    Unavailable,
}

impl From<PlaybackError> for ControlError {
    fn from(e: PlaybackError) -> Self {
        match e {
            PlaybackError::NotFound(clip) => ControlError::NotFound(format!("No clip {clip}")),
            PlaybackError::DecodeStartFailed(msg) => ControlError::DecodeStartFailed(msg),
        }
    }
}

impl From<StorageError> for ControlError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound(_) => ControlError::NotFound("File not found".into()),
            StorageError::InvalidName(name) => {
                ControlError::InvalidArgument(format!("Invalid filename {name:?}"))
            }
            StorageError::Io(io) => ControlError::Storage(io.to_string()),
        }
    }
}

impl From<UploadError> for ControlError {
    fn from(e: UploadError) -> Self {
        match e {
            UploadError::ResourceExceeded { limit, attempted } => {
                ControlError::ResourceExceeded { limit, attempted }
            }
            UploadError::NoTransfer | UploadError::StaleTicket(_) => {
                ControlError::InvalidArgument(e.to_string())
            }
            UploadError::Storage(s) => s.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// ControlRequest / ControlHandle
// ---------------------------------------------------------------------------

pub type ControlResult = Result<ControlReply, ControlError>;

/// An action plus the slot its reply goes to.
#[derive(Debug)]
pub struct ControlRequest {
    pub action: ControlAction,
    pub reply: oneshot::Sender<ControlResult>,
}

/// Latched "something talked to us" flag, raised by the HTTP layer and
/// consumed once per tick by the controller.
#[derive(Debug, Clone, Default)]
pub struct ActivityPulse(Arc<AtomicBool>);

impl ActivityPulse {
    pub fn signal(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// `true` if signalled since the last call.
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }
}

/// Cloneable sender side used by the HTTP layer (and embedders).
#[derive(Debug, Clone)]
pub struct ControlHandle {
    tx: mpsc::Sender<ControlRequest>,
    activity: ActivityPulse,
}

/// Create a request channel holding up to `capacity` queued requests.
pub fn channel(capacity: usize) -> (ControlHandle, mpsc::Receiver<ControlRequest>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let handle = ControlHandle {
        tx,
        activity: ActivityPulse::default(),
    };
    (handle, rx)
}

impl ControlHandle {
    /// The pulse shared by every clone of this handle.
    pub fn activity(&self) -> &ActivityPulse {
        &self.activity
    }

    /// Send `action` to the controller and wait for its reply.
    pub async fn request(&self, action: ControlAction) -> ControlResult {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(ControlRequest { action, reply })
            .await
            .map_err(|_| ControlError::Unavailable)?;
        rx.await.map_err(|_| ControlError::Unavailable)?
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn request_round_trips_through_channel() {
        let (handle, mut rx) = channel(4);
        let server = tokio::spawn(async move {
            let req = rx.recv().await.expect("request");
            assert_eq!(req.action, ControlAction::GetVolume);
            let _ = req.reply.send(Ok(ControlReply::Volume(0.5)));
        });

        let reply = handle.request(ControlAction::GetVolume).await;
        assert_eq!(reply, Ok(ControlReply::Volume(0.5)));
        server.await.expect("join");
    }

    #[tokio::test]
    async fn closed_controller_is_unavailable() {
        let (handle, rx) = channel(4);
        drop(rx);
        assert_eq!(
            handle.request(ControlAction::StopAudio).await,
            Err(ControlError::Unavailable)
        );
    }

    #[tokio::test]
    async fn dropped_reply_is_unavailable() {
        let (handle, mut rx) = channel(4);
        tokio::spawn(async move {
            let req = rx.recv().await.expect("request");
            drop(req);
        });
        assert_eq!(
            handle.request(ControlAction::ReadBattery).await,
            Err(ControlError::Unavailable)
        );
    }

    #[test]
    fn pulse_is_shared_and_taken_once() {
        let (handle, _rx) = channel(1);
        let pulse = handle.activity().clone();
        assert!(!pulse.take());

        handle.clone().activity().signal();
        assert!(pulse.take());
        assert!(!pulse.take());
    }

    #[test]
    fn upload_errors_map_to_control_taxonomy() {
        let e: ControlError = UploadError::ResourceExceeded {
            limit: 10,
            attempted: 11,
        }
        .into();
        assert_eq!(
            e,
            ControlError::ResourceExceeded {
                limit: 10,
                attempted: 11
            }
        );

        let e: ControlError = UploadError::NoTransfer.into();
        assert!(matches!(e, ControlError::InvalidArgument(_)));

        let e: ControlError = StorageError::NotFound("x".into()).into();
        assert_eq!(e, ControlError::NotFound("File not found".into()));
    }
}
