//! HTTP surface of the control plane.
//!
//! Handlers translate form/query parameters into [`ControlAction`]s, send
//! them through a [`ControlHandle`] and render the reply.  Status codes:
//!
//! | error                | status |
//! |----------------------|--------|
//! | `InvalidArgument`    | 400    |
//! | `NotFound`           | 404    |
//! | `ResourceExceeded`   | 413    |
//! | `DecodeStartFailed`  | 500    |
//! | `Storage`            | 500    |
//! | `Unavailable`        | 503    |
//!
//! Every routed request raises the activity pulse first, including ones
//! later rejected by the body limit or a malformed form.

use axum::{
    extract::{
        multipart::{Field, MultipartError},
        rejection::{FormRejection, QueryRejection},
        DefaultBodyLimit, Multipart, Query, Request, State,
    },
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::watch;

use super::{ControlAction, ControlError, ControlHandle, ControlReply};
use crate::input::ButtonId;
use crate::storage::UploadTicket;

/// Slack on top of the clip limit for multipart framing and headers.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

impl IntoResponse for ControlError {
    fn into_response(self) -> Response {
        let status = match &self {
            ControlError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            ControlError::NotFound(_) => StatusCode::NOT_FOUND,
            ControlError::ResourceExceeded { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ControlError::DecodeStartFailed(_) | ControlError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ControlError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        };
        if status.is_server_error() {
            log::error!("http: {self}");
        }
        (status, self.to_string()).into_response()
    }
}

/// Build the control router.  `max_upload` bounds a single clip.
pub fn router(handle: ControlHandle, max_upload: usize) -> Router {
    Router::new()
        .route("/battery", get(battery))
        .route("/files", get(list_files))
        .route("/upload", post(upload))
        .route("/delete", post(delete_file))
        .route("/test", post(test_button))
        .route("/stop", post(stop_audio))
        .route("/volume", get(get_volume).post(set_volume))
        .layer(DefaultBodyLimit::max(
            max_upload.saturating_add(MULTIPART_OVERHEAD),
        ))
        .layer(middleware::from_fn_with_state(handle.clone(), mark_activity))
        .with_state(handle)
}

async fn mark_activity(
    State(handle): State<ControlHandle>,
    request: Request,
    next: Next,
) -> Response {
    handle.activity().signal();
    next.run(request).await
}

/// Serve the control router on `listener` until `radio_off` turns true.
pub async fn serve(
    listener: TcpListener,
    handle: ControlHandle,
    max_upload: usize,
    mut radio_off: watch::Receiver<bool>,
) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    log::info!("http: listening on http://{addr}");

    axum::serve(listener, router(handle, max_upload))
        .with_graceful_shutdown(async move {
            // A dropped sender also ends the server.
            let _ = radio_off.wait_for(|off| *off).await;
            log::info!("http: radio off, shutting down");
        })
        .await
}

/// A reply variant the action never produces.
fn unexpected(reply: ControlReply) -> ControlError {
    log::error!("http: unexpected controller reply {reply:?}");
    ControlError::Unavailable
}

fn missing(what: &str) -> ControlError {
    ControlError::InvalidArgument(format!("Missing {what}"))
}

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ButtonParam {
    button: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FilenameParam {
    filename: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VolumeParam {
    volume: Option<String>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn battery(State(handle): State<ControlHandle>) -> Result<Json<Value>, ControlError> {
    match handle.request(ControlAction::ReadBattery).await? {
        ControlReply::Battery(voltage) => Ok(Json(json!({ "voltage": voltage }))),
        other => Err(unexpected(other)),
    }
}

async fn list_files(State(handle): State<ControlHandle>) -> Result<Json<Value>, ControlError> {
    match handle.request(ControlAction::ListFiles).await? {
        ControlReply::Files(files) => Ok(Json(json!({ "files": files }))),
        other => Err(unexpected(other)),
    }
}

async fn get_volume(State(handle): State<ControlHandle>) -> Result<Json<Value>, ControlError> {
    match handle.request(ControlAction::GetVolume).await? {
        ControlReply::Volume(volume) => Ok(Json(json!({ "volume": volume }))),
        other => Err(unexpected(other)),
    }
}

async fn set_volume(
    State(handle): State<ControlHandle>,
    form: Result<Form<VolumeParam>, FormRejection>,
) -> Result<String, ControlError> {
    let raw = form
        .ok()
        .and_then(|Form(p)| p.volume)
        .ok_or_else(|| missing("volume parameter"))?;

    match handle.request(ControlAction::SetVolume { raw }).await? {
        ControlReply::Volume(volume) => Ok(format!("Volume set to {volume:.2}")),
        other => Err(unexpected(other)),
    }
}

async fn stop_audio(State(handle): State<ControlHandle>) -> Result<&'static str, ControlError> {
    match handle.request(ControlAction::StopAudio).await? {
        ControlReply::Stopped => Ok("Audio stopped"),
        other => Err(unexpected(other)),
    }
}

async fn delete_file(
    State(handle): State<ControlHandle>,
    form: Result<Form<FilenameParam>, FormRejection>,
) -> Result<&'static str, ControlError> {
    let filename = form
        .ok()
        .and_then(|Form(p)| p.filename)
        .ok_or_else(|| missing("filename"))?;

    match handle.request(ControlAction::DeleteFile { filename }).await? {
        ControlReply::Deleted(_) => Ok("File deleted"),
        other => Err(unexpected(other)),
    }
}

/// A valid button always answers 200; a slot that cannot play is noted in
/// the body.
async fn test_button(
    State(handle): State<ControlHandle>,
    form: Result<Form<ButtonParam>, FormRejection>,
) -> Result<String, ControlError> {
    let raw = form
        .ok()
        .and_then(|Form(p)| p.button)
        .ok_or_else(|| missing("button parameter"))?;

    let result = handle
        .request(ControlAction::TestButton {
            button: raw.clone(),
        })
        .await;

    match result {
        Ok(ControlReply::Testing(button)) => Ok(format!("Testing {button}")),
        Ok(other) => Err(unexpected(other)),
        Err(e @ (ControlError::NotFound(_) | ControlError::DecodeStartFailed(_))) => {
            match ButtonId::parse(&raw) {
                Some(button) => {
                    log::warn!("http: test of {button} did not start: {e}");
                    Ok(format!("Testing {button} ({e})"))
                }
                None => Err(e),
            }
        }
        Err(e) => Err(e),
    }
}

/// `POST /upload?button=N` with a multipart file field.
///
/// The first file field is streamed chunk by chunk into the controller;
/// any failure aborts the transfer so the slot's previous clip survives.
async fn upload(
    State(handle): State<ControlHandle>,
    query: Result<Query<ButtonParam>, QueryRejection>,
    mut multipart: Multipart,
) -> Result<Json<Value>, ControlError> {
    let button = query
        .ok()
        .and_then(|Query(p)| p.button)
        .ok_or_else(|| missing("button parameter"))?;

    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        if field.file_name().is_some() || field.name() == Some("file") {
            return receive(&handle, button, field).await;
        }
    }
    Err(ControlError::InvalidArgument("No file in upload".into()))
}

async fn receive(
    handle: &ControlHandle,
    button: String,
    mut field: Field<'_>,
) -> Result<Json<Value>, ControlError> {
    let ticket = match handle.request(ControlAction::UploadStart { button }).await? {
        ControlReply::UploadStarted(ticket) => ticket,
        other => return Err(unexpected(other)),
    };
    if let Some(name) = field.file_name() {
        log::info!("http: upload {ticket} receiving {name}");
    }

    loop {
        let bytes = match field.chunk().await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => break,
            Err(e) => {
                abort(handle, ticket).await;
                return Err(malformed(e));
            }
        };
        let chunk = ControlAction::UploadChunk {
            ticket,
            bytes: bytes.to_vec(),
        };
        if let Err(e) = handle.request(chunk).await {
            abort(handle, ticket).await;
            return Err(e);
        }
    }

    match handle.request(ControlAction::UploadFinish { ticket }).await? {
        ControlReply::Uploaded { button, bytes } => {
            log::info!("http: stored {bytes} bytes for {button}");
            Ok(Json(json!({
                "status": "success",
                "message": "File uploaded successfully!",
            })))
        }
        other => Err(unexpected(other)),
    }
}

fn malformed(e: MultipartError) -> ControlError {
    ControlError::InvalidArgument(format!("Malformed upload: {e}"))
}

/// Best-effort abort; the transfer may already be gone.
async fn abort(handle: &ControlHandle, ticket: UploadTicket) {
    if let Err(e) = handle.request(ControlAction::UploadAbort { ticket }).await {
        log::debug!("http: abort of upload {ticket}: {e}");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
