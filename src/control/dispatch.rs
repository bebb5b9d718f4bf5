//! Applies a [`ControlAction`] to the device.
//!
//! Every action records activity before anything else, whatever its
//! outcome.

use crate::controller::Device;
use crate::input::ButtonId;
use crate::playback::PlayOrigin;
use crate::storage::validate_name;

use super::{ControlAction, ControlError, ControlReply, ControlResult};

/// Execute `action` against `device` at time `now`.
pub fn dispatch(device: &mut Device, action: ControlAction, now: u32) -> ControlResult {
    device.scheduler.record_activity(now);

    match &action {
        ControlAction::UploadChunk { ticket, bytes } => {
            log::debug!("control: upload-chunk {ticket} ({} bytes)", bytes.len())
        }
        other => log::info!("control: {}", other.name()),
    }

    match action {
        ControlAction::TestButton { button } => {
            let button = parse_button(&button)?;
            let clip = button.clip_name();
            device
                .playback
                .play(device.store.as_ref(), &clip, PlayOrigin::Remote)?;
            Ok(ControlReply::Testing(button))
        }

        ControlAction::StopAudio => {
            device.playback.stop();
            Ok(ControlReply::Stopped)
        }

        ControlAction::SetVolume { raw } => {
            let requested: f32 = raw
                .trim()
                .parse()
                .ok()
                .filter(|v: &f32| !v.is_nan())
                .ok_or_else(|| ControlError::InvalidArgument(format!("Invalid volume {raw:?}")))?;
            let volume = device.playback.set_volume(requested);
            log::info!("control: volume set to {:.2}", volume.get());
            Ok(ControlReply::Volume(volume.get()))
        }

        ControlAction::GetVolume => Ok(ControlReply::Volume(device.playback.volume().get())),

        ControlAction::ListFiles => {
            let files = ButtonId::all()
                .map(ButtonId::clip_name)
                .filter(|name| device.store.exists(name))
                .collect();
            Ok(ControlReply::Files(files))
        }

        ControlAction::DeleteFile { filename } => {
            let filename = filename.trim();
            if filename.is_empty() {
                return Err(ControlError::InvalidArgument("Missing filename".into()));
            }
            validate_name(filename)?;
            if !device.store.exists(filename) {
                return Err(ControlError::NotFound("File not found".into()));
            }
            if device.playback.active_clip() == Some(filename) {
                device.playback.stop();
            }
            device.store.remove(filename)?;
            log::info!("control: deleted {filename}");
            Ok(ControlReply::Deleted(filename.to_string()))
        }

        ControlAction::UploadStart { button } => {
            let button = parse_button(&button)?;
            let ticket = device.uploads.start(device.store.as_mut(), button)?;
            Ok(ControlReply::UploadStarted(ticket))
        }

        ControlAction::UploadChunk { ticket, bytes } => {
            device.uploads.write(ticket, &bytes)?;
            Ok(ControlReply::ChunkAccepted)
        }

        ControlAction::UploadFinish { ticket } => {
            // The clip being replaced may be the one playing.  A stale
            // ticket leaves playback alone and fails in `finish`.
            if let Some(button) = device.uploads.receiving_for(ticket) {
                if device.playback.active_clip() == Some(button.clip_name().as_str()) {
                    device.playback.stop();
                }
            }
            let (button, bytes) = device.uploads.finish(ticket)?;
            Ok(ControlReply::Uploaded { button, bytes })
        }

        ControlAction::UploadAbort { ticket } => {
            device.uploads.abort(ticket)?;
            Ok(ControlReply::UploadAborted)
        }

        ControlAction::ReadBattery => Ok(ControlReply::Battery(device.battery.voltage())),

        ControlAction::SetSleepEnabled(enabled) => {
            device.scheduler.set_sleep_enabled(enabled, now);
            Ok(ControlReply::SleepEnabled(enabled))
        }
    }
}

fn parse_button(raw: &str) -> Result<ButtonId, ControlError> {
    ButtonId::parse(raw)
        .ok_or_else(|| ControlError::InvalidArgument("Invalid button number".into()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::testing::MockBackend;
    use crate::storage::{MemoryClipStore, UploadTicket};

    fn device(store: &MemoryClipStore) -> Device {
        Device::with_mock(Box::new(store.clone()), MockBackend::new(), 1_000)
    }

    fn started(reply: ControlResult) -> UploadTicket {
        match reply {
            Ok(ControlReply::UploadStarted(t)) => t,
            other => panic!("expected a ticket, got {other:?}"),
        }
    }

    // ---- Activity ---

    #[test]
    fn every_action_records_activity_even_on_failure() {
        let store = MemoryClipStore::new();
        let mut dev = device(&store);

        let err = dispatch(
            &mut dev,
            ControlAction::TestButton { button: "9".into() },
            50_000,
        );
        assert!(matches!(err, Err(ControlError::InvalidArgument(_))));
        assert_eq!(dev.scheduler.state().last_activity, 50_000);

        dispatch(&mut dev, ControlAction::GetVolume, 60_000).expect("get");
        assert_eq!(dev.scheduler.state().last_activity, 60_000);
    }

    // ---- TestButton ---

    #[test]
    fn test_button_plays_clip() {
        let store = MemoryClipStore::new().with_file("button3.mp3", b"clip");
        let mut dev = device(&store);

        let reply = dispatch(&mut dev, ControlAction::TestButton { button: "3".into() }, 0);
        assert_eq!(
            reply,
            Ok(ControlReply::Testing(ButtonId::new(3).expect("button")))
        );
        assert_eq!(dev.playback.active_clip(), Some("button3.mp3"));
    }

    #[test]
    fn test_button_rejects_bad_index_and_missing_clip() {
        let store = MemoryClipStore::new();
        let mut dev = device(&store);

        for raw in ["0", "7", "abc", ""] {
            assert!(matches!(
                dispatch(&mut dev, ControlAction::TestButton { button: raw.into() }, 0),
                Err(ControlError::InvalidArgument(_))
            ));
        }
        assert!(matches!(
            dispatch(&mut dev, ControlAction::TestButton { button: "2".into() }, 0),
            Err(ControlError::NotFound(_))
        ));
        assert!(!dev.playback.is_playing());
    }

    // ---- Volume ---

    #[test]
    fn set_volume_clamps_and_rejects_garbage() {
        let store = MemoryClipStore::new();
        let mut dev = device(&store);

        assert_eq!(
            dispatch(&mut dev, ControlAction::SetVolume { raw: "1.7".into() }, 0),
            Ok(ControlReply::Volume(1.0))
        );
        assert_eq!(
            dispatch(&mut dev, ControlAction::SetVolume { raw: "-0.3".into() }, 0),
            Ok(ControlReply::Volume(0.0))
        );
        for raw in ["", "loud", "NaN"] {
            assert!(matches!(
                dispatch(&mut dev, ControlAction::SetVolume { raw: raw.into() }, 0),
                Err(ControlError::InvalidArgument(_))
            ));
        }
        assert_eq!(
            dispatch(&mut dev, ControlAction::GetVolume, 0),
            Ok(ControlReply::Volume(0.0))
        );
    }

    // ---- Files ---

    #[test]
    fn list_files_reports_populated_slots_only() {
        let store = MemoryClipStore::new()
            .with_file("button2.mp3", b"x")
            .with_file("button5.mp3", b"y")
            .with_file("notes.txt", b"z");
        let mut dev = device(&store);

        assert_eq!(
            dispatch(&mut dev, ControlAction::ListFiles, 0),
            Ok(ControlReply::Files(vec![
                "button2.mp3".into(),
                "button5.mp3".into()
            ]))
        );
    }

    #[test]
    fn delete_missing_file_leaves_store_unchanged() {
        let store = MemoryClipStore::new().with_file("button1.mp3", b"x");
        let mut dev = device(&store);

        assert_eq!(
            dispatch(
                &mut dev,
                ControlAction::DeleteFile {
                    filename: "button4.mp3".into()
                },
                0
            ),
            Err(ControlError::NotFound("File not found".into()))
        );
        assert_eq!(store.names(), vec!["button1.mp3".to_string()]);
    }

    #[test]
    fn delete_validates_name() {
        let store = MemoryClipStore::new();
        let mut dev = device(&store);

        for name in ["", "   ", "../etc/passwd"] {
            assert!(matches!(
                dispatch(&mut dev, ControlAction::DeleteFile { filename: name.into() }, 0),
                Err(ControlError::InvalidArgument(_))
            ));
        }
    }

    #[test]
    fn deleting_playing_clip_stops_playback() {
        let store = MemoryClipStore::new().with_file("button1.mp3", b"x");
        let mut dev = device(&store);

        dispatch(&mut dev, ControlAction::TestButton { button: "1".into() }, 0).expect("play");
        assert!(dev.playback.is_playing());

        let reply = dispatch(
            &mut dev,
            ControlAction::DeleteFile {
                filename: "button1.mp3".into(),
            },
            0,
        );
        assert_eq!(reply, Ok(ControlReply::Deleted("button1.mp3".into())));
        assert!(!dev.playback.is_playing());
        assert!(store.names().is_empty());
    }

    // ---- Upload ---

    #[test]
    fn upload_round_trip_replaces_slot() {
        let store = MemoryClipStore::new().with_file("button2.mp3", b"old");
        let mut dev = device(&store);

        let t = started(dispatch(
            &mut dev,
            ControlAction::UploadStart { button: "2".into() },
            0,
        ));
        dispatch(
            &mut dev,
            ControlAction::UploadChunk {
                ticket: t,
                bytes: b"new ".to_vec(),
            },
            0,
        )
        .expect("chunk");
        dispatch(
            &mut dev,
            ControlAction::UploadChunk {
                ticket: t,
                bytes: b"clip".to_vec(),
            },
            0,
        )
        .expect("chunk");
        assert_eq!(store.contents("button2.mp3").as_deref(), Some(&b"old"[..]));

        let reply = dispatch(&mut dev, ControlAction::UploadFinish { ticket: t }, 0);
        assert_eq!(
            reply,
            Ok(ControlReply::Uploaded {
                button: ButtonId::new(2).expect("button"),
                bytes: 8
            })
        );
        assert_eq!(
            store.contents("button2.mp3").as_deref(),
            Some(&b"new clip"[..])
        );
    }

    #[test]
    fn oversize_upload_is_resource_exceeded() {
        let store = MemoryClipStore::new().with_file("button1.mp3", b"keep");
        let mut dev = device(&store);

        let t = started(dispatch(
            &mut dev,
            ControlAction::UploadStart { button: "1".into() },
            0,
        ));
        let err = dispatch(
            &mut dev,
            ControlAction::UploadChunk {
                ticket: t,
                bytes: vec![0; 1_001],
            },
            0,
        );
        assert_eq!(
            err,
            Err(ControlError::ResourceExceeded {
                limit: 1_000,
                attempted: 1_001
            })
        );
        assert_eq!(store.contents("button1.mp3").as_deref(), Some(&b"keep"[..]));
    }

    #[test]
    fn upload_start_rejects_bad_button() {
        let store = MemoryClipStore::new();
        let mut dev = device(&store);
        assert!(matches!(
            dispatch(&mut dev, ControlAction::UploadStart { button: "x".into() }, 0),
            Err(ControlError::InvalidArgument(_))
        ));
    }

    #[test]
    fn replacing_playing_clip_stops_playback() {
        let store = MemoryClipStore::new().with_file("button4.mp3", b"old");
        let mut dev = device(&store);
        dispatch(&mut dev, ControlAction::TestButton { button: "4".into() }, 0).expect("play");

        let t = started(dispatch(
            &mut dev,
            ControlAction::UploadStart { button: "4".into() },
            0,
        ));
        assert!(dev.playback.is_playing());
        dispatch(&mut dev, ControlAction::UploadFinish { ticket: t }, 0).expect("finish");
        assert!(!dev.playback.is_playing());
    }

    #[test]
    fn superseded_finish_leaves_playback_running() {
        let store = MemoryClipStore::new().with_file("button4.mp3", b"old");
        let mut dev = device(&store);
        dispatch(&mut dev, ControlAction::TestButton { button: "4".into() }, 0).expect("play");

        let first = started(dispatch(
            &mut dev,
            ControlAction::UploadStart { button: "4".into() },
            0,
        ));
        let second = started(dispatch(
            &mut dev,
            ControlAction::UploadStart { button: "4".into() },
            0,
        ));
        assert_ne!(first, second);

        let late = dispatch(&mut dev, ControlAction::UploadFinish { ticket: first }, 0);
        assert!(matches!(late, Err(ControlError::InvalidArgument(_))));
        assert_eq!(dev.playback.active_clip(), Some("button4.mp3"));
        assert_eq!(store.contents("button4.mp3").as_deref(), Some(&b"old"[..]));
    }

    // ---- Battery / sleep toggle ---

    #[test]
    fn battery_and_sleep_toggle() {
        let store = MemoryClipStore::new();
        let mut dev = device(&store);

        match dispatch(&mut dev, ControlAction::ReadBattery, 0) {
            Ok(ControlReply::Battery(v)) => assert!((v - 4.0907).abs() < 1e-3),
            other => panic!("unexpected {other:?}"),
        }

        dispatch(&mut dev, ControlAction::SetSleepEnabled(false), 10).expect("toggle");
        assert!(!dev.scheduler.sleep_enabled());
    }
}
