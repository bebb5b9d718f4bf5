//! Directory-backed [`ClipStore`].
//!
//! Committed clips live directly in the store directory under their slot
//! name.  A pending write goes to `<name>.part` next to it and is renamed
//! over the final name on commit, so a reader never observes a partially
//! received clip.  Leftover `.part` files from an interrupted transfer are
//! swept when the store is opened.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use super::{validate_name, ClipSource, ClipStore, PendingWrite, StorageError};

/// Suffix of in-progress upload files.
pub const PART_SUFFIX: &str = ".part";

// ---------------------------------------------------------------------------
// FsClipStore
// ---------------------------------------------------------------------------

/// A flat directory of clips.
#[derive(Debug, Clone)]
pub struct FsClipStore {
    root: PathBuf,
}

impl FsClipStore {
    /// Open (creating if needed) the store rooted at `root` and discard any
    /// stale pending writes.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(&root)?;

        for entry in fs::read_dir(&root)? {
            let path = entry?.path();
            let stale = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(PART_SUFFIX));
            if stale {
                log::info!("storage: removing stale partial upload {}", path.display());
                fs::remove_file(&path)?;
            }
        }

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, name: &str) -> Result<PathBuf, StorageError> {
        validate_name(name)?;
        Ok(self.root.join(name))
    }
}

impl ClipStore for FsClipStore {
    fn exists(&self, name: &str) -> bool {
        self.path_of(name).is_ok_and(|p| p.is_file())
    }

    fn open(&self, name: &str) -> Result<Box<dyn ClipSource>, StorageError> {
        let path = self.path_of(name)?;
        match File::open(&path) {
            Ok(file) => Ok(Box::new(file)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn remove(&mut self, name: &str) -> Result<(), StorageError> {
        let path = self.path_of(name)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn begin_write(&mut self, name: &str) -> Result<Box<dyn PendingWrite>, StorageError> {
        let final_path = self.path_of(name)?;
        let part_path = self.root.join(format!("{name}{PART_SUFFIX}"));
        let file = File::create(&part_path)?;

        Ok(Box::new(FsPendingWrite {
            writer: Some(BufWriter::new(file)),
            part_path,
            final_path,
        }))
    }
}

// ---------------------------------------------------------------------------
// FsPendingWrite
// ---------------------------------------------------------------------------

struct FsPendingWrite {
    writer: Option<BufWriter<File>>,
    part_path: PathBuf,
    final_path: PathBuf,
}

impl PendingWrite for FsPendingWrite {
    fn write(&mut self, bytes: &[u8]) -> Result<(), StorageError> {
        match self.writer.as_mut() {
            Some(writer) => Ok(writer.write_all(bytes)?),
            None => Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "pending write already closed",
            ))),
        }
    }

    fn commit(mut self: Box<Self>) -> Result<(), StorageError> {
        if let Some(writer) = self.writer.take() {
            let file = writer.into_inner().map_err(|e| e.into_error())?;
            file.sync_all()?;
        }

        // Old clip goes first, then the new one takes its name.
        match fs::remove_file(&self.final_path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        fs::rename(&self.part_path, &self.final_path)?;
        Ok(())
    }
}

impl Drop for FsPendingWrite {
    fn drop(&mut self) {
        // After a successful commit the part file has been renamed away.
        self.writer.take();
        if self.part_path.exists() {
            if let Err(e) = fs::remove_file(&self.part_path) {
                log::warn!(
                    "storage: could not discard {}: {e}",
                    self.part_path.display()
                );
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::tempdir;

    fn read_all(store: &FsClipStore, name: &str) -> Vec<u8> {
        let mut buf = Vec::new();
        store
            .open(name)
            .expect("open")
            .read_to_end(&mut buf)
            .expect("read");
        buf
    }

    #[test]
    fn committed_write_becomes_visible() {
        let dir = tempdir().expect("temp dir");
        let mut store = FsClipStore::open(dir.path()).expect("store");

        let mut w = store.begin_write("button1.mp3").expect("begin");
        w.write(b"abc").expect("write");
        assert!(!store.exists("button1.mp3"));
        w.commit().expect("commit");

        assert!(store.exists("button1.mp3"));
        assert_eq!(read_all(&store, "button1.mp3"), b"abc");
        assert!(!dir.path().join("button1.mp3.part").exists());
    }

    #[test]
    fn dropped_write_leaves_previous_clip() {
        let dir = tempdir().expect("temp dir");
        let mut store = FsClipStore::open(dir.path()).expect("store");
        fs::write(dir.path().join("button2.mp3"), b"old").expect("seed");

        let mut w = store.begin_write("button2.mp3").expect("begin");
        w.write(b"new-but-incomplete").expect("write");
        assert_eq!(read_all(&store, "button2.mp3"), b"old");
        drop(w);

        assert_eq!(read_all(&store, "button2.mp3"), b"old");
        assert!(!dir.path().join("button2.mp3.part").exists());
    }

    #[test]
    fn commit_replaces_previous_clip() {
        let dir = tempdir().expect("temp dir");
        let mut store = FsClipStore::open(dir.path()).expect("store");
        fs::write(dir.path().join("button3.mp3"), b"old").expect("seed");

        let mut w = store.begin_write("button3.mp3").expect("begin");
        w.write(b"fresh").expect("write");
        w.commit().expect("commit");

        assert_eq!(read_all(&store, "button3.mp3"), b"fresh");
    }

    #[test]
    fn remove_missing_is_not_found() {
        let dir = tempdir().expect("temp dir");
        let mut store = FsClipStore::open(dir.path()).expect("store");
        fs::write(dir.path().join("button1.mp3"), b"x").expect("seed");

        assert!(matches!(
            store.remove("button4.mp3"),
            Err(StorageError::NotFound(_))
        ));
        assert!(store.exists("button1.mp3"));
    }

    #[test]
    fn traversal_names_are_rejected() {
        let dir = tempdir().expect("temp dir");
        let mut store = FsClipStore::open(dir.path().join("clips")).expect("store");
        fs::write(dir.path().join("secret"), b"x").expect("seed");

        assert!(!store.exists("../secret"));
        assert!(matches!(
            store.remove("../secret"),
            Err(StorageError::InvalidName(_))
        ));
        assert!(dir.path().join("secret").exists());
    }

    #[test]
    fn open_sweeps_stale_partials() {
        let dir = tempdir().expect("temp dir");
        fs::write(dir.path().join("button5.mp3.part"), b"half").expect("seed");
        fs::write(dir.path().join("button5.mp3"), b"whole").expect("seed");

        let store = FsClipStore::open(dir.path()).expect("store");
        assert!(!dir.path().join("button5.mp3.part").exists());
        assert_eq!(read_all(&store, "button5.mp3"), b"whole");
    }
}
