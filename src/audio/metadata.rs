//! ID3v2 tag skipping.
//!
//! MP3 files frequently start with an ID3v2 tag (artwork, titles) that can
//! run to hundreds of kilobytes.  [`Id3Stripper`] detects the tag header and
//! exposes a view of the stream that starts at the first audio frame, so
//! position 0 of the view is the first byte after the tag.

use std::io::{self, Read, Seek, SeekFrom};

/// Size of the fixed ID3v2 header.
const HEADER_LEN: u64 = 10;
/// Size of the optional ID3v2.4 footer.
const FOOTER_LEN: u64 = 10;

/// Offset view over `R` that hides a leading ID3v2 tag.
pub struct Id3Stripper<R> {
    inner: R,
    offset: u64,
}

impl<R: Read + Seek> Id3Stripper<R> {
    /// Probe `inner` for a tag and position it at the first audio byte.
    ///
    /// Streams without a tag (or shorter than a tag header) are passed
    /// through unchanged.
    pub fn new(mut inner: R) -> io::Result<Self> {
        inner.seek(SeekFrom::Start(0))?;
        let mut header = [0u8; HEADER_LEN as usize];
        let read = read_up_to(&mut inner, &mut header)?;

        let offset = if read == header.len() {
            tag_len(&header).unwrap_or(0)
        } else {
            0
        };
        if offset > 0 {
            log::debug!("playback: skipping {offset}-byte ID3v2 tag");
        }

        inner.seek(SeekFrom::Start(offset))?;
        Ok(Self { inner, offset })
    }
}

/// Total tag length including header and footer, if `header` is a valid
/// ID3v2 header.
fn tag_len(header: &[u8; HEADER_LEN as usize]) -> Option<u64> {
    if &header[..3] != b"ID3" || header[3] == 0xFF || header[4] == 0xFF {
        return None;
    }
    let size = syncsafe(&header[6..10])?;
    let footer = if header[5] & 0x10 != 0 { FOOTER_LEN } else { 0 };
    Some(HEADER_LEN + size + footer)
}

/// Decode a 28-bit "syncsafe" integer (7 bits per byte, MSB clear).
fn syncsafe(bytes: &[u8]) -> Option<u64> {
    bytes.iter().try_fold(0u64, |acc, &b| {
        (b & 0x80 == 0).then_some((acc << 7) | u64::from(b))
    })
}

fn read_up_to<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

impl<R: Read> Read for Id3Stripper<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<R: Seek> Seek for Id3Stripper<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(n) => SeekFrom::Start(self.offset.saturating_add(n)),
            other => other,
        };
        let absolute = self.inner.seek(target)?;
        if absolute < self.offset {
            self.inner.seek(SeekFrom::Start(self.offset))?;
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before start of audio data",
            ));
        }
        Ok(absolute - self.offset)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
