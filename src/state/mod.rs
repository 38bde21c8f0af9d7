//! Persisted update state
//!
//! Two small binary files live next to the application:
//! - the [installed-version record](installed_version), rewritten after every batch
//! - the [progress cache](progress_cache), present only while a batch is
//!   partially installed
//!
//! Both are little-endian. Strings carry a LEB128 byte-length prefix followed
//! by UTF-8 bytes. Files are replaced by writing a sibling temp file and
//! renaming it over the old one, so a crash never leaves a truncated record.

pub mod installed_version;
pub mod progress_cache;

pub use progress_cache::{CachedFile, ProgressCache};

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Append-only little-endian encoder
#[derive(Default)]
pub(crate) struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    pub(crate) fn i32(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub(crate) fn u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub(crate) fn string(&mut self, value: &str) {
        let mut len = value.len();
        loop {
            let byte = (len & 0x7f) as u8;
            len >>= 7;
            if len == 0 {
                self.buf.push(byte);
                break;
            }
            self.buf.push(byte | 0x80);
        }
        self.buf.extend_from_slice(value.as_bytes());
    }

    pub(crate) fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// Cursor over an encoded record; errors are human-readable reasons
pub(crate) struct Decoder<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, len: usize) -> std::result::Result<&'a [u8], String> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.buf.len())
            .ok_or_else(|| format!("truncated at byte {}", self.pos))?;
        let bytes = &self.buf[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn array<const N: usize>(&mut self) -> std::result::Result<[u8; N], String> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub(crate) fn i32(&mut self) -> std::result::Result<i32, String> {
        Ok(i32::from_le_bytes(self.array()?))
    }

    pub(crate) fn u32(&mut self) -> std::result::Result<u32, String> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    /// Non-negative `i32` count
    pub(crate) fn count(&mut self) -> std::result::Result<usize, String> {
        let count = self.i32()?;
        usize::try_from(count).map_err(|_| format!("negative count {count}"))
    }

    pub(crate) fn string(&mut self) -> std::result::Result<String, String> {
        let mut len: usize = 0;
        let mut shift = 0;
        loop {
            let [byte] = self.array::<1>()?;
            if shift > 28 {
                return Err("string length prefix is too long".to_string());
            }
            len |= usize::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                break;
            }
            shift += 7;
        }
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|e| format!("invalid UTF-8 string: {e}"))
    }

    pub(crate) fn finish(self) -> std::result::Result<(), String> {
        if self.pos == self.buf.len() {
            Ok(())
        } else {
            Err(format!("{} unexpected trailing bytes", self.buf.len() - self.pos))
        }
    }
}

pub(crate) fn corrupt(path: &Path, reason: impl Into<String>) -> Error {
    Error::CorruptState {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

/// Read a state file; a missing file is `None`
pub(crate) async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::Io(e)),
    }
}

/// Replace a state file via a sibling temp file and rename
pub(crate) async fn write_replacing(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = temp_sibling(path);
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

/// Delete a state file; already missing is fine
pub(crate) async fn remove_optional(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::Io(e)),
    }
}

fn temp_sibling(path: &Path) -> PathBuf {
    crate::file::sibling_with_suffix(path, ".tmp")
}
