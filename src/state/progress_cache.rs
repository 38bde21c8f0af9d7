//! Progress cache for an interrupted batch
//!
//! Layout: version string, `i32` file count, then per file its destination,
//! URL and download path strings.

use super::{Decoder, Encoder, corrupt, read_optional, remove_optional, write_replacing};
use crate::error::Result;
use crate::file::ResumableFile;
use crate::version::Version;
use std::path::{Path, PathBuf};

/// One file of the interrupted batch that is not installed yet
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CachedFile {
    /// Install destination relative to the app root
    pub full_path: String,
    /// Source URL
    pub url: String,
    /// Where the partial download lives
    pub download_path: PathBuf,
}

impl From<&ResumableFile> for CachedFile {
    fn from(file: &ResumableFile) -> Self {
        Self {
            full_path: file.full_path().to_string(),
            url: file.url().to_string(),
            download_path: file.download_path().to_path_buf(),
        }
    }
}

/// Files still to install for the batch that was running
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProgressCache {
    /// Version of the partially installed batch
    pub version: Version,
    /// Files of that batch not yet installed
    pub remaining: Vec<CachedFile>,
}

impl ProgressCache {
    /// Snapshot the remaining files of a batch
    pub fn new<'a>(version: Version, remaining: impl IntoIterator<Item = &'a ResumableFile>) -> Self {
        Self {
            version,
            remaining: remaining.into_iter().map(CachedFile::from).collect(),
        }
    }

    /// Whether `path` is still awaiting install
    pub fn contains(&self, path: &str) -> bool {
        self.remaining.iter().any(|f| f.full_path == path)
    }

    /// Cached entry for `path`
    pub fn get(&self, path: &str) -> Option<&CachedFile> {
        self.remaining.iter().find(|f| f.full_path == path)
    }

    /// Read the cache; `None` when no batch was interrupted
    pub async fn load(path: &Path) -> Result<Option<Self>> {
        let Some(bytes) = read_optional(path).await? else {
            return Ok(None);
        };
        Self::decode(&bytes)
            .map(Some)
            .map_err(|reason| corrupt(path, reason))
    }

    /// Persist the cache, replacing any previous one
    pub async fn save(&self, path: &Path) -> Result<()> {
        write_replacing(path, &self.encode()).await
    }

    /// Remove the cache file if present
    pub async fn delete(path: &Path) -> Result<()> {
        remove_optional(path).await
    }

    fn encode(&self) -> Vec<u8> {
        let mut enc = Encoder::default();
        enc.string(&self.version.to_string());
        enc.i32(i32::try_from(self.remaining.len()).unwrap_or(i32::MAX));
        for file in &self.remaining {
            enc.string(&file.full_path);
            enc.string(&file.url);
            enc.string(&file.download_path.to_string_lossy());
        }
        enc.finish()
    }

    fn decode(bytes: &[u8]) -> std::result::Result<Self, String> {
        let mut dec = Decoder::new(bytes);
        let version = Version::parse(&dec.string()?).map_err(|e| e.to_string())?;
        let count = dec.count()?;

        let mut remaining = Vec::with_capacity(count.min(4096));
        for _ in 0..count {
            remaining.push(CachedFile {
                full_path: dec.string()?,
                url: dec.string()?,
                download_path: PathBuf::from(dec.string()?),
            });
        }
        dec.finish()?;

        Ok(Self { version, remaining })
    }
}
