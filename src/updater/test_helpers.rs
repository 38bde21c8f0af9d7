//! Shared test helpers: an in-memory transfer source and an updater harness.

use crate::config::UpdaterConfig;
use crate::error::{Result, TransferError};
use crate::manifest::JsonManifestDecoder;
use crate::transfer::{RangedBody, TransferSource};
use crate::types::Event;
use crate::updater::{Relauncher, Updater, UpdaterComponents};
use crate::version::Version;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};

/// Base URL every published test document lives under
pub(crate) const HOST: &str = "http://patch.test";

/// Deterministic, position-dependent bytes so misplaced ranges are detectable
pub(crate) fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// A patch manifest document in the published JSON shape
pub(crate) fn manifest_json(version: &str, host: &str, files: &[&str], next: Option<&str>) -> String {
    serde_json::json!({
        "Version": version,
        "Host": host,
        "Files": files,
        "PatchRequiredUrl": next.unwrap_or(""),
    })
    .to_string()
}

/// In-memory [`TransferSource`] with fault injection
#[derive(Default)]
pub(crate) struct MemorySource {
    files: Mutex<HashMap<String, Vec<u8>>>,
    texts: Mutex<HashMap<String, String>>,
    failures: Mutex<HashMap<String, u64>>,
    ignore_range: Mutex<HashSet<String>>,
    ranged_reads: Mutex<Vec<(String, u64)>>,
}

impl MemorySource {
    pub(crate) fn add_file(&self, url: &str, bytes: Vec<u8>) {
        self.files.lock().unwrap().insert(url.to_string(), bytes);
    }

    pub(crate) fn add_text(&self, url: &str, text: String) {
        self.texts.lock().unwrap().insert(url.to_string(), text);
    }

    /// The next stream of `url` that covers byte `offset` fails there
    pub(crate) fn fail_once_at(&self, url: &str, offset: u64) {
        self.failures.lock().unwrap().insert(url.to_string(), offset);
    }

    /// Serve `url` from byte 0 whatever offset is requested
    pub(crate) fn ignore_range(&self, url: &str) {
        self.ignore_range.lock().unwrap().insert(url.to_string());
    }

    /// Every `(url, requested offset)` passed to `ranged_read`
    pub(crate) fn ranged_reads(&self) -> Vec<(String, u64)> {
        self.ranged_reads.lock().unwrap().clone()
    }

    pub(crate) fn reads_of(&self, url: &str) -> Vec<u64> {
        self.ranged_reads()
            .into_iter()
            .filter(|(u, _)| u == url)
            .map(|(_, offset)| offset)
            .collect()
    }

    fn not_found(url: &str) -> crate::error::Error {
        TransferError::BadStatus {
            url: url.to_string(),
            status: 404,
        }
        .into()
    }
}

#[async_trait]
impl TransferSource for MemorySource {
    async fn head_length(&self, url: &str) -> Result<u64> {
        self.files
            .lock()
            .unwrap()
            .get(url)
            .map(|bytes| bytes.len() as u64)
            .ok_or_else(|| Self::not_found(url))
    }

    async fn ranged_read(&self, url: &str, offset: u64) -> Result<RangedBody> {
        let data = self
            .files
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| Self::not_found(url))?;
        self.ranged_reads
            .lock()
            .unwrap()
            .push((url.to_string(), offset));

        let start = if self.ignore_range.lock().unwrap().contains(url) {
            0
        } else {
            offset
        };
        if start > data.len() as u64 {
            return Err(TransferError::BadStatus {
                url: url.to_string(),
                status: 416,
            }
            .into());
        }

        let fail_at = {
            let mut failures = self.failures.lock().unwrap();
            match failures.get(url).copied() {
                Some(at) if at >= start && at < data.len() as u64 => {
                    failures.remove(url);
                    Some((at - start) as usize)
                }
                _ => None,
            }
        };

        Ok(RangedBody {
            offset: start,
            reader: Box::new(MemoryReader {
                data: data[start as usize..].to_vec(),
                pos: 0,
                fail_at,
            }),
        })
    }

    async fn fetch_text(&self, url: &str) -> Result<String> {
        self.texts
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| Self::not_found(url))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

struct MemoryReader {
    data: Vec<u8>,
    pos: usize,
    fail_at: Option<usize>,
}

impl AsyncRead for MemoryReader {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let this = self.get_mut();
        if this.fail_at.is_some_and(|at| this.pos >= at) {
            return Poll::Ready(Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "injected failure",
            )));
        }
        let end = this.fail_at.unwrap_or(this.data.len());
        let n = (end - this.pos).min(buf.remaining());
        buf.put_slice(&this.data[this.pos..this.pos + n]);
        this.pos += n;
        Poll::Ready(Ok(()))
    }
}

/// Records relaunch requests instead of spawning anything
#[derive(Default)]
pub(crate) struct RecordingRelauncher {
    launched: Mutex<Vec<PathBuf>>,
}

impl RecordingRelauncher {
    pub(crate) fn launched(&self) -> Vec<PathBuf> {
        self.launched.lock().unwrap().clone()
    }
}

impl Relauncher for RecordingRelauncher {
    fn relaunch(&self, executable: &Path) -> Result<()> {
        self.launched
            .lock()
            .unwrap()
            .push(executable.to_path_buf());
        Ok(())
    }
}

/// An updater wired to in-memory collaborators, plus everything tests inspect
pub(crate) struct Harness {
    pub(crate) updater: Updater,
    pub(crate) source: Arc<MemorySource>,
    pub(crate) relauncher: Arc<RecordingRelauncher>,
    pub(crate) events: Arc<Mutex<Vec<Event>>>,
}

impl Harness {
    /// Recorded events, without the chatty download progress
    pub(crate) fn milestones(&self) -> Vec<Event> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| !matches!(e, Event::DownloadProgress { .. }))
            .cloned()
            .collect()
    }

    pub(crate) fn all_events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub(crate) fn clear_events(&self) {
        self.events.lock().unwrap().clear();
    }
}

/// Config rooted at `app_root`: 16-byte chunks, executable `app`, installed `1.0`
pub(crate) fn test_config(app_root: &Path) -> UpdaterConfig {
    let mut config = UpdaterConfig::default();
    config.paths.app_root = app_root.to_path_buf();
    config.paths.executable = Some(PathBuf::from("app"));
    config.download.chunk_size = 16;
    config.initial_version = Some(Version::parse("1.0").unwrap());
    config
}

/// Build an updater over `source` in `app_root`
pub(crate) async fn create_test_updater(app_root: &Path, source: Arc<MemorySource>) -> Harness {
    create_test_updater_with(test_config(app_root), source).await
}

pub(crate) async fn create_test_updater_with(
    config: UpdaterConfig,
    source: Arc<MemorySource>,
) -> Harness {
    let relauncher = Arc::new(RecordingRelauncher::default());
    let components = UpdaterComponents {
        source: source.clone(),
        decoder: Arc::new(JsonManifestDecoder),
        relauncher: relauncher.clone(),
    };
    let updater = Updater::with_components(config, components).await.unwrap();

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    updater.add_observer(move |event: &Event| sink.lock().unwrap().push(event.clone()));

    Harness {
        updater,
        source,
        relauncher,
        events,
    }
}

/// URL of the published manifest for `version`
pub(crate) fn manifest_url(version: &str) -> String {
    format!("{HOST}/{version}/patch_info.json")
}

/// URL of a published file
pub(crate) fn file_url(version: &str, path: &str) -> String {
    format!("{HOST}/{version}/files/{path}")
}

/// Publish one version: its manifest and file bodies
pub(crate) fn publish(
    source: &MemorySource,
    version: &str,
    files: &[(&str, Vec<u8>)],
    previous: Option<&str>,
) {
    let names: Vec<&str> = files.iter().map(|(name, _)| *name).collect();
    let previous_url = previous.map(manifest_url);
    source.add_text(
        &manifest_url(version),
        manifest_json(
            version,
            &format!("{HOST}/{version}/files/"),
            &names,
            previous_url.as_deref(),
        ),
    );
    for (name, bytes) in files {
        source.add_file(&file_url(version, name), bytes.clone());
    }
}

/// Publish the version pointer naming `latest`
pub(crate) fn publish_pointer(source: &MemorySource, latest: &str) -> String {
    let url = format!("{HOST}/patch_version.json");
    source.add_text(
        &url,
        serde_json::json!({
            "LastestVersion": latest,
            "PatchUrl": manifest_url(latest),
        })
        .to_string(),
    );
    url
}

/// Standard chain used across tests
///
/// - `1.0`: `x.txt` (already installed)
/// - `1.1`: `a.txt`, `b.txt`
/// - `1.2`: `app`, `b.txt`
///
/// Resolved from `1.0` this plans `1.1: {a.txt}` and `1.2: {app, b.txt}`.
pub(crate) fn publish_standard_chain(source: &MemorySource) -> String {
    publish(source, "1.0", &[("x.txt", payload(8))], None);
    publish(
        source,
        "1.1",
        &[("a.txt", payload(40)), ("b.txt", vec![1u8; 10])],
        Some("1.0"),
    );
    publish(
        source,
        "1.2",
        &[("app", payload(50)), ("b.txt", payload(33))],
        Some("1.1"),
    );
    publish_pointer(source, "1.2")
}
