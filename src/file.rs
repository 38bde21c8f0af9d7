//! Resumable, pausable file transfer with atomic install
//!
//! A [`ResumableFile`] moves through
//! `Pending → Downloading ⇄ Paused → Downloaded → Installed`.
//!
//! Bytes are appended to a stable download path, so a session that was paused
//! or killed is rediscovered from the on-disk length. Pause is only observed
//! between chunks: a chunk write and its byte-count update always happen
//! together.

use crate::error::{Error, InstallError, Result, TransferError};
use crate::transfer::TransferSource;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Suffix of the backup kept while an existing file is being replaced
const BACKUP_SUFFIX: &str = ".temp.bkp";

/// Suffix of the previous executable after a self-replace
const ASIDE_SUFFIX: &str = ".old";

/// Lifecycle state of a [`ResumableFile`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileState {
    /// Nothing downloaded yet
    Pending,
    /// A transfer is running
    Downloading,
    /// Some bytes are on disk; the transfer can be resumed
    Paused,
    /// Every byte is on disk; ready to install
    Downloaded,
    /// Moved into its install destination
    Installed,
}

/// How a call to [`ResumableFile::start_download`] ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// Every byte is on disk
    Completed,
    /// A pause was observed between chunks
    Paused,
}

/// Shared pause flag
///
/// Cloned handles observe the same flag, so a pause requested from another
/// task is seen at the next chunk boundary.
#[derive(Clone, Debug, Default)]
pub struct PauseHandle(Arc<AtomicBool>);

impl PauseHandle {
    /// Request a pause
    pub fn pause(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether a pause has been requested
    pub fn is_paused(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub(crate) fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// One downloadable, installable file
#[derive(Debug)]
pub struct ResumableFile {
    full_path: String,
    url: String,
    download_path: PathBuf,
    bytes_received: u64,
    bytes_total: Option<u64>,
    state: FileState,
    pause: PauseHandle,
}

impl ResumableFile {
    /// Track a file, seeding progress from any bytes already at `download_path`
    ///
    /// A non-empty download file is evidence of an interrupted session, so the
    /// file starts out [`FileState::Paused`].
    pub async fn open(
        full_path: impl Into<String>,
        url: impl Into<String>,
        download_path: impl Into<PathBuf>,
    ) -> Result<Self> {
        let download_path = download_path.into();
        let bytes_received = on_disk_len(&download_path).await?;

        Ok(Self {
            full_path: full_path.into(),
            url: url.into(),
            download_path,
            bytes_received,
            bytes_total: None,
            state: if bytes_received > 0 {
                FileState::Paused
            } else {
                FileState::Pending
            },
            pause: PauseHandle::default(),
        })
    }

    #[cfg(test)]
    pub(crate) fn detached(
        full_path: impl Into<String>,
        url: impl Into<String>,
        download_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            full_path: full_path.into(),
            url: url.into(),
            download_path: download_path.into(),
            bytes_received: 0,
            bytes_total: None,
            state: FileState::Pending,
            pause: PauseHandle::default(),
        }
    }

    /// Install destination relative to the app root
    pub fn full_path(&self) -> &str {
        &self.full_path
    }

    /// Source URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Where bytes are written while downloading
    pub fn download_path(&self) -> &Path {
        &self.download_path
    }

    /// Bytes on disk
    pub fn bytes_received(&self) -> u64 {
        self.bytes_received
    }

    /// Remote length, once known
    pub fn bytes_total(&self) -> Option<u64> {
        self.bytes_total
    }

    /// Current lifecycle state
    pub fn state(&self) -> FileState {
        self.state
    }

    /// Point the file at a different download path and re-seed progress from it
    pub(crate) async fn relocate(&mut self, download_path: PathBuf) -> Result<()> {
        if download_path == self.download_path {
            return Ok(());
        }
        self.bytes_received = on_disk_len(&download_path).await?;
        self.download_path = download_path;
        self.bytes_total = None;
        self.state = if self.bytes_received > 0 {
            FileState::Paused
        } else {
            FileState::Pending
        };
        Ok(())
    }

    /// A handle that can pause this file's transfer from elsewhere
    pub fn pause_handle(&self) -> PauseHandle {
        self.pause.clone()
    }

    /// Request a pause; observed at the next chunk boundary
    pub fn pause_download(&self) {
        self.pause.pause();
    }

    /// Start or resume the transfer
    ///
    /// Appends bytes from `bytes_received` onward, reading at most
    /// `chunk_size` bytes at a time and calling `on_progress(received, total)`
    /// after each chunk. Returns [`DownloadOutcome::Paused`] when a pause is
    /// observed; calling again continues from the same offset.
    pub async fn start_download(
        &mut self,
        source: &dyn TransferSource,
        chunk_size: usize,
        on_progress: &mut (dyn FnMut(u64, u64) + Send),
    ) -> Result<DownloadOutcome> {
        self.pause.clear();
        self.state = FileState::Downloading;

        let result = self.transfer(source, chunk_size.max(1), on_progress).await;

        match &result {
            Ok(DownloadOutcome::Completed) => self.state = FileState::Downloaded,
            Ok(DownloadOutcome::Paused) => self.state = FileState::Paused,
            Err(_) => {
                // Trust the disk over the counter after a failed write
                if let Ok(len) = on_disk_len(&self.download_path).await {
                    self.bytes_received = len;
                }
                self.state = if self.bytes_received > 0 {
                    FileState::Paused
                } else {
                    FileState::Pending
                };
            }
        }

        result
    }

    async fn transfer(
        &mut self,
        source: &dyn TransferSource,
        chunk_size: usize,
        on_progress: &mut (dyn FnMut(u64, u64) + Send),
    ) -> Result<DownloadOutcome> {
        let total = source.head_length(&self.url).await?;
        self.bytes_total = Some(total);

        if let Some(parent) = self.download_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.write_failed(e))?;
        }

        // Opened before the completeness check so an empty remote file still exists on disk
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.download_path)
            .await
            .map_err(|e| self.write_failed(e))?;

        if self.bytes_received == total {
            tracing::debug!(path = %self.full_path, bytes = total, "download already complete");
            on_progress(total, total);
            return Ok(DownloadOutcome::Completed);
        }

        if self.bytes_received > total {
            tracing::warn!(
                path = %self.full_path,
                on_disk = self.bytes_received,
                remote = total,
                "partial download is longer than the remote file, restarting"
            );
            file.set_len(0).await.map_err(|e| self.write_failed(e))?;
            self.bytes_received = 0;
        }

        let mut body = source.ranged_read(&self.url, self.bytes_received).await?;

        if body.offset != self.bytes_received {
            if body.offset > self.bytes_received {
                return Err(TransferError::RequestFailed {
                    url: self.url.clone(),
                    reason: format!(
                        "source resumed at byte {} but only {} bytes are on disk",
                        body.offset, self.bytes_received
                    ),
                }
                .into());
            }
            file.set_len(body.offset)
                .await
                .map_err(|e| self.write_failed(e))?;
            self.bytes_received = body.offset;
        }

        tracing::debug!(
            path = %self.full_path,
            from = self.bytes_received,
            total,
            "downloading"
        );

        let mut buffer = vec![0u8; chunk_size];
        let outcome = loop {
            if self.pause.is_paused() {
                break Ok(DownloadOutcome::Paused);
            }

            let read = match body.reader.read(&mut buffer).await {
                Ok(n) => n,
                Err(e) => {
                    break Err(TransferError::StreamFailed {
                        url: self.url.clone(),
                        bytes_received: self.bytes_received,
                        reason: e.to_string(),
                    }
                    .into());
                }
            };

            if read == 0 {
                if self.bytes_received < total {
                    break Err(TransferError::StreamFailed {
                        url: self.url.clone(),
                        bytes_received: self.bytes_received,
                        reason: format!("stream ended {} bytes early", total - self.bytes_received),
                    }
                    .into());
                }
                break Ok(DownloadOutcome::Completed);
            }

            if let Err(e) = file.write_all(&buffer[..read]).await {
                break Err(self.write_failed(e));
            }
            self.bytes_received += read as u64;
            on_progress(self.bytes_received, total);
        };

        // Flush on every exit so the on-disk length matches bytes_received
        file.flush().await.map_err(|e| self.write_failed(e))?;

        if matches!(outcome, Ok(DownloadOutcome::Paused)) {
            tracing::debug!(path = %self.full_path, bytes = self.bytes_received, "download paused");
        }
        outcome
    }

    fn write_failed(&self, source: std::io::Error) -> Error {
        TransferError::WriteFailed {
            path: self.download_path.clone(),
            source,
        }
        .into()
    }

    /// Move the downloaded file into `app_root/full_path`
    ///
    /// No-op (returns `false`) unless the file is [`FileState::Downloaded`].
    /// An existing destination is renamed to a sibling backup first and the
    /// backup is erased once the new file is in place, so at most one of
    /// {original, backup} is ever missing. Re-running after a crash between the
    /// renames converges to the same end state.
    pub async fn install(&mut self, app_root: &Path) -> Result<bool> {
        if self.state != FileState::Downloaded {
            return Ok(false);
        }

        let dest = app_root.join(&self.full_path);
        ensure_parent(&dest).await?;

        let backup = sibling_with_suffix(&dest, BACKUP_SUFFIX);
        if exists(&dest).await {
            remove_if_exists(&backup).await?;
            rename(&dest, &backup).await?;
        }
        rename(&self.download_path, &dest).await?;
        remove_if_exists(&backup).await?;

        self.state = FileState::Installed;
        tracing::debug!(path = %self.full_path, "installed");
        Ok(true)
    }

    /// Replace the running executable at `app_root/full_path`
    ///
    /// A running executable cannot be overwritten in place, but it can be
    /// renamed. The current binary is moved aside to `<name>.old` (erasing any
    /// stale aside file first) and the download is moved into its place.
    pub async fn install_executable(&mut self, app_root: &Path) -> Result<bool> {
        if self.state != FileState::Downloaded {
            return Ok(false);
        }

        let exe = app_root.join(&self.full_path);
        ensure_parent(&exe).await?;

        let aside = sibling_with_suffix(&exe, ASIDE_SUFFIX);
        remove_if_exists(&aside).await?;
        if exists(&exe).await {
            rename(&exe, &aside).await?;
        }
        rename(&self.download_path, &exe).await?;
        mark_executable(&exe).await?;

        self.state = FileState::Installed;
        tracing::info!(path = %self.full_path, "executable replaced");
        Ok(true)
    }
}

/// `<path><suffix>` next to `path`
pub(crate) fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

async fn on_disk_len(path: &Path) -> Result<u64> {
    match tokio::fs::metadata(path).await {
        Ok(meta) => Ok(meta.len()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
        Err(e) => Err(Error::Io(e)),
    }
}

async fn exists(path: &Path) -> bool {
    tokio::fs::symlink_metadata(path).await.is_ok()
}

async fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| InstallError::CreateDirFailed {
                path: parent.to_path_buf(),
                source,
            })?;
    }
    Ok(())
}

async fn rename(from: &Path, to: &Path) -> Result<()> {
    tokio::fs::rename(from, to)
        .await
        .map_err(|source| InstallError::MoveFailed {
            source_path: from.to_path_buf(),
            dest_path: to.to_path_buf(),
            source,
        })?;
    Ok(())
}

async fn remove_if_exists(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(InstallError::RemoveFailed {
            path: path.to_path_buf(),
            source,
        }
        .into()),
    }
}

#[cfg(unix)]
async fn mark_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let permissions_failed = |source| InstallError::PermissionsFailed {
        path: path.to_path_buf(),
        source,
    };
    let mut permissions = tokio::fs::metadata(path)
        .await
        .map_err(permissions_failed)?
        .permissions();
    permissions.set_mode(permissions.mode() | 0o755);
    tokio::fs::set_permissions(path, permissions)
        .await
        .map_err(permissions_failed)?;
    Ok(())
}

#[cfg(not(unix))]
async fn mark_executable(_path: &Path) -> Result<()> {
    Ok(())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::updater::test_helpers::{MemorySource, payload};
    use tempfile::tempdir;

    const URL: &str = "http://host/1.1/data.pak";

    async fn tracked(dir: &Path) -> ResumableFile {
        ResumableFile::open("data.pak", URL, dir.join("temp/1.1/data.pak"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn open_without_partial_is_pending() {
        let dir = tempdir().unwrap();
        let file = tracked(dir.path()).await;

        assert_eq!(file.state(), FileState::Pending);
        assert_eq!(file.bytes_received(), 0);
        assert!(!file.download_path().exists());
    }

    #[tokio::test]
    async fn open_seeds_progress_from_partial_download() {
        let dir = tempdir().unwrap();
        let partial = dir.path().join("temp/1.1/data.pak");
        std::fs::create_dir_all(partial.parent().unwrap()).unwrap();
        std::fs::write(&partial, &payload(100)[..40]).unwrap();

        let file = tracked(dir.path()).await;

        assert_eq!(file.state(), FileState::Paused);
        assert_eq!(file.bytes_received(), 40);
    }

    #[tokio::test]
    async fn downloads_whole_file_in_chunks() {
        let dir = tempdir().unwrap();
        let source = MemorySource::default();
        source.add_file(URL, payload(100));

        let mut file = tracked(dir.path()).await;
        let mut reports = Vec::new();
        let outcome = file
            .start_download(&source, 32, &mut |received, total| {
                reports.push((received, total))
            })
            .await
            .unwrap();

        assert_eq!(outcome, DownloadOutcome::Completed);
        assert_eq!(file.state(), FileState::Downloaded);
        assert_eq!(std::fs::read(file.download_path()).unwrap(), payload(100));
        assert_eq!(reports, vec![(32, 100), (64, 100), (96, 100), (100, 100)]);
    }

    #[tokio::test]
    async fn empty_remote_file_is_created_and_installable() {
        let dir = tempdir().unwrap();
        let source = MemorySource::default();
        source.add_file(URL, Vec::new());

        let mut file = tracked(dir.path()).await;
        let outcome = file.start_download(&source, 32, &mut |_, _| {}).await.unwrap();

        assert_eq!(outcome, DownloadOutcome::Completed);
        assert!(file.download_path().exists());
        assert!(file.install(dir.path()).await.unwrap());
        assert_eq!(std::fs::read(dir.path().join("data.pak")).unwrap(), b"");
    }

    #[tokio::test]
    async fn resumes_partial_download_from_offset() {
        let dir = tempdir().unwrap();
        let partial = dir.path().join("temp/1.1/data.pak");
        std::fs::create_dir_all(partial.parent().unwrap()).unwrap();
        std::fs::write(&partial, &payload(100)[..30]).unwrap();

        let source = MemorySource::default();
        source.add_file(URL, payload(100));

        let mut file = tracked(dir.path()).await;
        file.start_download(&source, 16, &mut |_, _| {}).await.unwrap();

        assert_eq!(std::fs::read(&partial).unwrap(), payload(100));
        assert_eq!(source.ranged_reads(), vec![(URL.to_string(), 30)]);
    }

    #[tokio::test]
    async fn pause_and_resume_cycles_produce_exact_bytes() {
        let dir = tempdir().unwrap();
        let partial = dir.path().join("temp/1.1/data.pak");
        std::fs::create_dir_all(partial.parent().unwrap()).unwrap();
        std::fs::write(&partial, &payload(1000)[..123]).unwrap();

        let source = MemorySource::default();
        source.add_file(URL, payload(1000));

        let mut file = tracked(dir.path()).await;
        let handle = file.pause_handle();
        let mut sessions = 0;

        loop {
            sessions += 1;
            let start = file.bytes_received();
            let pause = handle.clone();
            let outcome = file
                .start_download(&source, 50, &mut |received, _| {
                    // Pause after roughly two chunks of every session
                    if received >= start + 100 {
                        pause.pause();
                    }
                })
                .await
                .unwrap();

            assert_eq!(
                std::fs::metadata(&partial).unwrap().len(),
                file.bytes_received(),
                "on-disk length must match the counter after every session"
            );

            if outcome == DownloadOutcome::Completed {
                break;
            }
            assert_eq!(file.state(), FileState::Paused);
        }

        assert!(sessions > 3, "expected several pause/resume cycles");
        assert_eq!(std::fs::read(&partial).unwrap(), payload(1000));
    }

    #[tokio::test]
    async fn pause_requested_before_first_chunk_writes_nothing() {
        let dir = tempdir().unwrap();
        let source = MemorySource::default();
        source.add_file(URL, payload(64));

        let mut file = tracked(dir.path()).await;
        let handle = file.pause_handle();
        // start_download clears stale pauses, so pause from the first progress report
        let outcome = file
            .start_download(&source, 16, &mut |_, _| handle.pause())
            .await
            .unwrap();

        assert_eq!(outcome, DownloadOutcome::Paused);
        assert_eq!(file.bytes_received(), 16);
    }

    #[tokio::test]
    async fn already_complete_download_skips_transfer() {
        let dir = tempdir().unwrap();
        let partial = dir.path().join("temp/1.1/data.pak");
        std::fs::create_dir_all(partial.parent().unwrap()).unwrap();
        std::fs::write(&partial, payload(50)).unwrap();

        let source = MemorySource::default();
        source.add_file(URL, payload(50));

        let mut file = tracked(dir.path()).await;
        let mut reports = Vec::new();
        let outcome = file
            .start_download(&source, 16, &mut |r, t| reports.push((r, t)))
            .await
            .unwrap();

        assert_eq!(outcome, DownloadOutcome::Completed);
        assert_eq!(file.state(), FileState::Downloaded);
        assert!(source.ranged_reads().is_empty());
        assert_eq!(reports, vec![(50, 50)]);
    }

    #[tokio::test]
    async fn oversized_partial_restarts_from_zero() {
        let dir = tempdir().unwrap();
        let partial = dir.path().join("temp/1.1/data.pak");
        std::fs::create_dir_all(partial.parent().unwrap()).unwrap();
        std::fs::write(&partial, vec![9u8; 80]).unwrap();

        let source = MemorySource::default();
        source.add_file(URL, payload(50));

        let mut file = tracked(dir.path()).await;
        file.start_download(&source, 16, &mut |_, _| {}).await.unwrap();

        assert_eq!(std::fs::read(&partial).unwrap(), payload(50));
        assert_eq!(source.ranged_reads(), vec![(URL.to_string(), 0)]);
    }

    #[tokio::test]
    async fn ignored_range_discards_partial_bytes() {
        let dir = tempdir().unwrap();
        let partial = dir.path().join("temp/1.1/data.pak");
        std::fs::create_dir_all(partial.parent().unwrap()).unwrap();
        std::fs::write(&partial, &payload(60)[..20]).unwrap();

        let source = MemorySource::default();
        source.add_file(URL, payload(60));
        source.ignore_range(URL);

        let mut file = tracked(dir.path()).await;
        file.start_download(&source, 16, &mut |_, _| {}).await.unwrap();

        assert_eq!(std::fs::read(&partial).unwrap(), payload(60));
    }

    #[tokio::test]
    async fn stream_failure_keeps_received_bytes_for_resume() {
        let dir = tempdir().unwrap();
        let source = MemorySource::default();
        source.add_file(URL, payload(100));
        source.fail_once_at(URL, 45);

        let mut file = tracked(dir.path()).await;
        let err = file
            .start_download(&source, 10, &mut |_, _| {})
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Transfer(TransferError::StreamFailed { .. })
        ));
        assert_eq!(file.state(), FileState::Paused);
        assert_eq!(file.bytes_received(), 45);
        assert_eq!(std::fs::metadata(file.download_path()).unwrap().len(), 45);

        // Retry resumes exactly where the failure left off
        file.start_download(&source, 10, &mut |_, _| {}).await.unwrap();
        assert_eq!(std::fs::read(file.download_path()).unwrap(), payload(100));
        assert_eq!(
            source.ranged_reads(),
            vec![(URL.to_string(), 0), (URL.to_string(), 45)]
        );
    }

    #[tokio::test]
    async fn missing_remote_file_is_transfer_error() {
        let dir = tempdir().unwrap();
        let source = MemorySource::default();

        let mut file = tracked(dir.path()).await;
        let err = file
            .start_download(&source, 10, &mut |_, _| {})
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Transfer(TransferError::BadStatus { status: 404, .. })));
        assert_eq!(file.state(), FileState::Pending);
    }

    #[tokio::test]
    async fn install_is_noop_until_downloaded() {
        let dir = tempdir().unwrap();
        let mut file = tracked(dir.path()).await;

        assert!(!file.install(dir.path()).await.unwrap());
        assert!(!dir.path().join("data.pak").exists());
    }

    #[tokio::test]
    async fn install_replaces_existing_file_without_leftover_backup() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("data.pak"), b"old").unwrap();

        let source = MemorySource::default();
        source.add_file(URL, payload(20));

        let mut file = tracked(dir.path()).await;
        file.start_download(&source, 8, &mut |_, _| {}).await.unwrap();
        assert!(file.install(dir.path()).await.unwrap());

        assert_eq!(std::fs::read(dir.path().join("data.pak")).unwrap(), payload(20));
        assert!(!dir.path().join("data.pak.temp.bkp").exists());
        assert!(!file.download_path().exists());
        assert_eq!(file.state(), FileState::Installed);

        // Second install is a no-op
        assert!(!file.install(dir.path()).await.unwrap());
    }

    #[tokio::test]
    async fn install_creates_destination_directories() {
        let dir = tempdir().unwrap();
        let source = MemorySource::default();
        let url = "http://host/1.1/levels/one/map.bin";
        source.add_file(url, payload(5));

        let mut file = ResumableFile::open(
            "levels/one/map.bin",
            url,
            dir.path().join("temp/1.1/levels/one/map.bin"),
        )
        .await
        .unwrap();
        file.start_download(&source, 8, &mut |_, _| {}).await.unwrap();
        file.install(dir.path()).await.unwrap();

        assert_eq!(
            std::fs::read(dir.path().join("levels/one/map.bin")).unwrap(),
            payload(5)
        );
    }

    #[tokio::test]
    async fn install_after_crash_between_renames_converges() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("data.pak");
        let backup = dir.path().join("data.pak.temp.bkp");

        let source = MemorySource::default();
        source.add_file(URL, payload(20));

        let mut file = tracked(dir.path()).await;
        file.start_download(&source, 8, &mut |_, _| {}).await.unwrap();

        // Crash after the original was moved to the backup, before the new file moved in
        std::fs::write(&backup, b"old").unwrap();
        assert!(!dest.exists());

        // A restarted process re-seeds the file from disk and installs again
        let mut reopened = tracked(dir.path()).await;
        reopened
            .start_download(&source, 8, &mut |_, _| {})
            .await
            .unwrap();
        assert!(reopened.install(dir.path()).await.unwrap());

        assert_eq!(std::fs::read(&dest).unwrap(), payload(20));
        assert!(!backup.exists());
    }

    #[tokio::test]
    async fn install_removes_stale_backup_from_earlier_crash() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("data.pak"), b"current").unwrap();
        std::fs::write(dir.path().join("data.pak.temp.bkp"), b"ancient").unwrap();

        let source = MemorySource::default();
        source.add_file(URL, payload(3));

        let mut file = tracked(dir.path()).await;
        file.start_download(&source, 8, &mut |_, _| {}).await.unwrap();
        file.install(dir.path()).await.unwrap();

        assert_eq!(std::fs::read(dir.path().join("data.pak")).unwrap(), payload(3));
        assert!(!dir.path().join("data.pak.temp.bkp").exists());
    }

    #[tokio::test]
    async fn install_executable_moves_running_binary_aside() {
        let dir = tempdir().unwrap();
        let exe = dir.path().join("app");
        std::fs::write(&exe, b"old binary").unwrap();
        std::fs::write(dir.path().join("app.old"), b"older binary").unwrap();

        let url = "http://host/1.1/app";
        let source = MemorySource::default();
        source.add_file(url, payload(12));

        let mut file = ResumableFile::open("app", url, dir.path().join("temp/1.1/app"))
            .await
            .unwrap();
        file.start_download(&source, 8, &mut |_, _| {}).await.unwrap();
        assert!(file.install_executable(dir.path()).await.unwrap());

        assert_eq!(std::fs::read(&exe).unwrap(), payload(12));
        assert_eq!(std::fs::read(dir.path().join("app.old")).unwrap(), b"old binary");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&exe).unwrap().permissions().mode();
            assert_eq!(mode & 0o111, 0o111, "new executable must be runnable");
        }
    }

    #[test]
    fn sibling_suffix_appends_to_file_name() {
        assert_eq!(
            sibling_with_suffix(Path::new("/a/b/app.exe"), ".old"),
            PathBuf::from("/a/b/app.exe.old")
        );
    }
}
