//! Batch-by-batch download and install.

use crate::error::Result;
use crate::file::DownloadOutcome;
use crate::manifest::UpdatePlan;
use crate::manifest::resolver::normalize_path;
use crate::state::{ProgressCache, installed_version};
use crate::types::{Event, UpdateOutcome};
use crate::version::Version;
use std::sync::atomic::Ordering;

use super::{RunState, Updater};

/// Clears the updating flag when a run ends, however it ends
struct RunGuard<'a>(&'a RunState);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.set_current_file(None);
        self.0.updating.store(false, Ordering::SeqCst);
    }
}

/// How a batch or a single file step ended
enum Step {
    Done,
    Paused,
}

impl Updater {
    /// Download and install every planned file, lowest version first
    ///
    /// Files are handled one at a time: ready → download → install → progress
    /// persisted. After each batch the installed version is recorded. The
    /// running executable is held back until every other file of every batch
    /// is installed; from its batch onward the version record and
    /// [`Event::PatchCompleted`] wait for it. The application is then relaunched.
    ///
    /// Returns [`UpdateOutcome::Paused`] if [`pause_update`](Self::pause_update)
    /// was called; calling again continues with the same file. A transfer or
    /// install error is returned as-is and leaves the plan in place, so calling
    /// again retries from the failed file.
    pub async fn start_update(&self) -> Result<UpdateOutcome> {
        if self
            .run
            .updating
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Ok(UpdateOutcome::AlreadyRunning);
        }
        let _guard = RunGuard(&self.run);
        self.run.paused.store(false, Ordering::SeqCst);

        let mut slot = self.plan.lock().await;
        let plan = match slot.as_mut() {
            Some(plan) if !plan.is_empty() => plan,
            _ => return Ok(UpdateOutcome::UpToDate),
        };

        let executable = self.executable_key();
        let held_executable = executable
            .as_ref()
            .and_then(|exe| plan.owner(exe).map(|version| (version.clone(), exe.clone())));

        // Snapshot versions; batches are removed from the plan as they complete
        for version in plan.versions() {
            if let Step::Paused = self
                .run_batch(plan, &version, executable.as_deref())
                .await?
            {
                tracing::info!(%version, "update paused");
                return Ok(UpdateOutcome::Paused);
            }

            match &held_executable {
                Some((exe_version, _)) if *exe_version <= version => {
                    tracing::debug!(%version, "batch done, waiting for executable");
                    plan.hold(version);
                    // The cache follows the lowest unrecorded batch
                    if let Some(batch) = plan.batch(exe_version) {
                        ProgressCache::new(exe_version.clone(), batch.files())
                            .save(&self.config.progress_cache_path())
                            .await?;
                    }
                }
                _ => self.complete_patch(version).await?,
            }
        }

        if let Some((exe_version, exe_path)) = held_executable {
            if let Step::Paused = self
                .run_file(plan, &exe_version, &exe_path, true)
                .await?
            {
                tracing::info!(version = %exe_version, "update paused");
                return Ok(UpdateOutcome::Paused);
            }
            plan.mark_executable_replaced();
        }
        while let Some(version) = plan.first_held() {
            self.complete_patch(version.clone()).await?;
            plan.release(&version);
        }
        let executable_replaced = plan.executable_replaced();

        *slot = None;
        drop(slot);
        self.finish(executable_replaced).await
    }

    /// Install every file of a batch except `held_back`
    async fn run_batch(
        &self,
        plan: &mut UpdatePlan,
        version: &Version,
        held_back: Option<&str>,
    ) -> Result<Step> {
        let order = match plan.batch(version) {
            Some(batch) => batch.install_order(held_back),
            None => return Ok(Step::Done),
        };

        for path in order {
            if let Step::Paused = self.run_file(plan, version, &path, false).await? {
                return Ok(Step::Paused);
            }
        }

        Ok(Step::Done)
    }

    /// Download and install one file, then persist what is left of its batch
    async fn run_file(
        &self,
        plan: &mut UpdatePlan,
        version: &Version,
        path: &str,
        executable: bool,
    ) -> Result<Step> {
        if self.is_paused() {
            return Ok(Step::Paused);
        }
        let Some(file) = plan.batch_mut(version).and_then(|b| b.get_mut(path)) else {
            return Ok(Step::Done);
        };

        self.emit(Event::ReadyToDownload {
            path: path.to_string(),
        });

        let handle = file.pause_handle();
        self.run.set_current_file(Some(handle.clone()));

        let events = self.events.clone();
        let run = self.run.clone();
        let progress_path = path.to_string();
        let mut on_progress = move |bytes_received: u64, bytes_total: u64| {
            events.emit(Event::DownloadProgress {
                path: progress_path.clone(),
                bytes_received,
                bytes_total,
            });
            // A pause that raced with the transfer starting is picked up here
            if run.paused.load(Ordering::SeqCst) {
                handle.pause();
            }
        };

        let outcome = file
            .start_download(
                self.components.source.as_ref(),
                self.config.download.chunk_size,
                &mut on_progress,
            )
            .await;
        self.run.set_current_file(None);

        if outcome? == DownloadOutcome::Paused {
            return Ok(Step::Paused);
        }

        let app_root = self.config.app_root();
        if executable {
            file.install_executable(app_root).await?;
        } else {
            file.install(app_root).await?;
        }

        plan.remove_file(version, path);
        if let Some(batch) = plan.batch(version) {
            ProgressCache::new(version.clone(), batch.files())
                .save(&self.config.progress_cache_path())
                .await?;
        }

        let files_installed = self.run.files_installed.fetch_add(1, Ordering::SeqCst) + 1;
        let files_total = self.run.files_total.load(Ordering::SeqCst);
        self.emit(Event::FileInstalled {
            path: path.to_string(),
        });
        self.emit(Event::UpdateProgress {
            files_installed,
            files_total,
        });

        Ok(Step::Done)
    }

    /// Record `version` as installed once all of its files are in place
    async fn complete_patch(&self, version: Version) -> Result<()> {
        installed_version::save(&self.config.installed_version_path(), &version).await?;
        ProgressCache::delete(&self.config.progress_cache_path()).await?;
        self.set_installed_version(version.clone());
        tracing::info!(%version, "patch applied");
        self.emit(Event::PatchCompleted { version });
        Ok(())
    }

    async fn finish(&self, executable_replaced: bool) -> Result<UpdateOutcome> {
        ProgressCache::delete(&self.config.progress_cache_path()).await?;

        if self.config.download.cleanup_download_dir {
            let download_dir = self.config.download_dir();
            match tokio::fs::remove_dir_all(&download_dir).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(
                        path = %download_dir.display(),
                        error = %e,
                        "failed to remove download directory"
                    );
                }
            }
        }

        tracing::info!(version = %self.installed_version(), "update completed");
        self.emit(Event::UpdateCompleted);

        if !executable_replaced {
            return Ok(UpdateOutcome::Completed);
        }

        self.emit(Event::ApplicationRestartRequested);
        if let Some(executable) = &self.config.paths.executable {
            let path = self.config.app_root().join(executable);
            self.components.relauncher.relaunch(&path)?;
        }
        Ok(UpdateOutcome::Restarted)
    }

    /// The executable's path in manifest form, if configured
    fn executable_key(&self) -> Option<String> {
        let executable = self.config.paths.executable.as_ref()?;
        normalize_path(&executable.to_string_lossy()).ok()
    }
}
