//! Plan resolution and reconciliation with an interrupted run.

use crate::error::{Error, Result};
use crate::manifest::{UpdatePlan, resolve};
use crate::state::ProgressCache;
use crate::types::{UpdateCheck, UpdateSummary};
use std::sync::atomic::Ordering;

use super::Updater;

impl Updater {
    /// Resolve the patch chain and prepare the plan for [`start_update`](Self::start_update)
    ///
    /// When a progress cache from an interrupted run matches the first batch,
    /// files it no longer lists are treated as installed and the rest continue
    /// from their cached download paths.
    ///
    /// # Errors
    ///
    /// - [`Error::UpdateInProgress`] while `start_update` is running
    /// - [`Error::UnsupportedVersion`] when the chain does not reach the
    ///   installed version and `allow_stale_target` is false
    /// - transfer and decode errors from walking the chain
    pub async fn initialize_update(
        &self,
        check: &UpdateCheck,
        allow_stale_target: bool,
    ) -> Result<UpdateSummary> {
        if self.is_updating() {
            return Err(Error::UpdateInProgress);
        }
        let mut slot = self.plan.try_lock().map_err(|_| Error::UpdateInProgress)?;

        let installed = self.installed_version();
        let mut plan = resolve(
            self.components.source.as_ref(),
            self.components.decoder.as_ref(),
            &check.chain_entry_url,
            &installed,
            allow_stale_target,
            &self.config.download_dir(),
        )
        .await?;

        let resumed = self.reconcile(&mut plan).await?;

        self.run.files_installed.store(0, Ordering::SeqCst);
        self.run.files_total.store(plan.files_total(), Ordering::SeqCst);
        self.run.paused.store(false, Ordering::SeqCst);

        let summary = UpdateSummary {
            versions: plan.versions(),
            files_total: plan.files_total(),
            resumed,
        };
        tracing::info!(
            target_version = %check.latest_version,
            versions = summary.versions.len(),
            files = summary.files_total,
            resumed,
            "update initialized"
        );

        *slot = Some(plan);
        Ok(summary)
    }

    /// Apply a matching progress cache to the head batch
    ///
    /// Returns whether a cache was applied. A cache for any other version is
    /// stale and ignored; an unreadable one is ignored too, since partial
    /// downloads are rediscovered from their paths anyway.
    async fn reconcile(&self, plan: &mut UpdatePlan) -> Result<bool> {
        let cache_path = self.config.progress_cache_path();
        let cache = match ProgressCache::load(&cache_path).await {
            Ok(Some(cache)) => cache,
            Ok(None) => return Ok(false),
            Err(Error::CorruptState { path, reason }) => {
                tracing::warn!(path = %path.display(), %reason, "ignoring unreadable progress cache");
                return Ok(false);
            }
            Err(e) => return Err(e),
        };

        let Some(head) = plan.head() else {
            return Ok(false);
        };
        if *head.version() != cache.version {
            tracing::debug!(
                cached = %cache.version,
                head = %head.version(),
                "progress cache belongs to another version, ignoring"
            );
            return Ok(false);
        }

        let version = cache.version.clone();
        let mut already_installed = 0usize;
        for path in head.install_order(None) {
            match cache.get(&path) {
                None => {
                    plan.remove_file(&version, &path);
                    already_installed += 1;
                }
                Some(cached) => {
                    if let Some(file) = plan.batch_mut(&version).and_then(|b| b.get_mut(&path)) {
                        file.relocate(cached.download_path.clone()).await?;
                    }
                }
            }
        }

        tracing::info!(
            %version,
            already_installed,
            remaining = plan.batch(&version).map_or(0, |b| b.len()),
            "resuming interrupted batch"
        );
        Ok(true)
    }
}
