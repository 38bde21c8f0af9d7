//! Pause and read-only progress.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use super::{RunState, Updater};

impl Updater {
    /// Ask the running update to pause
    ///
    /// No-op unless an update is running. The file currently transferring stops
    /// at its next chunk boundary; an install that already started always
    /// completes. [`start_update`](Self::start_update) then returns
    /// [`UpdateOutcome::Paused`](crate::UpdateOutcome::Paused).
    pub fn pause_update(&self) {
        pause(&self.run);
    }

    /// A cloneable handle for pausing and observing the update from elsewhere
    pub fn control(&self) -> UpdateControl {
        UpdateControl {
            run: Arc::clone(&self.run),
        }
    }
}

fn pause(run: &RunState) {
    if !run.updating.load(Ordering::SeqCst) {
        return;
    }
    run.paused.store(true, Ordering::SeqCst);
    if let Some(handle) = run
        .current_file
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .as_ref()
    {
        handle.pause();
    }
    tracing::debug!("pause requested");
}

/// Pause and progress access that can be moved into other tasks
///
/// Unlike [`Updater`], holding an `UpdateControl` gives no access to the plan.
#[derive(Clone)]
pub struct UpdateControl {
    run: Arc<RunState>,
}

impl UpdateControl {
    /// See [`Updater::pause_update`]
    pub fn pause(&self) {
        pause(&self.run);
    }

    /// Whether an update is running
    pub fn is_updating(&self) -> bool {
        self.run.updating.load(Ordering::SeqCst)
    }

    /// Whether a pause was requested
    pub fn is_paused(&self) -> bool {
        self.run.paused.load(Ordering::SeqCst)
    }

    /// `(files installed, files planned)`
    pub fn progress(&self) -> (usize, usize) {
        (
            self.run.files_installed.load(Ordering::SeqCst),
            self.run.files_total.load(Ordering::SeqCst),
        )
    }
}

impl std::fmt::Debug for UpdateControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (installed, total) = self.progress();
        f.debug_struct("UpdateControl")
            .field("updating", &self.is_updating())
            .field("paused", &self.is_paused())
            .field("installed", &installed)
            .field("total", &total)
            .finish()
    }
}
