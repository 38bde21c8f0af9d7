//! Update orchestration split into focused submodules.
//!
//! The `Updater` struct and its methods are organized by phase:
//! - [`check`] - Version pointer lookup
//! - [`initialize`] - Plan resolution and progress cache reconciliation
//! - [`run`] - Batch-by-batch download and install
//! - [`control`] - Pause and read-only progress
//! - [`relaunch`] - Restarting the replaced executable

mod check;
mod control;
mod initialize;
mod relaunch;
mod run;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use control::UpdateControl;
pub use relaunch::{ProcessRelauncher, Relauncher};

use crate::config::UpdaterConfig;
use crate::error::Result;
use crate::events::{EventBus, Observer};
use crate::file::PauseHandle;
use crate::manifest::{JsonManifestDecoder, ManifestDecoder, UpdatePlan};
use crate::state::installed_version;
use crate::transfer::{HttpTransferSource, TransferSource};
use crate::types::Event;
use crate::version::Version;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

/// Collaborators the updater delegates to
#[derive(Clone)]
pub struct UpdaterComponents {
    /// Fetches manifests and file bytes
    pub source: Arc<dyn TransferSource>,
    /// Decodes manifest documents
    pub decoder: Arc<dyn ManifestDecoder>,
    /// Starts the replaced executable
    pub relauncher: Arc<dyn Relauncher>,
}

impl UpdaterComponents {
    /// HTTP source, JSON decoder and process relauncher
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn defaults(config: &UpdaterConfig) -> Result<Self> {
        Ok(Self {
            source: Arc::new(HttpTransferSource::new(&config.http)?),
            decoder: Arc::new(JsonManifestDecoder),
            relauncher: Arc::new(ProcessRelauncher::default()),
        })
    }
}

/// Flags and counters shared between the updater and [`UpdateControl`] handles
#[derive(Default)]
pub(crate) struct RunState {
    /// Set while `start_update` is driving the plan
    pub(crate) updating: AtomicBool,
    /// Set by `pause_update`, cleared when a run starts
    pub(crate) paused: AtomicBool,
    /// Pause handle of the file currently transferring
    pub(crate) current_file: std::sync::Mutex<Option<PauseHandle>>,
    pub(crate) files_installed: AtomicUsize,
    pub(crate) files_total: AtomicUsize,
}

impl RunState {
    pub(crate) fn set_current_file(&self, handle: Option<PauseHandle>) {
        *self
            .current_file
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = handle;
    }
}

/// Self-update engine (cloneable - all fields are Arc-wrapped)
///
/// Lifecycle: [`check_for_updates`](Self::check_for_updates) →
/// [`initialize_update`](Self::initialize_update) →
/// [`start_update`](Self::start_update), which may be called again after a
/// pause or a failure to continue where it stopped.
#[derive(Clone)]
pub struct Updater {
    pub(crate) config: Arc<UpdaterConfig>,
    pub(crate) components: UpdaterComponents,
    pub(crate) events: EventBus,
    pub(crate) run: Arc<RunState>,
    /// Plan built by `initialize_update`; held for the whole of a run
    pub(crate) plan: Arc<tokio::sync::Mutex<Option<UpdatePlan>>>,
    pub(crate) installed: Arc<RwLock<Version>>,
}

impl Updater {
    /// Create an updater with the default HTTP/JSON/process collaborators
    ///
    /// Reads the installed-version record; when none exists,
    /// `config.initial_version` (or `0`) is assumed.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use app_patcher::{Updater, UpdaterConfig};
    ///
    /// # async fn example() -> app_patcher::Result<()> {
    /// let exe = std::env::current_exe()?;
    /// let updater = Updater::new(UpdaterConfig::for_executable(&exe)?).await?;
    ///
    /// let check = updater
    ///     .check_for_updates("https://example.com/patch_version.json")
    ///     .await?;
    /// if check.update_available {
    ///     updater.initialize_update(&check, false).await?;
    ///     updater.start_update().await?;
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn new(config: UpdaterConfig) -> Result<Self> {
        let components = UpdaterComponents::defaults(&config)?;
        Self::with_components(config, components).await
    }

    /// Create an updater with caller-supplied collaborators
    pub async fn with_components(
        config: UpdaterConfig,
        components: UpdaterComponents,
    ) -> Result<Self> {
        config.validate()?;

        let installed = match installed_version::load(&config.installed_version_path()).await? {
            Some(version) => version,
            None => config.initial_version.clone().unwrap_or_default(),
        };

        tracing::info!(
            %installed,
            app_root = %config.app_root().display(),
            source = components.source.name(),
            "updater initialized"
        );

        Ok(Self {
            config: Arc::new(config),
            components,
            events: EventBus::default(),
            run: Arc::new(RunState::default()),
            plan: Arc::new(tokio::sync::Mutex::new(None)),
            installed: Arc::new(RwLock::new(installed)),
        })
    }

    /// Subscribe to update events from another task
    ///
    /// Each subscriber receives every event independently. A subscriber that
    /// falls more than 1000 events behind receives `RecvError::Lagged`.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    /// Register a synchronous observer
    ///
    /// Observers run in registration order on the updater's own task before it
    /// moves on, so an observer of [`Event::ApplicationRestartRequested`] can
    /// block until the user is ready.
    pub fn add_observer<F>(&self, observer: F)
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let observer: Observer = Arc::new(observer);
        self.events.add_observer(observer);
    }

    /// The current configuration
    pub fn config(&self) -> Arc<UpdaterConfig> {
        Arc::clone(&self.config)
    }

    /// The version currently recorded as installed
    pub fn installed_version(&self) -> Version {
        self.installed
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub(crate) fn set_installed_version(&self, version: Version) {
        *self
            .installed
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = version;
    }

    pub(crate) fn emit(&self, event: Event) {
        self.events.emit(event);
    }

    /// Whether `start_update` is currently running
    pub fn is_updating(&self) -> bool {
        self.run.updating.load(Ordering::SeqCst)
    }

    /// Whether a pause was requested and not yet resumed
    pub fn is_paused(&self) -> bool {
        self.run.paused.load(Ordering::SeqCst)
    }

    /// `(files installed, files planned)` for the current plan
    pub fn progress(&self) -> (usize, usize) {
        (
            self.run.files_installed.load(Ordering::SeqCst),
            self.run.files_total.load(Ordering::SeqCst),
        )
    }
}
