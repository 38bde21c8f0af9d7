//! # app-patcher
//!
//! Self-update engine for desktop applications.
//!
//! ## Design Philosophy
//!
//! app-patcher is designed to be:
//! - **Incremental** - Applies every intermediate patch between the installed and latest version
//! - **Resumable** - Interrupted downloads continue from the bytes already on disk
//! - **Crash-tolerant** - A progress cache records which files still need installing
//! - **Event-driven** - Consumers observe events, no polling required
//!
//! ## Quick Start
//!
//! ```no_run
//! use app_patcher::{Updater, UpdaterConfig, UpdateOutcome};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = UpdaterConfig::for_executable(&std::env::current_exe()?)?;
//!     let updater = Updater::new(config).await?;
//!
//!     updater.add_observer(|event| println!("Event: {:?}", event));
//!
//!     let check = updater
//!         .check_for_updates("https://updates.example.com/latest.json")
//!         .await?;
//!     if check.update_available {
//!         updater.initialize_update(&check, false).await?;
//!         match updater.start_update().await? {
//!             UpdateOutcome::Paused => println!("paused, call start_update again to resume"),
//!             outcome => println!("finished: {:?}", outcome),
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Event observers and subscribers
pub mod events;
/// Resumable file downloads and installation
pub mod file;
/// Manifest decoding and patch chain resolution
pub mod manifest;
/// Retry logic with exponential backoff
pub mod retry;
/// Installed version record and progress cache
pub mod state;
/// Transfer sources (HTTP by default)
pub mod transfer;
/// Core types and events
pub mod types;
/// Update orchestration
pub mod updater;
/// Dotted version numbers
pub mod version;

// Re-export commonly used types
pub use config::{DownloadConfig, HttpConfig, PathsConfig, RetryConfig, UpdaterConfig};
pub use error::{Error, InstallError, Result, TransferError};
pub use events::Observer;
pub use file::{DownloadOutcome, FileState, PauseHandle, ResumableFile};
pub use manifest::{JsonManifestDecoder, ManifestDecoder, UpdatePlan, VersionBatch};
pub use state::{CachedFile, ProgressCache};
pub use transfer::{HttpTransferSource, RangedBody, TransferSource};
pub use types::{Event, UpdateCheck, UpdateOutcome, UpdateSummary};
pub use updater::{ProcessRelauncher, Relauncher, UpdateControl, Updater, UpdaterComponents};
pub use version::Version;

/// Exit status used when a signal arrives with no update running
pub const EXIT_INTERRUPTED: i32 = 130;

/// Pause a running update when the process receives a termination signal.
///
/// Waits for a signal. If an update is running, calls [`UpdateControl::pause`]:
/// [`Updater::start_update`] then returns [`UpdateOutcome::Paused`] at its next
/// chunk boundary with the progress cache written, so the next launch resumes.
/// With no update running the process exits with [`EXIT_INTERRUPTED`].
///
/// - **Unix:** listens for SIGTERM and SIGINT, falling back to Ctrl+C if neither registers.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use app_patcher::{Updater, pause_on_signal};
///
/// # async fn example(updater: Updater) -> app_patcher::Result<()> {
/// tokio::spawn(pause_on_signal(updater.control()));
/// let outcome = updater.start_update().await?;
/// # Ok(())
/// # }
/// ```
pub async fn pause_on_signal(control: UpdateControl) {
    let signal = wait_for_signal().await;
    if let SignalAction::Exit = signal_action(&control) {
        tracing::info!(signal, "no update running, exiting");
        std::process::exit(EXIT_INTERRUPTED);
    }
    tracing::info!(signal, "update paused for shutdown");
}

/// What a termination signal leads to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SignalAction {
    Paused,
    Exit,
}

/// Pause the running update, or report that the process should exit
fn signal_action(control: &UpdateControl) -> SignalAction {
    if !control.is_updating() {
        return SignalAction::Exit;
    }
    control.pause();
    SignalAction::Paused
}

/// Resolve with the name of the first termination signal received
#[cfg(unix)]
async fn wait_for_signal() -> &'static str {
    use futures::future::{FutureExt, select_all};
    use tokio::signal::unix::{SignalKind, signal};

    let mut listeners = Vec::new();
    for (name, kind) in [
        ("SIGTERM", SignalKind::terminate()),
        ("SIGINT", SignalKind::interrupt()),
    ] {
        match signal(kind) {
            Ok(stream) => listeners.push((name, stream)),
            Err(e) => tracing::warn!(signal = name, error = %e, "signal listener unavailable"),
        }
    }
    if listeners.is_empty() {
        return wait_for_ctrl_c().await;
    }

    let waits = listeners.iter_mut().map(|(name, stream)| {
        let name = *name;
        async move {
            stream.recv().await;
            name
        }
        .boxed()
    });
    let (name, _, _) = select_all(waits).await;
    name
}

#[cfg(not(unix))]
async fn wait_for_signal() -> &'static str {
    wait_for_ctrl_c().await
}

async fn wait_for_ctrl_c() -> &'static str {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Ctrl+C listener unavailable");
        // Nothing to wait for; never report a signal that did not arrive
        futures::future::pending::<()>().await;
    }
    "Ctrl+C"
}
