//! Core types for app-patcher

use crate::version::Version;
use serde::{Deserialize, Serialize};

/// Event emitted during the update lifecycle
///
/// Paths are the manifest-relative install destinations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A file is about to be downloaded
    ReadyToDownload {
        /// Install destination relative to the app root
        path: String,
    },

    /// Bytes were appended to a file's download
    DownloadProgress {
        /// Install destination relative to the app root
        path: String,
        /// Bytes on disk so far
        bytes_received: u64,
        /// Remote length of the file
        bytes_total: u64,
    },

    /// A file was moved into its install destination
    FileInstalled {
        /// Install destination relative to the app root
        path: String,
    },

    /// Overall file counter changed
    UpdateProgress {
        /// Files installed during this update
        files_installed: usize,
        /// Files planned for this update
        files_total: usize,
    },

    /// Every file of a version batch is installed and the version is recorded
    PatchCompleted {
        /// The version now installed
        version: Version,
    },

    /// Every batch of the plan is installed
    UpdateCompleted,

    /// The running executable was replaced and the application is about to relaunch
    ApplicationRestartRequested,
}

impl Event {
    /// Progress as a percentage (0.0 to 100.0) for progress-carrying events
    pub fn percent(&self) -> Option<f64> {
        let ratio = |done: f64, total: f64| {
            if total == 0.0 {
                100.0
            } else {
                done * 100.0 / total
            }
        };
        match self {
            Event::DownloadProgress {
                bytes_received,
                bytes_total,
                ..
            } => Some(ratio(*bytes_received as f64, *bytes_total as f64)),
            Event::UpdateProgress {
                files_installed,
                files_total,
            } => Some(ratio(*files_installed as f64, *files_total as f64)),
            _ => None,
        }
    }
}

/// Result of checking the version pointer document
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateCheck {
    /// Newest version published
    pub latest_version: Version,
    /// URL of the newest patch manifest, the head of the chain
    pub chain_entry_url: String,
    /// Whether the installed version is older than `latest_version`
    pub update_available: bool,
}

/// What [`crate::Updater::initialize_update`] planned
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpdateSummary {
    /// Versions that still have files to install, ascending
    pub versions: Vec<Version>,
    /// Files still to install across all versions
    pub files_total: usize,
    /// Whether a progress cache from an interrupted run was applied
    pub resumed: bool,
}

/// How a call to [`crate::Updater::start_update`] ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Every batch was installed
    Completed,
    /// Every batch was installed, the executable was replaced and the relaunch was requested
    Restarted,
    /// The update was paused; calling `start_update` again resumes it
    Paused,
    /// Another call is already driving the update
    AlreadyRunning,
    /// Nothing was planned
    UpToDate,
}
