//! Error types for app-patcher
//!
//! This module provides the error taxonomy for the update engine:
//! - Version and manifest errors (malformed versions, undecodable documents, cyclic chains)
//! - Transfer errors raised while fetching manifests or file bytes
//! - Install errors raised by the atomic rename sequence
//! - Orchestration errors (unsupported installed base, concurrent update)
//!
//! Transfer and install errors are retryable by re-invoking the operation; see
//! [`crate::retry::IsRetryable`].

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for app-patcher operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for app-patcher
///
/// Each variant includes contextual information to help diagnose issues.
#[derive(Debug, Error)]
pub enum Error {
    /// A version string could not be parsed
    #[error("malformed version '{input}': {reason}")]
    MalformedVersion {
        /// The text that failed to parse
        input: String,
        /// Why the text was rejected
        reason: String,
    },

    /// The installed base is older than the oldest manifest in the chain
    #[error(
        "installed version {installed} is too old to be updated (oldest patch in chain is {oldest_available})"
    )]
    UnsupportedVersion {
        /// The version currently installed
        installed: String,
        /// The last version reached while walking the manifest chain
        oldest_available: String,
    },

    /// Network or stream failure
    #[error("transfer error: {0}")]
    Transfer(#[from] TransferError),

    /// Filesystem failure during the install rename sequence
    #[error("install error: {0}")]
    Install(#[from] InstallError),

    /// A manifest or version pointer document could not be decoded
    #[error("decode error: {0}")]
    Decode(String),

    /// The manifest chain points back to a manifest that was already visited
    #[error("manifest chain revisits {url}")]
    ManifestCycle {
        /// The URL seen twice
        url: String,
    },

    /// An update is currently running; the requested operation must wait
    #[error("an update is already in progress")]
    UpdateInProgress,

    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "app_root")
        key: Option<String>,
    },

    /// Persisted state (installed-version record or progress cache) is unreadable
    #[error("corrupt state file {path}: {reason}")]
    CorruptState {
        /// The state file that failed to decode
        path: PathBuf,
        /// What was wrong with it
        reason: String,
    },

    /// The new executable could not be launched
    #[error("failed to relaunch {path}: {reason}")]
    Relaunch {
        /// The executable that should have been started
        path: PathBuf,
        /// The reason the launch failed
        reason: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Transfer-related errors
///
/// Raised while fetching manifest documents or streaming file bytes. All of
/// them leave already-received bytes on disk, so re-invoking the download
/// continues from the persisted offset.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The request could not be sent or no response was received
    #[error("request to {url} failed: {reason}")]
    RequestFailed {
        /// The URL being fetched
        url: String,
        /// The underlying failure
        reason: String,
    },

    /// The server answered with a non-success status
    #[error("{url} returned HTTP {status}")]
    BadStatus {
        /// The URL being fetched
        url: String,
        /// The HTTP status code
        status: u16,
    },

    /// The server did not report a content length
    #[error("{url} did not report a content length")]
    UnknownLength {
        /// The URL being fetched
        url: String,
    },

    /// Reading the response body failed mid-stream
    #[error("reading {url} failed after {bytes_received} bytes: {reason}")]
    StreamFailed {
        /// The URL being fetched
        url: String,
        /// Bytes safely on disk when the failure happened
        bytes_received: u64,
        /// The underlying failure
        reason: String,
    },

    /// Appending received bytes to the download file failed
    #[error("writing {path} failed: {source}")]
    WriteFailed {
        /// The download file
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Install-related errors
///
/// The install rename sequence always leaves a recoverable state, so
/// re-running the install after fixing the cause converges.
#[derive(Debug, Error)]
pub enum InstallError {
    /// The destination directory could not be created
    #[error("failed to create directory {path}: {source}")]
    CreateDirFailed {
        /// The directory being created
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A rename step failed
    #[error("failed to move {source_path} to {dest_path}: {source}")]
    MoveFailed {
        /// The path being moved
        source_path: PathBuf,
        /// Where it was being moved to
        dest_path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A stale backup or aside file could not be removed
    #[error("failed to remove {path}: {source}")]
    RemoveFailed {
        /// The file being removed
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The installed executable could not be marked executable
    #[error("failed to set permissions on {path}: {source}")]
    PermissionsFailed {
        /// The executable
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Create a configuration error for a specific key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_version_message_names_both_versions() {
        let err = Error::UnsupportedVersion {
            installed: "1.0".into(),
            oldest_available: "1.2".into(),
        };
        let message = err.to_string();
        assert!(message.contains("1.0"));
        assert!(message.contains("1.2"));
    }

    #[test]
    fn transfer_error_converts_into_error() {
        let err: Error = TransferError::BadStatus {
            url: "http://host/a".into(),
            status: 503,
        }
        .into();
        assert!(matches!(err, Error::Transfer(TransferError::BadStatus { status: 503, .. })));
        assert_eq!(err.to_string(), "transfer error: http://host/a returned HTTP 503");
    }

    #[test]
    fn install_error_keeps_io_source() {
        use std::error::Error as _;

        let err = InstallError::MoveFailed {
            source_path: PathBuf::from("temp/a"),
            dest_path: PathBuf::from("a"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        let source = err.source().expect("io source should be exposed");
        assert_eq!(source.to_string(), "denied");
    }

    #[test]
    fn config_helper_records_key() {
        match Error::config("chunk_size", "must be greater than zero") {
            Error::Config { key, message } => {
                assert_eq!(key.as_deref(), Some("chunk_size"));
                assert_eq!(message, "must be greater than zero");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
