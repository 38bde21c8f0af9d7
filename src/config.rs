//! Configuration types for app-patcher

use crate::error::{Error, Result};
use crate::version::Version;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Filesystem layout of the application being updated
///
/// Every relative path is resolved against `app_root`.
/// Used as a nested sub-config within [`UpdaterConfig`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Application root; manifest paths are installed relative to it (default: ".")
    #[serde(default = "default_app_root")]
    pub app_root: PathBuf,

    /// Directory holding partial and complete downloads (default: "temp")
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Installed-version record (default: "app.patch")
    #[serde(default = "default_installed_version_file")]
    pub installed_version_file: PathBuf,

    /// Progress cache written while a batch is partially installed (default: "app.patch.progress")
    #[serde(default = "default_progress_cache_file")]
    pub progress_cache_file: PathBuf,

    /// Path of the running executable relative to `app_root`
    ///
    /// When a manifest lists this path, the file is installed last within its
    /// batch and the application is relaunched once the update completes.
    /// `None` disables the executable special case.
    #[serde(default)]
    pub executable: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            app_root: default_app_root(),
            download_dir: default_download_dir(),
            installed_version_file: default_installed_version_file(),
            progress_cache_file: default_progress_cache_file(),
            executable: None,
        }
    }
}

/// Transfer behavior
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Maximum bytes read and written per chunk; pause is observed between chunks (default: 1,024,000)
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Remove the download directory once every batch has been installed (default: true)
    #[serde(default = "default_true")]
    pub cleanup_download_dir: bool,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            cleanup_download_dir: true,
        }
    }
}

/// HTTP client settings for the default transfer source
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Whole-request timeout (default: 300 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub timeout: Duration,

    /// Connection establishment timeout (default: 30 seconds)
    #[serde(default = "default_connect_timeout", with = "duration_serde")]
    pub connect_timeout: Duration,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: default_request_timeout(),
            connect_timeout: default_connect_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// Retry configuration for callers that want to retry transient failures
///
/// The engine itself never retries; see [`crate::retry`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 5)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 60 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// Main configuration for [`crate::Updater`]
///
/// Fields are organized into logical sub-configs:
/// - [`paths`](PathsConfig) - application layout and state files
/// - [`download`](DownloadConfig) - chunking and cleanup
/// - [`http`](HttpConfig) - client used by the default transfer source
/// - [`retry`](RetryConfig) - caller-level retry policy
///
/// `paths` is flattened so a config file reads `{"app_root": ..., "http": {...}}`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct UpdaterConfig {
    /// Application layout and state files
    #[serde(flatten)]
    pub paths: PathsConfig,

    /// Transfer behavior
    #[serde(default)]
    pub download: DownloadConfig,

    /// HTTP client settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Caller-level retry policy
    #[serde(default)]
    pub retry: RetryConfig,

    /// Installed version to assume when no installed-version record exists yet
    /// (default: `0`)
    #[serde(default)]
    pub initial_version: Option<Version>,
}

impl UpdaterConfig {
    /// Configuration for an application whose executable lives at `executable`
    ///
    /// The app root becomes the executable's directory, and the state files are
    /// named after the executable (`<stem>.patch`, `<stem>.patch.progress`).
    pub fn for_executable(executable: &Path) -> Result<Self> {
        let file_name = executable.file_name().ok_or_else(|| {
            Error::config(
                "executable",
                format!("'{}' has no file name", executable.display()),
            )
        })?;
        let stem = executable
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("app");
        let app_root = executable
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(default_app_root, Path::to_path_buf);

        Ok(Self {
            paths: PathsConfig {
                app_root,
                executable: Some(PathBuf::from(file_name)),
                installed_version_file: PathBuf::from(format!("{stem}.patch")),
                progress_cache_file: PathBuf::from(format!("{stem}.patch.progress")),
                ..Default::default()
            },
            ..Default::default()
        })
    }

    /// Check invariants that serde defaults cannot express
    pub fn validate(&self) -> Result<()> {
        if self.download.chunk_size == 0 {
            return Err(Error::config("chunk_size", "must be greater than zero"));
        }
        let download_dir = &self.paths.download_dir;
        if download_dir.as_os_str().is_empty() || download_dir == Path::new(".") {
            // The directory is removed after a successful update
            return Err(Error::config(
                "download_dir",
                "must not be the application root",
            ));
        }
        if let Some(exe) = &self.paths.executable {
            if exe.is_absolute() {
                return Err(Error::config(
                    "executable",
                    "must be relative to app_root",
                ));
            }
        }
        Ok(())
    }

    /// Application root
    pub fn app_root(&self) -> &Path {
        &self.paths.app_root
    }

    /// Download directory resolved against the app root
    pub fn download_dir(&self) -> PathBuf {
        self.paths.app_root.join(&self.paths.download_dir)
    }

    /// Installed-version record resolved against the app root
    pub fn installed_version_path(&self) -> PathBuf {
        self.paths.app_root.join(&self.paths.installed_version_file)
    }

    /// Progress cache resolved against the app root
    pub fn progress_cache_path(&self) -> PathBuf {
        self.paths.app_root.join(&self.paths.progress_cache_file)
    }
}

fn default_app_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("temp")
}

fn default_installed_version_file() -> PathBuf {
    PathBuf::from("app.patch")
}

fn default_progress_cache_file() -> PathBuf {
    PathBuf::from("app.patch.progress")
}

fn default_chunk_size() -> usize {
    1024 * 1000
}

fn default_true() -> bool {
    true
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_user_agent() -> String {
    format!("app-patcher/{}", env!("CARGO_PKG_VERSION"))
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
