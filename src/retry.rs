//! Retry logic with exponential backoff
//!
//! The update engine never retries on its own: a failed
//! [`start_update`](crate::Updater::start_update) leaves every received byte on
//! disk, and calling it again continues from there. This module is for callers
//! that want to do that automatically for transient failures.
//!
//! # Example
//!
//! ```no_run
//! use app_patcher::retry::with_retry;
//! use app_patcher::Updater;
//!
//! # async fn example(updater: Updater) -> app_patcher::Result<()> {
//! let retry = updater.config().retry.clone();
//! let outcome = with_retry(&retry, || updater.start_update()).await?;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::{Error, TransferError};
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (timeouts, dropped connections, busy servers) should return `true`.
/// Permanent failures (missing files, bad manifests, unsupported versions) should return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for TransferError {
    fn is_retryable(&self) -> bool {
        match self {
            TransferError::RequestFailed { .. } | TransferError::StreamFailed { .. } => true,
            // Server errors, request timeout and rate limiting may clear up
            TransferError::BadStatus { status, .. } => {
                *status >= 500 || *status == 408 || *status == 429
            }
            // A server that never reports a length will not start doing so
            TransferError::UnknownLength { .. } => false,
            TransferError::WriteFailed { source, .. } => is_transient_io(source),
        }
    }
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Error::Transfer(e) => e.is_retryable(),
            // The rename sequence is safe to re-run (e.g. after a virus scanner released a lock)
            Error::Install(_) => true,
            Error::Io(e) => is_transient_io(e),
            Error::MalformedVersion { .. }
            | Error::UnsupportedVersion { .. }
            | Error::Decode(_)
            | Error::ManifestCycle { .. }
            | Error::UpdateInProgress
            | Error::Config { .. }
            | Error::CorruptState { .. }
            | Error::Relaunch { .. } => false,
        }
    }
}

fn is_transient_io(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::TimedOut
            | std::io::ErrorKind::ConnectionRefused
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::NotConnected
            | std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::Interrupted
    )
}

/// Run `operation` until it succeeds, fails permanently, or runs out of attempts
///
/// A failure is retried only if [`IsRetryable::is_retryable`] says so, and at
/// most `config.max_attempts` times. Waits between attempts follow [`Backoff`].
/// The last error is returned unchanged.
pub async fn with_retry<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let mut delays = Backoff::new(config);
    let mut attempt: u32 = 1;

    loop {
        let error = match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(attempt, "recovered after retry");
                }
                return Ok(value);
            }
            Err(e) => e,
        };

        if !error.is_retryable() {
            tracing::error!(error = %error, attempt, "permanent failure, not retrying");
            return Err(error);
        }
        let Some(delay) = delays.next() else {
            tracing::error!(error = %error, attempt, "transient failure, no attempts left");
            return Err(error);
        };

        tracing::warn!(
            error = %error,
            attempt,
            retry_in_ms = delay.as_millis() as u64,
            "transient failure, retrying"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

/// Waits between attempts
///
/// Starts at `initial_delay`, multiplies by `backoff_multiplier` each step and
/// never exceeds `max_delay`. Yields `max_attempts` delays, each scaled by a
/// random factor in `1.0..=2.0` when `jitter` is set.
#[derive(Debug, Clone)]
pub struct Backoff {
    next: Duration,
    remaining: u32,
    max_delay: Duration,
    multiplier: f64,
    jitter: bool,
}

impl Backoff {
    /// Delays for `config`
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            next: config.initial_delay.min(config.max_delay),
            remaining: config.max_attempts,
            max_delay: config.max_delay,
            multiplier: config.backoff_multiplier,
            jitter: config.jitter,
        }
    }
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        self.remaining = self.remaining.checked_sub(1)?;
        let base = self.next;
        self.next = base.mul_f64(self.multiplier).min(self.max_delay);
        Some(if self.jitter { jittered(base) } else { base })
    }
}

fn jittered(delay: Duration) -> Duration {
    delay.mul_f64(rand::thread_rng().gen_range(1.0..=2.0))
}
