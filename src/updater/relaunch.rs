//! Restarting the replaced executable.

use crate::error::{Error, Result};
use std::ffi::OsString;
use std::path::Path;

/// Capability to start the new executable after a self-replace
pub trait Relauncher: Send + Sync {
    /// Start `executable`; an implementation may end the current process
    fn relaunch(&self, executable: &Path) -> Result<()>;
}

/// Spawns the new executable with the current arguments, then exits
#[derive(Clone, Debug)]
pub struct ProcessRelauncher {
    args: Vec<OsString>,
}

impl Default for ProcessRelauncher {
    fn default() -> Self {
        Self {
            args: std::env::args_os().skip(1).collect(),
        }
    }
}

impl ProcessRelauncher {
    /// Relaunch with explicit arguments instead of the current ones
    pub fn with_args<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

impl Relauncher for ProcessRelauncher {
    fn relaunch(&self, executable: &Path) -> Result<()> {
        let child = std::process::Command::new(executable)
            .args(&self.args)
            .spawn()
            .map_err(|e| Error::Relaunch {
                path: executable.to_path_buf(),
                reason: e.to_string(),
            })?;

        tracing::info!(
            path = %executable.display(),
            pid = child.id(),
            "relaunched, exiting current process"
        );
        std::process::exit(0);
    }
}
