//! Handing control to a freshly installed binary
//!
//! Two strategies exist because platforms differ in what "restart" can mean:
//!
//! - [`ExecRestart`] replaces the current process image in place. The PID is
//!   kept, so supervisors and terminals see no change. Unix only.
//! - [`SpawnAndExit`] starts the new binary as a child with inherited stdio and
//!   then exits the current process. Used where in-place replacement is not
//!   available.
//!
//! [`for_platform`] picks the strategy from [`Platform::supports_exec`].

use crate::core::HotswapError;
use crate::platform::Platform;
use std::convert::Infallible;
use std::path::PathBuf;
use std::process::Command;
use tracing::info;

/// What to start after a swap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestartTarget {
    /// Absolute path of the installed executable.
    pub executable: PathBuf,
    /// Arguments for the new process, not including `argv[0]`.
    pub args: Vec<String>,
}

impl RestartTarget {
    /// Create a target.
    #[must_use]
    pub const fn new(executable: PathBuf, args: Vec<String>) -> Self {
        Self { executable, args }
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.executable);
        command.args(&self.args);
        command
    }

    fn failure(&self, reason: impl Into<String>) -> HotswapError {
        HotswapError::Restart {
            path: self.executable.display().to_string(),
            reason: reason.into(),
        }
    }
}

/// A way to transfer control to a new executable.
///
/// On success `restart` never returns: the current process is either gone
/// or replaced. An `Err` means the running process is still the old one and
/// can keep serving.
pub trait Restart: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Transfer control to `target`.
    ///
    /// # Errors
    ///
    /// [`HotswapError::Restart`] when the new process could not be started.
    fn restart(&self, target: &RestartTarget) -> Result<Infallible, HotswapError>;
}

/// Replace the process image with `exec(2)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExecRestart;

impl Restart for ExecRestart {
    fn name(&self) -> &'static str {
        "exec"
    }

    #[cfg(unix)]
    fn restart(&self, target: &RestartTarget) -> Result<Infallible, HotswapError> {
        use std::os::unix::process::CommandExt;

        info!("Replacing process image with {:?}", target.executable);
        // exec only returns on failure
        let err = target.command().exec();
        Err(target.failure(err.to_string()))
    }

    #[cfg(not(unix))]
    fn restart(&self, target: &RestartTarget) -> Result<Infallible, HotswapError> {
        Err(target.failure("in-place exec is not available on this platform"))
    }
}

/// Spawn the new binary, then exit with status 0.
#[derive(Debug, Default, Clone, Copy)]
pub struct SpawnAndExit;

impl Restart for SpawnAndExit {
    fn name(&self) -> &'static str {
        "spawn"
    }

    fn restart(&self, target: &RestartTarget) -> Result<Infallible, HotswapError> {
        let child = target
            .command()
            .spawn()
            .map_err(|e| target.failure(e.to_string()))?;

        info!(
            "Started {:?} as pid {}, exiting",
            target.executable,
            child.id()
        );
        std::process::exit(0)
    }
}

/// Pick the restart strategy for `platform`.
#[must_use]
pub fn for_platform(platform: Platform) -> Box<dyn Restart> {
    if platform.supports_exec() {
        Box::new(ExecRestart)
    } else {
        Box::new(SpawnAndExit)
    }
}
