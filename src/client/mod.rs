//! Self-updating client
//!
//! The client runs two independent loops:
//!
//! - a **status loop** ([`status::StatusReporter`]) that logs a line every
//!   second to show which image is running;
//! - an **update loop** ([`Updater`]) that polls the release server, installs
//!   a different version when one is advertised and restarts into it.
//!
//! One update cycle is strictly sequential:
//!
//! ```text
//! UpdateChecker::check ──UpToDate──> done
//!         │
//!     Available
//!         ▼
//! Installer::install (download -> verify -> swap)
//!         ▼
//! Restart::restart ──Ok──> process replaced / exited
//!         │
//!        Err ──> logged, old image keeps running
//! ```
//!
//! Every failure inside a cycle is logged and the cycle is abandoned; the
//! next poll tick starts over. Only startup problems (unknown platform,
//! unresolvable executable path) are fatal.
//!
//! # Restart failures
//!
//! When the swap succeeded but the restart did not, the old image keeps
//! running while the file on disk is already the new version. The updater
//! remembers that release. While the server keeps advertising it, later
//! polls skip download and swap and only retry the restart, so `.bak` keeps
//! holding the binary that was running before the update.

pub mod checker;
pub mod config;
pub mod installer;
pub mod restart;
pub mod status;
pub mod swap;

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{Level, debug, info, warn};

use crate::core::HotswapError;
use crate::platform::Platform;
use crate::release::ReleaseInfo;
use checker::{UpdateChecker, UpdateDecision};
use config::ClientConfig;
use installer::Installer;
use restart::{Restart, RestartTarget};
use status::StatusReporter;

/// Version of this build.
///
/// Release builds bake the catalog version in through `HOTSWAP_APP_VERSION`
/// (e.g. `HOTSWAP_APP_VERSION=1.5 cargo build --release`); otherwise the
/// package version is used.
pub const CURRENT_VERSION: &str = match option_env!("HOTSWAP_APP_VERSION") {
    Some(version) => version,
    None => env!("CARGO_PKG_VERSION"),
};

/// Optional build label shown in status lines, set through `HOTSWAP_APP_FLAVOR`.
pub const BUILD_FLAVOR: Option<&str> = option_env!("HOTSWAP_APP_FLAVOR");

/// Facts about the running client, resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientContext {
    /// Base URL of the release server.
    pub server_url: String,
    /// Absolute path of the running executable.
    pub self_path: PathBuf,
    /// Version of the running image.
    pub current_version: String,
    /// Platform releases are requested for.
    pub platform: Platform,
}

impl ClientContext {
    /// Build a context from explicit values.
    pub fn new(
        server_url: impl Into<String>,
        self_path: PathBuf,
        current_version: String,
        platform: Platform,
    ) -> Self {
        let server_url: String = server_url.into();
        Self {
            server_url: server_url.trim_end_matches('/').to_string(),
            self_path,
            current_version,
            platform,
        }
    }

    /// Build the context for this process.
    ///
    /// Symlinks are not resolved; the swap replaces whatever path the process
    /// was started through.
    ///
    /// # Errors
    ///
    /// [`HotswapError::PlatformNotSupported`] on an unknown OS, or an I/O error
    /// if the executable path cannot be determined.
    pub fn from_environment(server_url: &str) -> Result<Self, HotswapError> {
        let platform = Platform::current()?;
        let exe = std::env::current_exe()?;
        let self_path = std::path::absolute(exe)?;

        Ok(Self::new(
            server_url,
            self_path,
            CURRENT_VERSION.to_string(),
            platform,
        ))
    }
}

/// How one update cycle ended, when it did not fail outright.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The running version is what the server advertises.
    UpToDate,
    /// The new binary is installed but control could not be handed over.
    RestartFailed {
        /// Version now on disk.
        version: String,
        /// Why the restart failed.
        reason: String,
    },
}

/// Build the HTTP client shared by checker and installer.
///
/// # Errors
///
/// Fails if the TLS backend cannot be initialized.
pub fn http_client(config: &ClientConfig) -> Result<reqwest::Client, HotswapError> {
    let mut builder =
        reqwest::Client::builder().user_agent(concat!("hotswap-app/", env!("CARGO_PKG_VERSION")));
    if let Some(secs) = config.request_timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    Ok(builder.build()?)
}

/// Runs update cycles for one client.
pub struct Updater {
    ctx: Arc<ClientContext>,
    checker: UpdateChecker,
    installer: Installer,
    restarter: Box<dyn Restart>,
    restart_args: Vec<String>,
    /// Release swapped in on disk whose restart has not succeeded yet.
    awaiting_restart: Mutex<Option<ReleaseInfo>>,
}

impl Updater {
    /// Compose an updater with the restart strategy for the context's platform.
    ///
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be built.
    pub fn new(ctx: Arc<ClientContext>, config: &ClientConfig) -> Result<Self, HotswapError> {
        let http = http_client(config)?;
        let checker = UpdateChecker::new(Arc::clone(&ctx), http.clone());
        let installer = Installer::new(Arc::clone(&ctx), http, config.install.clone());
        let restarter = restart::for_platform(ctx.platform);
        debug!("Using '{}' restart strategy", restarter.name());

        Ok(Self {
            ctx,
            checker,
            installer,
            restarter,
            restart_args: config.restart_args(),
            awaiting_restart: Mutex::new(None),
        })
    }

    /// Replace the restart strategy.
    #[must_use]
    pub fn with_restarter(mut self, restarter: Box<dyn Restart>) -> Self {
        self.restarter = restarter;
        self
    }

    /// The installer, for rollback and inspection.
    #[must_use]
    pub const fn installer(&self) -> &Installer {
        &self.installer
    }

    /// Run one check, install and restart sequence.
    ///
    /// A successful restart does not return.
    ///
    /// # Errors
    ///
    /// Any check or install failure; the running binary is unchanged.
    pub async fn run_cycle(&self) -> Result<CycleOutcome> {
        let release = match self.checker.check().await? {
            UpdateDecision::UpToDate(_) => return Ok(CycleOutcome::UpToDate),
            UpdateDecision::Available(release) => release,
        };

        if self.is_awaiting_restart(&release) {
            info!(
                "Version {} is already installed at {}; retrying restart",
                release.version,
                self.ctx.self_path.display()
            );
        } else {
            self.installer
                .install(&release)
                .await
                .with_context(|| format!("Failed to install version {}", release.version))?;
        }

        let target = RestartTarget::new(self.ctx.self_path.clone(), self.restart_args.clone());
        info!(
            "Restarting into version {} ({})",
            release.version,
            self.restarter.name()
        );

        match self.restarter.restart(&target) {
            Ok(never) => match never {},
            Err(e) => {
                warn!(
                    "Version {} installed but restart failed, still running {}: {e}",
                    release.version, self.ctx.current_version
                );
                let version = release.version.clone();
                *self.lock_awaiting_restart() = Some(release);
                Ok(CycleOutcome::RestartFailed {
                    version,
                    reason: e.to_string(),
                })
            }
        }
    }

    fn lock_awaiting_restart(&self) -> std::sync::MutexGuard<'_, Option<ReleaseInfo>> {
        self.awaiting_restart
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn is_awaiting_restart(&self, release: &ReleaseInfo) -> bool {
        self.lock_awaiting_restart().as_ref().is_some_and(|installed| {
            installed.version == release.version && installed.checksum == release.checksum
        })
    }

    /// Poll every `interval`, forever. The first cycle runs immediately.
    pub async fn poll(&self, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = self.run_cycle().await {
                if failure_level(&e) == Level::INFO {
                    info!("Update check skipped: {e:#}");
                } else {
                    warn!("Update check failed: {e:#}");
                }
            }
        }
    }
}

/// Log level for a failed cycle.
///
/// Transient failures (server down, restarting, or mid-rotation) are routine
/// and logged at `info`; anything else is a `warn`.
#[must_use]
pub fn failure_level(error: &anyhow::Error) -> Level {
    let transient = error
        .chain()
        .find_map(|cause| cause.downcast_ref::<HotswapError>())
        .is_some_and(HotswapError::is_transient);
    if transient { Level::INFO } else { Level::WARN }
}

/// Start the client: status loop plus update loop.
///
/// # Errors
///
/// Only startup failures; once running the loops never stop on their own.
pub async fn run(config: ClientConfig) -> Result<()> {
    let ctx = Arc::new(
        ClientContext::from_environment(&config.server_url)
            .context("Failed to determine client environment")?,
    );
    info!("Starting version {}", ctx.current_version);
    info!("App running from: {}", ctx.self_path.display());

    let status = tokio::spawn(StatusReporter::new(Arc::clone(&ctx)).run(config.status_interval()));

    let updater = Updater::new(ctx, &config)?;
    updater.poll(config.poll_interval()).await;

    status.abort();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_trims_server_url() {
        let ctx = ClientContext::new(
            "http://localhost:3000/",
            PathBuf::from("/opt/app"),
            "1.0".to_string(),
            Platform::Linux,
        );
        assert_eq!(ctx.server_url, "http://localhost:3000");
    }

    #[test]
    fn test_context_from_environment() {
        let ctx = ClientContext::from_environment("http://localhost:3000").unwrap();
        assert!(ctx.self_path.is_absolute());
        assert_eq!(ctx.current_version, CURRENT_VERSION);
        assert_eq!(ctx.platform, Platform::current().unwrap());
    }

    #[test]
    fn test_failure_level() {
        let not_found: anyhow::Error = HotswapError::ServerStatus {
            url: "http://localhost:3000/api/releases/linux/latest/info".to_string(),
            status: 404,
        }
        .into();
        assert_eq!(failure_level(&not_found), Level::INFO);
        assert_eq!(
            failure_level(&not_found.context("Failed to check for updates")),
            Level::INFO
        );

        let mismatch: anyhow::Error = HotswapError::ChecksumMismatch {
            path: "app.new_release".to_string(),
            expected: "sha256:aa".to_string(),
            actual: "sha256:bb".to_string(),
        }
        .into();
        assert_eq!(failure_level(&mismatch), Level::WARN);
        assert_eq!(failure_level(&anyhow::anyhow!("disk full")), Level::WARN);
    }

    #[test]
    fn test_http_client_builds_with_timeout() {
        let config = ClientConfig::default().with_request_timeout(Some(3));
        assert!(http_client(&config).is_ok());
    }
}
