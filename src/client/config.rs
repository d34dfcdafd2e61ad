use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default release server URL.
pub const DEFAULT_SERVER_URL: &str = "http://localhost:3000";

/// Settings for the self-updating client.
///
/// Built once from the command line and never mutated afterwards. The same
/// values are handed back to the new binary on restart (see
/// [`restart_args`](Self::restart_args)) so the updated process keeps talking
/// to the same server on the same schedule.
///
/// # Examples
///
/// ```rust,no_run
/// use hotswap::client::config::ClientConfig;
///
/// let config = ClientConfig::new("http://updates.internal:3000")
///     .with_poll_interval(30)
///     .with_verify_checksum(false);
/// assert_eq!(config.poll_interval().as_secs(), 30);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the release server, without a trailing slash.
    pub server_url: String,

    /// Seconds between update checks.
    ///
    /// The poll itself is the retry mechanism: a failed check is simply
    /// repeated on the next tick, with no backoff.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Seconds between status lines.
    #[serde(default = "default_status_interval")]
    pub status_interval_secs: u64,

    /// Per-request HTTP timeout in seconds. `None` leaves requests unbounded,
    /// so a hung server stalls that poll cycle.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,

    /// Checks applied to a download before it replaces the running binary.
    #[serde(default)]
    pub install: InstallPolicy,
}

/// Pre-swap verification of a staged download.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallPolicy {
    /// Compare the staged file against the `sha256:` checksum in the release
    /// metadata. Releases without a verifiable checksum are installed with a
    /// warning.
    #[serde(default = "default_verify_checksum")]
    pub verify_checksum: bool,

    /// Smallest payload accepted, in bytes.
    #[serde(default = "default_min_size")]
    pub min_size: u64,

    /// Run the staged binary with `--test` before committing to it.
    #[serde(default)]
    pub self_test: bool,

    /// How long the dry run may take, in seconds.
    #[serde(default = "default_self_test_timeout")]
    pub self_test_timeout_secs: u64,
}

impl Default for InstallPolicy {
    fn default() -> Self {
        Self {
            verify_checksum: default_verify_checksum(),
            min_size: default_min_size(),
            self_test: false,
            self_test_timeout_secs: default_self_test_timeout(),
        }
    }
}

fn default_poll_interval() -> u64 {
    5
}

fn default_status_interval() -> u64 {
    1
}

fn default_verify_checksum() -> bool {
    true
}

fn default_min_size() -> u64 {
    1
}

fn default_self_test_timeout() -> u64 {
    10
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_SERVER_URL)
    }
}

impl ClientConfig {
    /// Create a configuration for `server_url` with default intervals and checks.
    pub fn new(server_url: impl Into<String>) -> Self {
        let server_url: String = server_url.into();
        Self {
            server_url: server_url.trim_end_matches('/').to_string(),
            poll_interval_secs: default_poll_interval(),
            status_interval_secs: default_status_interval(),
            request_timeout_secs: None,
            install: InstallPolicy::default(),
        }
    }

    /// Set the update poll interval in seconds (minimum 1).
    #[must_use]
    pub fn with_poll_interval(mut self, secs: u64) -> Self {
        self.poll_interval_secs = secs.max(1);
        self
    }

    /// Set the status line interval in seconds (minimum 1).
    #[must_use]
    pub fn with_status_interval(mut self, secs: u64) -> Self {
        self.status_interval_secs = secs.max(1);
        self
    }

    /// Set a per-request HTTP timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, secs: Option<u64>) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    /// Enable or disable checksum verification.
    #[must_use]
    pub fn with_verify_checksum(mut self, verify: bool) -> Self {
        self.install.verify_checksum = verify;
        self
    }

    /// Enable or disable the pre-swap dry run.
    #[must_use]
    pub fn with_self_test(mut self, self_test: bool) -> Self {
        self.install.self_test = self_test;
        self
    }

    /// Poll interval as a [`Duration`].
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    /// Status interval as a [`Duration`].
    #[must_use]
    pub fn status_interval(&self) -> Duration {
        Duration::from_secs(self.status_interval_secs.max(1))
    }

    /// Command-line arguments that reproduce this configuration in the new binary.
    #[must_use]
    pub fn restart_args(&self) -> Vec<String> {
        let mut args = vec![
            "--server".to_string(),
            self.server_url.clone(),
            "--poll-interval".to_string(),
            self.poll_interval_secs.to_string(),
            "--status-interval".to_string(),
            self.status_interval_secs.to_string(),
        ];
        if let Some(timeout) = self.request_timeout_secs {
            args.push("--request-timeout".to_string());
            args.push(timeout.to_string());
        }
        if !self.install.verify_checksum {
            args.push("--no-verify-checksum".to_string());
        }
        if self.install.self_test {
            args.push("--self-test".to_string());
        }
        args
    }
}
