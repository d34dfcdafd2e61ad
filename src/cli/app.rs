use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;

use crate::client::config::{ClientConfig, DEFAULT_SERVER_URL};
use crate::client::status::StatusReporter;
use crate::client::{self, ClientContext};

/// Self-updating client.
///
/// Polls the release server and replaces itself whenever the server's latest
/// version for this platform differs from the running one.
#[derive(Parser, Debug)]
#[command(name = "hotswap-app", about = "Self-updating client", version)]
pub struct AppArgs {
    /// Base URL of the release server.
    #[arg(long, env = "HOTSWAP_SERVER", default_value = DEFAULT_SERVER_URL)]
    pub server: String,

    /// Print one status line and exit.
    #[arg(long)]
    pub test: bool,

    /// Seconds between update checks.
    #[arg(long, default_value_t = 5)]
    pub poll_interval: u64,

    /// Seconds between status lines.
    #[arg(long, default_value_t = 1)]
    pub status_interval: u64,

    /// Per-request HTTP timeout in seconds (default: none).
    #[arg(long)]
    pub request_timeout: Option<u64>,

    /// Install downloads without comparing their checksum.
    #[arg(long)]
    pub no_verify_checksum: bool,

    /// Run a downloaded binary with --test before installing it.
    #[arg(long)]
    pub self_test: bool,

    /// Log at debug level.
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Log errors only.
    #[arg(short, long)]
    pub quiet: bool,
}

impl AppArgs {
    /// Translate the flags into a [`ClientConfig`].
    #[must_use]
    pub fn to_config(&self) -> ClientConfig {
        ClientConfig::new(&self.server)
            .with_poll_interval(self.poll_interval)
            .with_status_interval(self.status_interval)
            .with_request_timeout(self.request_timeout)
            .with_verify_checksum(!self.no_verify_checksum)
            .with_self_test(self.self_test)
    }

    /// Run the client, or print one status line for `--test`.
    ///
    /// # Errors
    ///
    /// Startup failures (unsupported platform, unresolvable executable path).
    pub async fn execute(self) -> Result<()> {
        let config = self.to_config();

        if self.test {
            let ctx = ClientContext::from_environment(&config.server_url)
                .context("Failed to determine client environment")?;
            let mut reporter = StatusReporter::new(Arc::new(ctx));
            println!("{}", reporter.next_line());
            return Ok(());
        }

        super::init_logging(super::log_level(self.verbose, self.quiet));
        client::run(config).await
    }
}
