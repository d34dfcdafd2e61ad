use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use crate::server::{self, ServerConfig};

/// Release server.
///
/// Serves release metadata and binaries from an `appData.json` catalog and
/// moves the `latest` tag between the `odd` and `even` cohorts every minute.
#[derive(Parser, Debug)]
#[command(
    name = "hotswap-server",
    about = "Release server with rotating latest tags",
    version
)]
pub struct ServerArgs {
    /// Port to listen on.
    #[arg(long, env = "HOTSWAP_PORT", default_value_t = 3000)]
    pub port: u16,

    /// Data file, or a directory containing appData.json.
    ///
    /// Payload files listed in the catalog are resolved relative to the data
    /// file's directory.
    #[arg(long, env = "HOTSWAP_APP_DATA", default_value = "./data/appData.json")]
    pub app_data: PathBuf,

    /// Interface to bind.
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Log at debug level (shows every tag change and the catalog after each rotation).
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Log errors only.
    #[arg(short, long)]
    pub quiet: bool,
}

impl ServerArgs {
    /// Translate the flags into a [`ServerConfig`].
    #[must_use]
    pub fn into_config(self) -> ServerConfig {
        ServerConfig {
            host: self.host,
            port: self.port,
            app_data: self.app_data,
        }
    }

    /// Initialize logging and run the server until Ctrl-C.
    ///
    /// # Errors
    ///
    /// Startup failures from [`server::run`].
    pub async fn execute(self) -> Result<()> {
        super::init_logging(super::log_level(self.verbose, self.quiet));
        server::run(self.into_config()).await
    }
}
