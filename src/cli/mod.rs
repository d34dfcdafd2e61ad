//! Command-line front-ends for the two binaries
//!
//! - [`ServerArgs`] - `hotswap-server`, the release server
//! - [`AppArgs`] - `hotswap-app`, the self-updating client
//!
//! Both accept `--verbose` / `--quiet` and install the same tracing
//! subscriber through [`init_logging`]. Every flag with an environment
//! fallback lists it in `--help`.
//!
//! # Examples
//!
//! ```bash
//! hotswap-server --port 3000 --app-data ./data
//! hotswap-app --server http://localhost:3000 --poll-interval 10
//! hotswap-app --test
//! RUST_LOG=hotswap=debug hotswap-app
//! ```

mod app;
mod server;


pub use app::AppArgs;
pub use server::ServerArgs;

use tracing_subscriber::EnvFilter;

/// Log filter selected by the verbosity flags.
///
/// `RUST_LOG` is not consulted here; [`init_logging`] lets it win.
#[must_use]
pub const fn log_level(verbose: bool, quiet: bool) -> &'static str {
    if verbose {
        "debug"
    } else if quiet {
        "error"
    } else {
        "info"
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG`, when set, overrides `default_level`. Calling this twice is
/// harmless; the second call is ignored.
pub fn init_logging(default_level: &str) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(default_level)
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
