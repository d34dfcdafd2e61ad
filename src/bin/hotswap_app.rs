//! Self-updating client entry point.

use anyhow::Result;
use clap::Parser;
use hotswap::cli::AppArgs;
use hotswap::core::user_friendly_error;

#[tokio::main]
async fn main() -> Result<()> {
    let args = AppArgs::parse();

    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    match args.execute().await {
        Ok(()) => Ok(()),
        Err(e) => {
            user_friendly_error(e).display();
            std::process::exit(1);
        }
    }
}
