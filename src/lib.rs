//! hotswap - a self-updating client and a release server with rotating cohorts
//!
//! The crate is split into the two halves of one update protocol:
//!
//! - **Server side**: the [`catalog`] of releases loaded from a JSON data file,
//!   the [`catalog::rotation`] policy that flips the `latest` tag between the
//!   `odd` and `even` cohorts every minute, and the [`server`] endpoints that
//!   validate requests and answer with release metadata or payload bytes.
//! - **Client side**: the [`client`] polling loop, which asks the server for
//!   the latest release for its own platform, downloads and verifies the
//!   payload, swaps it in place of the running executable and restarts.
//!
//! # Architecture
//!
//! ```text
//! client tick -> UpdateChecker --HTTP--> server handlers -> Catalog <- TagRotator
//!                    |
//!                    v
//!               Installer (download, verify, swap) -> Restart (exec | spawn+exit)
//! ```
//!
//! Both binaries (`hotswap-server`, `hotswap-app`) are thin wrappers that parse
//! arguments with [`cli`], install logging and hand over to the library.
//!
//! # Wire format
//!
//! ```text
//! GET /api/releases/{platform}/{version|latest}/info  -> JSON release metadata
//! GET /api/releases/{platform}/{version|latest}       -> application/octet-stream
//! ```

pub mod catalog;
pub mod cli;
pub mod client;
pub mod core;
pub mod platform;
pub mod release;
pub mod server;
pub mod verification;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
