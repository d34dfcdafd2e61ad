//! Integration test suite for hotswap
//!
//! End-to-end tests that run a real release server on a loopback port and
//! drive it over HTTP, plus client update cycles against both the real
//! server and mocked ones.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **cli**: Binary entry points (`--help`, `--test`)
//! - **server_api**: Release endpoints, validation and tag rotation
//! - **update_cycle**: Client check/install/restart against a server

mod cli;
mod server_api;
mod update_cycle;

use hotswap::catalog::Catalog;
use hotswap::platform::Platform;
use hotswap::server::ReleaseServer;
use hotswap::test_utils::CatalogFixture;
use std::sync::Arc;

/// Payload bytes for a given version.
pub fn payload(version: &str) -> Vec<u8> {
    format!("#!/bin/sh\necho hotswap-app {version}\n").into_bytes()
}

/// Two cohorts per platform: linux 1.0 (odd, latest) / 2.0 (even),
/// darwin 1.1 (odd, latest) / 2.1 (even), and windows 1.2 (odd) only.
pub fn cohort_fixture() -> CatalogFixture {
    CatalogFixture::new()
        .unwrap()
        .with_release(Platform::Linux, "1.0", &["odd", "latest"], &payload("1.0"))
        .unwrap()
        .with_release(Platform::Linux, "2.0", &["even"], &payload("2.0"))
        .unwrap()
        .with_release(Platform::Darwin, "1.1", &["odd", "latest"], &payload("1.1"))
        .unwrap()
        .with_release(Platform::Darwin, "2.1", &["even"], &payload("2.1"))
        .unwrap()
        .with_release(Platform::Windows, "1.2", &["odd"], &payload("1.2"))
        .unwrap()
}

/// Load `fixture` and serve it on a free loopback port.
pub async fn start_server(fixture: &CatalogFixture) -> (Arc<Catalog>, ReleaseServer) {
    hotswap::test_utils::init_test_logging(None);

    let data_file = fixture.write().unwrap();
    let catalog = Arc::new(Catalog::load(&data_file).await.unwrap());
    let server = ReleaseServer::start(Arc::clone(&catalog), "127.0.0.1:0")
        .await
        .unwrap();
    (catalog, server)
}
