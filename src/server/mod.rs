//! HTTP release server
//!
//! A thin axum front-end over the [`Catalog`]. All decisions (validation,
//! selection, rotation) live in the catalog and [`handlers`]; this module
//! only wires routes, binds the listener and owns the background tasks.
//!
//! ## Endpoints
//!
//! - `GET /` - short HTML description of the API
//! - `GET /api/releases/{platform}/{version}/info` - release metadata (JSON)
//! - `GET /api/releases/{platform}/{version}` - release payload (octet-stream)
//!
//! Anything else gets the HTML not-found page.

pub mod handlers;

use crate::catalog::Catalog;
use crate::catalog::rotation::TagRotator;
use crate::core::HotswapError;
use anyhow::{Context, Result};
use axum::Router;
use axum::routing::get;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Runtime settings for the release server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind.
    pub host: String,
    /// TCP port to listen on; `0` picks a free port.
    pub port: u16,
    /// Data file, or a directory containing `appData.json`.
    pub app_data: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            app_data: PathBuf::from("./data/appData.json"),
        }
    }
}

impl ServerConfig {
    /// Socket address string handed to the listener.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Shared state for axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// The catalog shared with the tag rotator.
    pub catalog: Arc<Catalog>,
}

/// Build the router over a catalog.
pub fn router(catalog: Arc<Catalog>) -> Router {
    Router::new()
        .route("/", get(handlers::api_info_page))
        .route(
            "/api/releases/{platform}/{version}/info",
            get(handlers::release_info),
        )
        .route(
            "/api/releases/{platform}/{version}",
            get(handlers::download_release),
        )
        .fallback(handlers::not_found)
        .method_not_allowed_fallback(handlers::not_found)
        .with_state(AppState { catalog })
}

/// A running release server.
pub struct ReleaseServer {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl ReleaseServer {
    /// Bind `bind_addr` and serve `catalog` from a background task.
    ///
    /// # Errors
    ///
    /// Returns [`HotswapError::IoError`] if the listener cannot bind.
    pub async fn start(catalog: Arc<Catalog>, bind_addr: &str) -> Result<Self, HotswapError> {
        let listener = TcpListener::bind(bind_addr).await?;
        let addr = listener.local_addr()?;
        if catalog.is_empty() {
            warn!("Catalog has no releases; every release request will answer 404");
        } else {
            info!("Serving {} releases", catalog.len());
        }
        let app = router(catalog);

        info!("Release server listening on http://{addr}");

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                error!("Release server error: {e}");
            }
        });

        Ok(Self { addr, handle })
    }

    /// Address the server is listening on.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Base URL for clients, e.g. `http://127.0.0.1:3000`.
    #[must_use]
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Abort the server task.
    pub fn shutdown(&self) {
        self.handle.abort();
    }
}

impl Drop for ReleaseServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Load the catalog, seed the rotation and serve until Ctrl-C.
///
/// # Errors
///
/// Fails at startup if the data file cannot be loaded or the port cannot be
/// bound. Once serving, request-level failures never stop the server.
pub async fn run(config: ServerConfig) -> Result<()> {
    info!("Starting server with {}", config.app_data.display());

    let catalog = Arc::new(
        Catalog::load(&config.app_data)
            .await
            .context("Failed to load release catalog")?,
    );

    let mut rotator = TagRotator::new(Arc::clone(&catalog));
    rotator.rotate_now();
    let rotation = tokio::spawn(rotator.run());

    let server = ReleaseServer::start(catalog, &config.bind_addr())
        .await
        .with_context(|| format!("Couldn't start server on {}", config.bind_addr()))?;

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    info!("Shutting down release server");
    rotation.abort();
    server.shutdown();
    Ok(())
}
