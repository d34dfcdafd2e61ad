//! Route handlers for the release API
//!
//! Every release route funnels through [`validate_and_get_release`], so a bad
//! platform, a bad version and an unknown release are indistinguishable to
//! the caller: all three get the 404 page.

use super::AppState;
use crate::catalog::Catalog;
use crate::core::HotswapError;
use crate::platform::Platform;
use crate::release::{Release, ReleaseInfo, VersionQuery};
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Json, Response};
use tracing::{debug, error, info};

const API_INFO_HTML: &str = r#"<html>
<head><title>Releases Server</title></head>
<body>
<h1>Releases Server</h1>
<ul>
<li><code>GET /api/releases/{platform}/{version}/info</code> - release metadata as JSON</li>
<li><code>GET /api/releases/{platform}/{version}</code> - release binary</li>
</ul>
<p><code>platform</code> is one of linux, darwin, windows. <code>version</code> is x.y or latest.</p>
</body>
</html>"#;

const NOT_FOUND_HTML: &str = r#"<html>
<head><title>Not found!</title></head>
<body>
Not found! See <a href="/">docs</a> for help.
</body>
</html>"#;

const SERVER_ERROR_TEXT: &str = "Oh no! An error occurred on our end. Maybe try again later?";

/// Validate raw path parameters and look the release up.
///
/// # Errors
///
/// [`HotswapError::InvalidPlatform`], [`HotswapError::InvalidVersion`] or
/// [`HotswapError::ReleaseNotFound`].
pub fn validate_and_get_release(
    catalog: &Catalog,
    platform_param: &str,
    version_param: &str,
) -> Result<Release, HotswapError> {
    let platform: Platform = platform_param.parse()?;
    let query: VersionQuery = version_param.parse()?;
    catalog.lookup(platform, &query)
}

/// `GET /api/releases/{platform}/{version}/info`
pub async fn release_info(
    State(state): State<AppState>,
    Path((platform, version)): Path<(String, String)>,
) -> Response {
    match validate_and_get_release(&state.catalog, &platform, &version) {
        Ok(release) => {
            info!(
                "sending release info: platform={} version={}",
                release.platform, release.version
            );
            Json(ReleaseInfo::from(&release)).into_response()
        }
        Err(e) => {
            debug!("release_info: {e}");
            not_found_page()
        }
    }
}

/// `GET /api/releases/{platform}/{version}`
pub async fn download_release(
    State(state): State<AppState>,
    Path((platform, version)): Path<(String, String)>,
) -> Response {
    let release = match validate_and_get_release(&state.catalog, &platform, &version) {
        Ok(release) => release,
        Err(e) => {
            debug!("download_release: {e}");
            return not_found_page();
        }
    };

    let payload = state.catalog.payload_path(&release);
    match tokio::fs::read(&payload).await {
        Ok(bytes) => {
            info!(
                "sending release {} {} ({} bytes)",
                release.platform,
                release.version,
                bytes.len()
            );
            (
                [
                    (header::CONTENT_TYPE, "application/octet-stream".to_string()),
                    (header::CONTENT_LENGTH, bytes.len().to_string()),
                ],
                bytes,
            )
                .into_response()
        }
        Err(e) => {
            error!("Error reading release file {}: {e}", payload.display());
            (StatusCode::INTERNAL_SERVER_ERROR, SERVER_ERROR_TEXT).into_response()
        }
    }
}

/// `GET /`
pub async fn api_info_page() -> Html<&'static str> {
    Html(API_INFO_HTML)
}

/// Fallback for every unmatched route or method.
pub async fn not_found() -> Response {
    not_found_page()
}

fn not_found_page() -> Response {
    (StatusCode::NOT_FOUND, Html(NOT_FOUND_HTML)).into_response()
}
