use std::sync::Arc;
use tracing::{debug, info};

use crate::client::ClientContext;
use crate::core::HotswapError;
use crate::release::{ReleaseInfo, VersionQuery};

/// Result of one update check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateDecision {
    /// The server's latest release is the version already running.
    UpToDate(ReleaseInfo),
    /// The server's latest release differs from the running version.
    ///
    /// Older versions count: cohort rotation moves clients in both directions.
    Available(ReleaseInfo),
}

/// Asks the release server what is latest for this client's platform.
///
/// The checker never retries. A failed request surfaces as an error and the
/// caller abandons the cycle; the next poll tick is the retry.
///
/// # Examples
///
/// ```rust,no_run
/// use hotswap::client::{ClientContext, checker::{UpdateChecker, UpdateDecision}};
/// use std::sync::Arc;
///
/// # async fn example() -> anyhow::Result<()> {
/// let ctx = Arc::new(ClientContext::from_environment("http://localhost:3000")?);
/// let checker = UpdateChecker::new(ctx, reqwest::Client::new());
///
/// match checker.check().await? {
///     UpdateDecision::UpToDate(_) => println!("nothing to do"),
///     UpdateDecision::Available(release) => println!("would install {}", release.version),
/// }
/// # Ok(())
/// # }
/// ```
pub struct UpdateChecker {
    ctx: Arc<ClientContext>,
    http: reqwest::Client,
}

impl UpdateChecker {
    /// Create a checker sharing the client's HTTP connection pool.
    #[must_use]
    pub const fn new(ctx: Arc<ClientContext>, http: reqwest::Client) -> Self {
        Self { ctx, http }
    }

    /// `{server}/api/releases/{platform}/{version}/info`
    #[must_use]
    pub fn info_url(&self, query: &VersionQuery) -> String {
        format!(
            "{}/api/releases/{}/{}/info",
            self.ctx.server_url, self.ctx.platform, query
        )
    }

    /// Fetch release metadata from the server.
    ///
    /// # Errors
    ///
    /// - [`HotswapError::HttpError`] on connection failure or undecodable JSON
    /// - [`HotswapError::ServerStatus`] on any status other than 200
    pub async fn fetch_release_info(&self, query: &VersionQuery) -> Result<ReleaseInfo, HotswapError> {
        let url = self.info_url(query);
        debug!("Checking for updates at {url}");

        let response = self.http.get(&url).send().await?;
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(HotswapError::ServerStatus {
                url,
                status: status.as_u16(),
            });
        }

        Ok(response.json::<ReleaseInfo>().await?)
    }

    /// Compare the server's latest release with the running version.
    ///
    /// Emits exactly one `info` line per successful poll.
    ///
    /// # Errors
    ///
    /// Propagates [`fetch_release_info`](Self::fetch_release_info) failures.
    pub async fn check(&self) -> Result<UpdateDecision, HotswapError> {
        let latest = self.fetch_release_info(&VersionQuery::Latest).await?;

        if latest.version == self.ctx.current_version {
            info!(
                "This is version {} for {}; already latest (checksum={})",
                self.ctx.current_version, self.ctx.platform, latest.checksum
            );
            Ok(UpdateDecision::UpToDate(latest))
        } else {
            info!(
                "This is version {} for {}; latest version={} checksum={} md5={}",
                self.ctx.current_version,
                self.ctx.platform,
                latest.version,
                latest.checksum,
                latest.md5
            );
            Ok(UpdateDecision::Available(latest))
        }
    }
}
