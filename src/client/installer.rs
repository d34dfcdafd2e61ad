use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::client::ClientContext;
use crate::client::config::InstallPolicy;
use crate::client::swap::{BinarySwap, with_suffix};
use crate::core::HotswapError;
use crate::release::ReleaseInfo;
use crate::verification::ChecksumVerifier;

/// Suffix of the staging file the download is written to.
pub const STAGED_SUFFIX: &str = ".new_release";

/// What the download step wrote to disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StagedPayload {
    /// Bytes written to the staging file.
    pub bytes_written: u64,
    /// `Content-Length` announced by the server, if any.
    pub content_length: Option<u64>,
}

/// Downloads a release, verifies it and swaps it in for the running binary.
///
/// The installer only touches two paths besides the executable itself: the
/// staging file `<exe>.new_release` and the backup `<exe>.bak`. The staging
/// file never outlives a cycle; it is removed after a successful swap and
/// after any failure.
pub struct Installer {
    ctx: Arc<ClientContext>,
    http: reqwest::Client,
    policy: InstallPolicy,
    swap: BinarySwap,
    staged_path: PathBuf,
}

impl Installer {
    /// Create an installer for the executable described by `ctx`.
    #[must_use]
    pub fn new(ctx: Arc<ClientContext>, http: reqwest::Client, policy: InstallPolicy) -> Self {
        let swap = BinarySwap::new(ctx.self_path.clone());
        let staged_path = with_suffix(&ctx.self_path, STAGED_SUFFIX);
        Self {
            ctx,
            http,
            policy,
            swap,
            staged_path,
        }
    }

    /// Where downloads are staged.
    #[must_use]
    pub fn staged_path(&self) -> &Path {
        &self.staged_path
    }

    /// The swap used for the executable, for rollback.
    #[must_use]
    pub const fn swap(&self) -> &BinarySwap {
        &self.swap
    }

    /// `{server}/api/releases/{platform}/{version}`
    ///
    /// The exact version from the metadata is requested rather than `latest`,
    /// so a rotation between the check and the download cannot hand over a
    /// payload that does not match the checksum.
    #[must_use]
    pub fn download_url(&self, release: &ReleaseInfo) -> String {
        format!(
            "{}/api/releases/{}/{}",
            self.ctx.server_url, release.platform, release.version
        )
    }

    /// Download, verify and swap in `release`.
    ///
    /// # Errors
    ///
    /// Any download, verification or swap failure. The running executable is
    /// unchanged (or restored from backup) and the staging file is gone.
    pub async fn install(&self, release: &ReleaseInfo) -> Result<()> {
        let result = self.stage_and_swap(release).await;
        self.remove_staged().await;

        if result.is_ok() {
            info!(
                "Installed version {} at {:?} (previous binary at {:?})",
                release.version,
                self.ctx.self_path,
                self.swap.backup_path()
            );
        }
        result
    }

    async fn stage_and_swap(&self, release: &ReleaseInfo) -> Result<()> {
        let staged = self.download(release).await?;
        self.verify(release, staged).await?;
        self.swap.swap_in(&self.staged_path).await
    }

    /// Stream the payload for `release` into the staging file.
    ///
    /// # Errors
    ///
    /// [`HotswapError::ServerStatus`] on a non-200 answer, or any network or
    /// file error while writing.
    pub async fn download(&self, release: &ReleaseInfo) -> Result<StagedPayload> {
        let url = self.download_url(release);
        info!("Downloading version {} from {url}", release.version);

        let mut response = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to request {url}"))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(HotswapError::ServerStatus {
                url,
                status: status.as_u16(),
            }
            .into());
        }
        let content_length = response.content_length();

        let mut file = fs::File::create(&self.staged_path)
            .await
            .with_context(|| format!("Failed to create {}", self.staged_path.display()))?;

        let mut bytes_written: u64 = 0;
        while let Some(chunk) = response
            .chunk()
            .await
            .context("Failed while reading release download")?
        {
            file.write_all(&chunk)
                .await
                .context("Failed to write release download")?;
            bytes_written += chunk.len() as u64;
        }
        file.flush().await?;
        file.sync_all().await?;

        debug!("Wrote {bytes_written} bytes to {:?}", self.staged_path);
        Ok(StagedPayload {
            bytes_written,
            content_length,
        })
    }

    /// Check the staged file before it is allowed near the executable.
    ///
    /// # Errors
    ///
    /// [`HotswapError::PayloadTooSmall`], [`HotswapError::SizeMismatch`],
    /// [`HotswapError::ChecksumMismatch`] or [`HotswapError::SelfTestFailed`].
    pub async fn verify(&self, release: &ReleaseInfo, staged: StagedPayload) -> Result<()> {
        let path = self.staged_path.display().to_string();

        if staged.bytes_written < self.policy.min_size {
            return Err(HotswapError::PayloadTooSmall {
                path,
                size: staged.bytes_written,
                minimum: self.policy.min_size,
            }
            .into());
        }

        if let Some(expected) = staged.content_length {
            if expected != staged.bytes_written {
                return Err(HotswapError::SizeMismatch {
                    path,
                    expected,
                    actual: staged.bytes_written,
                }
                .into());
            }
        }

        if self.policy.verify_checksum {
            if ChecksumVerifier::is_verifiable(&release.checksum) {
                ChecksumVerifier::verify_checksum(&self.staged_path, &release.checksum).await?;
            } else {
                warn!(
                    "Release {} has no verifiable checksum ('{}'); installing unverified",
                    release.version, release.checksum
                );
            }
        }

        if self.policy.self_test {
            self.self_test().await?;
        }

        Ok(())
    }

    /// Run the staged binary with `--test` and require a clean exit.
    async fn self_test(&self) -> Result<()> {
        let fail = |reason: String| HotswapError::SelfTestFailed {
            path: self.staged_path.display().to_string(),
            reason,
        };

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.staged_path, std::fs::Permissions::from_mode(0o755))
                .await
                .context("Failed to mark staged release executable")?;
        }

        info!("Running self-test of {:?}", self.staged_path);
        let mut command = tokio::process::Command::new(&self.staged_path);
        command
            .arg("--test")
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true);

        let timeout = Duration::from_secs(self.policy.self_test_timeout_secs);
        let status = match tokio::time::timeout(timeout, command.status()).await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => return Err(fail(e.to_string()).into()),
            Err(_) => return Err(fail(format!("no exit within {}s", timeout.as_secs())).into()),
        };

        if !status.success() {
            return Err(fail(status.to_string()).into());
        }
        Ok(())
    }

    async fn remove_staged(&self) {
        if !fs::try_exists(&self.staged_path).await.unwrap_or(false) {
            return;
        }
        if let Err(e) = fs::remove_file(&self.staged_path).await {
            warn!("Failed to remove staged file {:?}: {e}", self.staged_path);
        }
    }
}
