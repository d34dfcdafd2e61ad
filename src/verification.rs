use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::fs;
use tracing::{debug, info};

use crate::core::HotswapError;

/// Prefix identifying the digest algorithm in checksum strings.
pub const SHA256_PREFIX: &str = "sha256:";

/// SHA256 digests for release payloads.
///
/// The server computes a digest for every payload when the catalog loads and
/// publishes it in the release metadata; the client recomputes it over the
/// staged download before swapping binaries. Checksums are formatted as
/// `sha256:<lower-case hex>`.
pub struct ChecksumVerifier;

impl ChecksumVerifier {
    /// Compute the SHA256 checksum of in-memory bytes.
    #[must_use]
    pub fn sha256_of(bytes: &[u8]) -> String {
        let digest = Sha256::digest(bytes);
        format!("{SHA256_PREFIX}{}", hex::encode(digest))
    }

    /// Compute the SHA256 checksum of a file.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use hotswap::verification::ChecksumVerifier;
    /// use std::path::Path;
    ///
    /// # async fn example() -> anyhow::Result<()> {
    /// let checksum = ChecksumVerifier::compute_sha256(Path::new("/srv/releases/app_odd_linux")).await?;
    /// println!("{checksum}");
    /// # Ok(())
    /// # }
    /// ```
    pub async fn compute_sha256(file_path: &Path) -> Result<String> {
        debug!("Computing SHA256 checksum for: {:?}", file_path);

        let contents = fs::read(file_path)
            .await
            .with_context(|| format!("Failed to read file: {file_path:?}"))?;

        Ok(Self::sha256_of(&contents))
    }

    /// Whether `checksum` is in a format this verifier can check.
    ///
    /// Empty strings (server could not read the payload) and digests from
    /// other algorithms are not verifiable; the installer logs and skips them.
    #[must_use]
    pub fn is_verifiable(checksum: &str) -> bool {
        checksum
            .get(..SHA256_PREFIX.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(SHA256_PREFIX))
            && checksum.len() > SHA256_PREFIX.len()
    }

    /// Verify a file against an expected `sha256:` checksum.
    ///
    /// Comparison is case-insensitive.
    ///
    /// # Errors
    ///
    /// Returns [`HotswapError::ChecksumMismatch`] (wrapped in [`anyhow::Error`])
    /// when the digests differ, or an I/O error when the file cannot be read.
    pub async fn verify_checksum(file_path: &Path, expected_checksum: &str) -> Result<()> {
        info!("Verifying checksum for: {:?}", file_path);

        let actual_checksum = Self::compute_sha256(file_path).await?;

        if !actual_checksum.eq_ignore_ascii_case(expected_checksum) {
            return Err(HotswapError::ChecksumMismatch {
                path: file_path.display().to_string(),
                expected: expected_checksum.to_string(),
                actual: actual_checksum,
            }
            .into());
        }

        info!("Checksum verification successful");
        Ok(())
    }
}
