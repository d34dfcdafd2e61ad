//! In-memory release catalog
//!
//! The catalog is loaded once from the server's JSON data file and is the
//! single source of truth afterwards. Tag mutations happen in place and are
//! never written back, so restarting the server resets every tag to the file
//! contents (and the rotation reseeds from the current minute).
//!
//! # Data file
//!
//! ```json
//! {
//!   "Releases": [
//!     { "File": "app_odd_linux",  "Platform": "linux", "Md5": "", "Tags": ["odd"],  "Version": "1.3" },
//!     { "File": "app_even_linux", "Platform": "linux", "Md5": "", "Tags": ["even"], "Version": "1.2" }
//!   ]
//! }
//! ```
//!
//! `File` paths are resolved relative to the directory holding the data file.
//!
//! # Concurrency
//!
//! Releases sit behind a [`RwLock`]. Lookups hold the read guard only while
//! scanning; [`Catalog::move_tag`] holds one write guard across the
//! remove/add pair so a concurrent reader never sees a half-rotated tag set.

pub mod rotation;


use crate::core::HotswapError;
use crate::platform::Platform;
use crate::release::{Release, VersionQuery};
use crate::verification::ChecksumVerifier;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

/// File name looked up when `--app-data` points at a directory.
pub const DATA_FILE_NAME: &str = "appData.json";

/// Top-level shape of the data file.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AppData {
    /// Every known release, in lookup order.
    #[serde(default, alias = "releases")]
    pub releases: Vec<Release>,
}

/// The server's collection of releases.
#[derive(Debug)]
pub struct Catalog {
    releases: RwLock<Vec<Release>>,
    /// Directory that relative payload paths are resolved against.
    base_dir: PathBuf,
}

impl Catalog {
    /// Build a catalog from records already in memory.
    #[must_use]
    pub fn new(releases: Vec<Release>, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            releases: RwLock::new(releases),
            base_dir: base_dir.into(),
        }
    }

    /// Resolve the `--app-data` argument to the data file path.
    ///
    /// A directory means "the `appData.json` inside it".
    #[must_use]
    pub fn data_file_path(app_data: &Path) -> PathBuf {
        if app_data.is_dir() {
            app_data.join(DATA_FILE_NAME)
        } else {
            app_data.to_path_buf()
        }
    }

    /// Load the catalog from the data file and compute payload checksums.
    ///
    /// Payloads that cannot be read keep an empty checksum; they are still
    /// listed (their metadata is valid) but downloading them will fail.
    ///
    /// # Errors
    ///
    /// Returns [`HotswapError::CatalogLoad`] when the data file is missing or
    /// is not valid JSON of the expected shape.
    pub async fn load(app_data: &Path) -> Result<Self, HotswapError> {
        let path = Self::data_file_path(app_data);
        let load_error = |reason: String| HotswapError::CatalogLoad {
            path: path.display().to_string(),
            reason,
        };

        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| load_error(e.to_string()))?;
        let data: AppData = serde_json::from_str(&content).map_err(|e| load_error(e.to_string()))?;

        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let mut releases = data.releases;

        for release in &mut releases {
            let payload = resolve_payload(&base_dir, release);
            match ChecksumVerifier::compute_sha256(&payload).await {
                Ok(checksum) => release.checksum = checksum,
                Err(e) => warn!(
                    "No checksum for {} {} ({}): {e:#}",
                    release.platform,
                    release.version,
                    payload.display()
                ),
            }
        }

        info!("Loaded info for {} releases from {}", releases.len(), path.display());
        Ok(Self::new(releases, base_dir))
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Release>> {
        self.releases.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Release>> {
        self.releases.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Find the release answering `query` for `platform`.
    ///
    /// The first match in stored order wins. More than one match is a
    /// data-authoring problem and is not reported.
    ///
    /// # Errors
    ///
    /// Returns [`HotswapError::ReleaseNotFound`] when nothing matches,
    /// including the transient "no `latest` right now" state.
    pub fn lookup(&self, platform: Platform, query: &VersionQuery) -> Result<Release, HotswapError> {
        self.read()
            .iter()
            .find(|release| release.matches(platform, query))
            .cloned()
            .ok_or_else(|| HotswapError::ReleaseNotFound {
                platform: platform.to_string(),
                version: query.to_string(),
            })
    }

    /// Add `tag` to every release carrying `having` that lacks it.
    ///
    /// Returns the number of releases changed; a repeated call returns 0.
    pub fn add_tag(&self, tag: &str, having: &str) -> usize {
        add_tag_in(&mut self.write(), tag, having)
    }

    /// Remove `tag` from every release carrying both `tag` and `having`.
    ///
    /// Returns the number of releases changed; a repeated call returns 0.
    pub fn remove_tag(&self, tag: &str, having: &str) -> usize {
        remove_tag_in(&mut self.write(), tag, having)
    }

    /// Move `tag` from the releases carrying `from` to those carrying `to`.
    ///
    /// Demotes first, then promotes, under a single write guard. Returns
    /// `(removed, added)` counts.
    pub fn move_tag(&self, tag: &str, from: &str, to: &str) -> (usize, usize) {
        let mut releases = self.write();
        let removed = remove_tag_in(&mut releases, tag, from);
        let added = add_tag_in(&mut releases, tag, to);
        (removed, added)
    }

    /// Clone of every release, for logging and tests.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Release> {
        self.read().clone()
    }

    /// Number of releases.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether the catalog has no releases.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Absolute (or base-relative) location of a release's payload.
    #[must_use]
    pub fn payload_path(&self, release: &Release) -> PathBuf {
        resolve_payload(&self.base_dir, release)
    }
}

fn resolve_payload(base_dir: &Path, release: &Release) -> PathBuf {
    base_dir.join(&release.file)
}

fn add_tag_in(releases: &mut [Release], tag: &str, having: &str) -> usize {
    let mut updated = 0;
    for release in releases.iter_mut() {
        if release.has_tag(having) && !release.has_tag(tag) {
            debug!("add_tag: adding '{tag}' to {}", release.file);
            release.tags.insert(tag.to_string());
            updated += 1;
        }
    }
    info!("add_tag: updated {updated} releases");
    updated
}

fn remove_tag_in(releases: &mut [Release], tag: &str, having: &str) -> usize {
    let mut updated = 0;
    for release in releases.iter_mut() {
        if release.has_tag(having) && release.has_tag(tag) {
            debug!("remove_tag: removing '{tag}' from {}", release.file);
            release.tags.remove(tag);
            updated += 1;
        }
    }
    info!("remove_tag: updated {updated} releases");
    updated
}
