//! Test utilities for hotswap
//!
//! Helpers shared by unit tests and the `integration` test target (which
//! enables the `test-utils` feature):
//!
//! - [`init_test_logging`] installs a tracing subscriber once per process
//! - [`LogCapture`] records formatted log lines for assertions
//! - [`release`] builds an in-memory [`Release`] record
//! - [`CatalogFixture`] writes a data file plus payload files into a temp dir
//!
//! # Example
//!
//! ```rust,no_run
//! use hotswap::platform::Platform;
//! use hotswap::test_utils::CatalogFixture;
//!
//! # fn example() -> std::io::Result<()> {
//! let fixture = CatalogFixture::new()?
//!     .with_release(Platform::Linux, "1.0", &["odd"], b"old build")?
//!     .with_release(Platform::Linux, "2.0", &["even"], b"new build")?;
//! let data_file = fixture.write()?;
//! # Ok(())
//! # }
//! ```

use crate::catalog::{AppData, DATA_FILE_NAME};
use crate::platform::Platform;
use crate::release::Release;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, Once, PoisonError};
use tempfile::TempDir;
use tracing::Level;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Respects `RUST_LOG` when `level` is `None`; logs nothing if neither is set.
///
/// ```bash
/// RUST_LOG=hotswap=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .try_init();
    });
}

/// In-memory log sink for asserting on what was logged.
///
/// [`install`](Self::install) scopes the capture to the current thread, which
/// covers everything a `#[tokio::test]` on the default current-thread runtime
/// logs.
///
/// ```rust,no_run
/// use hotswap::test_utils::LogCapture;
///
/// let logs = LogCapture::default();
/// let _guard = logs.install();
/// tracing::info!(target: "hotswap", "hello");
/// assert!(logs.contents().contains("hello"));
/// ```
#[derive(Clone, Default)]
pub struct LogCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    /// Capture `hotswap` logs at `info` and above until the guard drops.
    #[must_use]
    pub fn install(&self) -> DefaultGuard {
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new("hotswap=info"))
            .with_writer(self.clone())
            .with_ansi(false)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    /// Everything captured so far.
    #[must_use]
    pub fn contents(&self) -> String {
        let buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

impl Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Payload file name used by [`CatalogFixture`] for a platform/version pair.
#[must_use]
pub fn payload_file_name(platform: Platform, version: &str) -> String {
    format!("app_{platform}_{}", version.replace('.', "_"))
}

/// Build a release record with no digests.
#[must_use]
pub fn release(platform: Platform, version: &str, tags: &[&str]) -> Release {
    Release {
        file: payload_file_name(platform, version),
        platform,
        version: version.to_string(),
        md5: String::new(),
        checksum: String::new(),
        tags: tags.iter().map(|t| (*t).to_string()).collect(),
    }
}

/// A temporary server data directory.
///
/// The directory is deleted when the fixture is dropped, so keep it alive for
/// as long as a catalog or server built from it is in use.
pub struct CatalogFixture {
    dir: TempDir,
    releases: Vec<Release>,
}

impl CatalogFixture {
    /// Create an empty fixture in a fresh temp directory.
    pub fn new() -> std::io::Result<Self> {
        Ok(Self {
            dir: TempDir::new()?,
            releases: Vec::new(),
        })
    }

    /// Add a release and write its payload bytes next to the data file.
    pub fn with_release(
        mut self,
        platform: Platform,
        version: &str,
        tags: &[&str],
        payload: &[u8],
    ) -> std::io::Result<Self> {
        let record = release(platform, version, tags);
        std::fs::write(self.dir.path().join(&record.file), payload)?;
        self.releases.push(record);
        Ok(self)
    }

    /// Write the data file and return its path.
    pub fn write(&self) -> std::io::Result<PathBuf> {
        let data = AppData {
            releases: self.releases.clone(),
        };
        let json = serde_json::to_string_pretty(&data)?;
        let path = self.dir.path().join(DATA_FILE_NAME);
        std::fs::write(&path, json)?;
        Ok(path)
    }

    /// Directory holding the data file and payloads.
    #[must_use]
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }
}
