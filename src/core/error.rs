//! Error handling for hotswap
//!
//! Two layers, mirroring how the rest of the crate reports failures:
//!
//! 1. [`HotswapError`] is the strongly-typed enum returned by library code for
//!    every failure mode that a caller may want to branch on (a missing
//!    release, a checksum mismatch, a failed restart).
//! 2. [`ErrorContext`] wraps an error with a suggestion and details for the
//!    terminal user. The binaries funnel their top-level [`anyhow::Error`]
//!    through [`user_friendly_error`] before exiting.
//!
//! # Error categories
//!
//! - **Protocol/validation**: [`HotswapError::InvalidPlatform`],
//!   [`HotswapError::InvalidVersion`], [`HotswapError::ReleaseNotFound`].
//!   The server answers these with a 404 page and keeps running.
//! - **Transient network**: [`HotswapError::ServerStatus`],
//!   [`HotswapError::HttpError`]. The client abandons the cycle and the next
//!   poll tick is the retry.
//! - **Payload integrity**: [`HotswapError::ChecksumMismatch`],
//!   [`HotswapError::PayloadTooSmall`], [`HotswapError::SizeMismatch`],
//!   [`HotswapError::SelfTestFailed`]. The staged file is discarded before
//!   the installed binary is touched.
//! - **Local I/O and restart**: [`HotswapError::IoError`],
//!   [`HotswapError::Restart`]. The old binary (or old process image) stays
//!   active.
//! - **Startup**: [`HotswapError::PlatformNotSupported`],
//!   [`HotswapError::CatalogLoad`]. These are the only fatal ones.
//!
//! # Examples
//!
//! ```rust,no_run
//! use hotswap::core::{HotswapError, user_friendly_error};
//!
//! let err = HotswapError::ReleaseNotFound {
//!     platform: "darwin".to_string(),
//!     version: "9.9".to_string(),
//! };
//! let ctx = user_friendly_error(anyhow::Error::from(err));
//! ctx.display();
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The main error type for hotswap operations.
#[derive(Error, Debug)]
pub enum HotswapError {
    /// No release matched the requested platform and version.
    ///
    /// For `latest` this is a normal, transient condition: the rotation
    /// demotes one cohort before promoting the other, and a platform with no
    /// release in the target cohort has no `latest` at all.
    #[error("No release found for platform '{platform}' and version '{version}'")]
    ReleaseNotFound {
        /// Requested platform identifier
        platform: String,
        /// Requested version, or `latest`
        version: String,
    },

    /// The platform parameter is not one of the supported identifiers.
    #[error("Validation failed for platform '{value}': must be one of linux, darwin, windows")]
    InvalidPlatform {
        /// The rejected value
        value: String,
    },

    /// The version parameter is neither `<digits>.<digits>` nor `latest`.
    #[error("Validation failed for version '{value}': must be x.y or 'latest'")]
    InvalidVersion {
        /// The rejected value
        value: String,
    },

    /// The client was built for an operating system the server does not serve.
    #[error("Platform '{os}' is not supported by the release server")]
    PlatformNotSupported {
        /// Value of `std::env::consts::OS`
        os: String,
    },

    /// The release server answered with a non-200 status.
    #[error("Unexpected response status {status} from {url}")]
    ServerStatus {
        /// Requested URL
        url: String,
        /// HTTP status code received
        status: u16,
    },

    /// The staged payload does not match the checksum advertised by the server.
    #[error("Checksum verification failed for {path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Staged file
        path: String,
        /// Checksum from the release metadata
        expected: String,
        /// Checksum computed from the staged bytes
        actual: String,
    },

    /// The staged payload is smaller than the configured minimum.
    #[error("Downloaded release {path} is {size} bytes, below the minimum of {minimum}")]
    PayloadTooSmall {
        /// Staged file
        path: String,
        /// Bytes written
        size: u64,
        /// Minimum accepted size
        minimum: u64,
    },

    /// Fewer (or more) bytes were written than the server announced.
    #[error("Downloaded release {path} has {actual} bytes but Content-Length was {expected}")]
    SizeMismatch {
        /// Staged file
        path: String,
        /// Announced `Content-Length`
        expected: u64,
        /// Bytes written
        actual: u64,
    },

    /// The dry run of the staged binary did not exit successfully.
    #[error("Self-test of {path} failed: {reason}")]
    SelfTestFailed {
        /// Staged file
        path: String,
        /// Exit status or launch error
        reason: String,
    },

    /// The server data file could not be read or parsed.
    #[error("Failed to load release catalog from {path}: {reason}")]
    CatalogLoad {
        /// Data file path
        path: String,
        /// Underlying failure
        reason: String,
    },

    /// Handing control to the new binary failed; the old process keeps running.
    #[error("Failed to restart {path}: {reason}")]
    Restart {
        /// Executable that was supposed to take over
        path: String,
        /// Underlying failure
        reason: String,
    },

    /// I/O error from [`std::io::Error`].
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Transport error from [`reqwest::Error`].
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
}

impl HotswapError {
    /// Whether this error is cleared by simply waiting for the next poll tick.
    ///
    /// [`client::failure_level`](crate::client::failure_level) logs these at
    /// `info` and everything else at `warn`.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ServerStatus { .. } | Self::HttpError(_) | Self::ReleaseNotFound { .. }
        )
    }
}

/// Error wrapper carrying a user-facing suggestion and details.
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: HotswapError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context with no suggestion or details.
    #[must_use]
    pub const fn new(error: HotswapError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error.
    ///
    /// Suggestions are actionable steps, displayed in green.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add details explaining the error, displayed in yellow.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error context to stderr with terminal colors.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error into an [`ErrorContext`] with a suggestion where one is known.
///
/// [`HotswapError`] values are recognised anywhere in the error chain, so
/// errors wrapped with `.context(...)` still get a tailored suggestion. The
/// outer context messages end up in `details`.
///
/// # Examples
///
/// ```rust,no_run
/// use hotswap::core::user_friendly_error;
///
/// let err = anyhow::anyhow!("something broke");
/// let ctx = user_friendly_error(err);
/// assert!(ctx.to_string().contains("something broke"));
/// ```
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    let outer: Vec<String> = error
        .chain()
        .take_while(|cause| cause.downcast_ref::<HotswapError>().is_none())
        .map(ToString::to_string)
        .collect();

    if let Some(typed) = rebuild(&error) {
        let mut ctx = create_error_context(typed);
        if !outer.is_empty() && ctx.details.is_none() {
            ctx.details = Some(outer.join(": "));
        }
        return ctx;
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        let kind = io_error.kind();
        let ctx = ErrorContext::new(HotswapError::IoError(std::io::Error::new(
            kind,
            error.to_string(),
        )));
        return match kind {
            std::io::ErrorKind::PermissionDenied => ctx.with_suggestion(
                "Check that the executable's directory is writable by the current user",
            ),
            std::io::ErrorKind::NotFound => {
                ctx.with_suggestion("Check that the file or directory exists and the path is correct")
            }
            std::io::ErrorKind::AddrInUse => {
                ctx.with_suggestion("Another process is using the port; pick a different one with --port")
            }
            _ => ctx,
        };
    }

    let chain: Vec<String> = error.chain().skip(1).map(ToString::to_string).collect();
    let ctx = ErrorContext::new(HotswapError::IoError(std::io::Error::other(error.to_string())));
    if chain.is_empty() {
        ctx
    } else {
        ctx.with_details(chain.join(": "))
    }
}

/// Recreate an owned [`HotswapError`] from the first matching cause in the chain.
///
/// The source-carrying variants (`IoError`, `HttpError`) cannot be cloned, so
/// they are rebuilt from their display text.
fn rebuild(error: &anyhow::Error) -> Option<HotswapError> {
    let found = error.chain().find_map(|cause| cause.downcast_ref::<HotswapError>())?;
    Some(match found {
        HotswapError::ReleaseNotFound { platform, version } => HotswapError::ReleaseNotFound {
            platform: platform.clone(),
            version: version.clone(),
        },
        HotswapError::InvalidPlatform { value } => HotswapError::InvalidPlatform {
            value: value.clone(),
        },
        HotswapError::InvalidVersion { value } => HotswapError::InvalidVersion {
            value: value.clone(),
        },
        HotswapError::PlatformNotSupported { os } => HotswapError::PlatformNotSupported {
            os: os.clone(),
        },
        HotswapError::ServerStatus { url, status } => HotswapError::ServerStatus {
            url: url.clone(),
            status: *status,
        },
        HotswapError::ChecksumMismatch {
            path,
            expected,
            actual,
        } => HotswapError::ChecksumMismatch {
            path: path.clone(),
            expected: expected.clone(),
            actual: actual.clone(),
        },
        HotswapError::PayloadTooSmall {
            path,
            size,
            minimum,
        } => HotswapError::PayloadTooSmall {
            path: path.clone(),
            size: *size,
            minimum: *minimum,
        },
        HotswapError::SizeMismatch {
            path,
            expected,
            actual,
        } => HotswapError::SizeMismatch {
            path: path.clone(),
            expected: *expected,
            actual: *actual,
        },
        HotswapError::SelfTestFailed { path, reason } => HotswapError::SelfTestFailed {
            path: path.clone(),
            reason: reason.clone(),
        },
        HotswapError::CatalogLoad { path, reason } => HotswapError::CatalogLoad {
            path: path.clone(),
            reason: reason.clone(),
        },
        HotswapError::Restart { path, reason } => HotswapError::Restart {
            path: path.clone(),
            reason: reason.clone(),
        },
        HotswapError::IoError(e) => HotswapError::IoError(std::io::Error::new(e.kind(), e.to_string())),
        other @ HotswapError::HttpError(_) => {
            HotswapError::IoError(std::io::Error::other(other.to_string()))
        }
    })
}

/// Attach the suggestion and details that fit a specific error variant.
fn create_error_context(error: HotswapError) -> ErrorContext {
    match &error {
        HotswapError::PlatformNotSupported { .. } => ErrorContext::new(error)
            .with_suggestion("Build the client for linux, darwin (macOS) or windows")
            .with_details("Release lookups are keyed by platform; other targets have no releases"),
        HotswapError::CatalogLoad { .. } => ErrorContext::new(error)
            .with_suggestion("Check the --app-data path and that the file is valid JSON of the form {\"Releases\": [...]}")
            .with_details("The catalog is read once at startup and never rewritten"),
        HotswapError::ServerStatus { .. } | HotswapError::HttpError(_) => ErrorContext::new(error)
            .with_suggestion("Check that the release server is running and reachable at the --server URL"),
        HotswapError::ChecksumMismatch { .. }
        | HotswapError::PayloadTooSmall { .. }
        | HotswapError::SizeMismatch { .. } => ErrorContext::new(error)
            .with_suggestion("Regenerate the server data file so digests match the payload files")
            .with_details("The installed binary was not touched"),
        HotswapError::Restart { .. } => ErrorContext::new(error)
            .with_suggestion("Restart the application manually to pick up the new binary")
            .with_details("The binary on disk is already updated; the running process is the previous version"),
        _ => ErrorContext::new(error),
    }
}
