//! Supported target platforms and platform capability checks
//!
//! Releases are keyed by a small fixed set of operating system identifiers.
//! The identifiers match the path segment used by the release API
//! (`/api/releases/{platform}/...`) and the `Platform` field of the data file.
//!
//! | Platform  | Identifier | Restart strategy |
//! |-----------|------------|------------------|
//! | Linux     | `linux`    | exec             |
//! | macOS     | `darwin`   | exec             |
//! | Windows   | `windows`  | spawn and exit   |

use crate::core::HotswapError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Operating systems the release server publishes builds for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Linux builds
    Linux,
    /// macOS builds
    Darwin,
    /// Windows builds
    Windows,
}

impl Platform {
    /// Every supported platform, in the order used by the validation pattern.
    pub const ALL: [Self; 3] = [Self::Linux, Self::Darwin, Self::Windows];

    /// Identifier used in URLs and the data file.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Linux => "linux",
            Self::Darwin => "darwin",
            Self::Windows => "windows",
        }
    }

    /// Platform of the running binary.
    ///
    /// # Errors
    ///
    /// Returns [`HotswapError::PlatformNotSupported`] when compiled for any
    /// other operating system; the client refuses to start in that case.
    pub fn current() -> Result<Self, HotswapError> {
        Self::from_os(std::env::consts::OS)
    }

    /// Map a `std::env::consts::OS` value to a platform.
    ///
    /// Rust calls macOS `macos`; the release API inherited the `darwin`
    /// spelling, so both are accepted.
    pub fn from_os(os: &str) -> Result<Self, HotswapError> {
        match os {
            "linux" => Ok(Self::Linux),
            "macos" | "darwin" => Ok(Self::Darwin),
            "windows" => Ok(Self::Windows),
            other => Err(HotswapError::PlatformNotSupported {
                os: other.to_string(),
            }),
        }
    }

    /// Whether the platform can replace the running process image in place.
    ///
    /// Windows has no `exec`; there the client spawns the new binary and exits.
    #[must_use]
    pub const fn supports_exec(self) -> bool {
        !matches!(self, Self::Windows)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = HotswapError;

    /// Parse an API identifier. Only the exact lower-case identifiers are
    /// accepted; `macos` is not an API identifier.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|p| p.as_str() == s).ok_or_else(|| {
            HotswapError::InvalidPlatform {
                value: s.to_string(),
            }
        })
    }
}
