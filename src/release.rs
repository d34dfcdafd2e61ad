//! Release records and the release query vocabulary
//!
//! [`Release`] is one entry of the server's catalog, exactly as it appears in
//! the data file (plus the checksum computed at load time). [`ReleaseInfo`] is
//! the public view returned by the `/info` endpoint and consumed by the
//! client; it omits the server-side payload path.
//!
//! Data file keys are PascalCase (`Releases`, `File`, `Platform`, ...) but the
//! lower-case spelling produced by older data generators is accepted too.

use crate::core::HotswapError;
use crate::platform::Platform;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

/// Well-known tag names.
pub mod tag {
    /// Marks the release returned for version query `latest`.
    pub const LATEST: &str = "latest";
    /// Rotation cohort promoted on odd minutes.
    pub const ODD: &str = "odd";
    /// Rotation cohort promoted on even minutes.
    pub const EVEN: &str = "even";
}

/// `<digits>.<digits>` or the literal `latest`, anchored on both ends.
static VERSION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[0-9]+\.[0-9]+|latest)$").expect("version pattern is a valid regex")
});

/// One distributable build, as stored in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Release {
    /// Payload path, relative to the data file's directory unless absolute.
    #[serde(alias = "file")]
    pub file: String,
    /// Target operating system.
    #[serde(alias = "platform")]
    pub platform: Platform,
    /// Dotted numeric version, e.g. `1.5`.
    #[serde(alias = "version")]
    pub version: String,
    /// MD5 digest from the data file. Advisory only.
    #[serde(default, alias = "md5")]
    pub md5: String,
    /// `sha256:<hex>` digest of the payload, filled in when the catalog loads.
    #[serde(default, alias = "checksum")]
    pub checksum: String,
    /// Labels used for selection and rotation cohorts.
    #[serde(default, alias = "tags", deserialize_with = "tags_or_null")]
    pub tags: BTreeSet<String>,
}

impl Release {
    /// Whether this release carries `tag`.
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    /// Whether this release answers `query` for `platform`.
    #[must_use]
    pub fn matches(&self, platform: Platform, query: &VersionQuery) -> bool {
        self.platform == platform
            && match query {
                VersionQuery::Latest => self.has_tag(tag::LATEST),
                VersionQuery::Exact(version) => self.version == *version,
            }
    }
}

/// Go-style data files write `null` for an empty tag list.
fn tags_or_null<'de, D>(deserializer: D) -> Result<BTreeSet<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<BTreeSet<String>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Release metadata as served by `GET /api/releases/{platform}/{version}/info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReleaseInfo {
    /// `sha256:<hex>` digest of the payload; empty when the server could not read it.
    #[serde(default)]
    pub checksum: String,
    /// Target operating system.
    pub platform: Platform,
    /// Tags at the time of the request.
    #[serde(default, deserialize_with = "tag_list_or_null")]
    pub tags: Vec<String>,
    /// Dotted numeric version.
    pub version: String,
    /// MD5 digest from the data file.
    #[serde(default)]
    pub md5: String,
}

fn tag_list_or_null<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

impl From<&Release> for ReleaseInfo {
    fn from(release: &Release) -> Self {
        Self {
            checksum: release.checksum.clone(),
            platform: release.platform,
            tags: release.tags.iter().cloned().collect(),
            version: release.version.clone(),
            md5: release.md5.clone(),
        }
    }
}

/// The version half of a release lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VersionQuery {
    /// Whichever release for the platform currently carries the `latest` tag.
    Latest,
    /// An exact version string such as `1.5`.
    Exact(String),
}

impl FromStr for VersionQuery {
    type Err = HotswapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !VERSION_PATTERN.is_match(s) {
            return Err(HotswapError::InvalidVersion {
                value: s.to_string(),
            });
        }
        if s == tag::LATEST {
            Ok(Self::Latest)
        } else {
            Ok(Self::Exact(s.to_string()))
        }
    }
}

impl fmt::Display for VersionQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latest => f.write_str(tag::LATEST),
            Self::Exact(version) => f.write_str(version),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_query_accepts_numeric_and_latest() {
        assert_eq!("latest".parse::<VersionQuery>().unwrap(), VersionQuery::Latest);
        assert_eq!(
            "1.5".parse::<VersionQuery>().unwrap(),
            VersionQuery::Exact("1.5".to_string())
        );
        assert_eq!(
            "10.042".parse::<VersionQuery>().unwrap(),
            VersionQuery::Exact("10.042".to_string())
        );
    }

    #[test]
    fn test_version_query_rejects_partial_matches() {
        for bad in ["1", "1.2.3", "v1.2", "1.2x", "xlatest", "latest1", "", "1..2", ".5"] {
            assert!(
                matches!(bad.parse::<VersionQuery>(), Err(HotswapError::InvalidVersion { .. })),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_release_deserializes_pascal_case() {
        let json = r#"{
            "File": "app_odd_linux",
            "Platform": "linux",
            "Md5": "abc",
            "Tags": ["active", "odd"],
            "Version": "1.3"
        }"#;
        let release: Release = serde_json::from_str(json).unwrap();
        assert_eq!(release.file, "app_odd_linux");
        assert_eq!(release.platform, Platform::Linux);
        assert!(release.has_tag("odd"));
        assert!(release.checksum.is_empty());
    }

    #[test]
    fn test_release_deserializes_lower_case_and_null_tags() {
        let json = r#"{"file": "a.exe", "platform": "windows", "version": "1.2", "tags": null}"#;
        let release: Release = serde_json::from_str(json).unwrap();
        assert_eq!(release.platform, Platform::Windows);
        assert!(release.tags.is_empty());
        assert!(release.md5.is_empty());
    }

    #[test]
    fn test_release_matches() {
        let release = Release {
            file: "f".to_string(),
            platform: Platform::Linux,
            version: "1.0".to_string(),
            md5: String::new(),
            checksum: String::new(),
            tags: ["latest".to_string()].into_iter().collect(),
        };
        assert!(release.matches(Platform::Linux, &VersionQuery::Latest));
        assert!(release.matches(Platform::Linux, &VersionQuery::Exact("1.0".to_string())));
        assert!(!release.matches(Platform::Darwin, &VersionQuery::Latest));
        assert!(!release.matches(Platform::Linux, &VersionQuery::Exact("1.00".to_string())));
    }

    #[test]
    fn test_release_info_wire_format() {
        let release = Release {
            file: "secret/path".to_string(),
            platform: Platform::Darwin,
            version: "2.0".to_string(),
            md5: "m".to_string(),
            checksum: "sha256:00".to_string(),
            tags: ["even".to_string(), "latest".to_string()].into_iter().collect(),
        };
        let value = serde_json::to_value(ReleaseInfo::from(&release)).unwrap();
        assert_eq!(value["Platform"], "darwin");
        assert_eq!(value["Version"], "2.0");
        assert_eq!(value["Checksum"], "sha256:00");
        assert_eq!(value["Md5"], "m");
        assert_eq!(value["Tags"], serde_json::json!(["even", "latest"]));
        assert!(value.get("File").is_none());
    }
}
