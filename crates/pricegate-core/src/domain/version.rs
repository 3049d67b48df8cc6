use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::error::PricegateError;

/// Revision component of a [`Version`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Revision {
    /// Short commit hash (already truncated).
    Commit(String),
    /// No revision information was available.
    Local,
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Revision::Commit(hash) => f.write_str(hash),
            Revision::Local => f.write_str("local"),
        }
    }
}

/// Model version: `v{major}.{minor}.{patch}-{revision}`.
///
/// Serialized as its string form so reports and manifests carry the same
/// identifier as the storage key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub revision: Revision,
}

impl Version {
    pub fn new(major: u32, minor: u32, patch: u32, revision: Revision) -> Self {
        Self {
            major,
            minor,
            patch,
            revision,
        }
    }

    /// Whether the revision fell back to `local`.
    pub fn is_local(&self) -> bool {
        self.revision == Revision::Local
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "v{}.{}.{}-{}",
            self.major, self.minor, self.patch, self.revision
        )
    }
}

fn version_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^v(\d+)\.(\d+)\.(\d+)-([0-9A-Za-z]+)$")
            .expect("version pattern is a valid regex")
    })
}

impl FromStr for Version {
    type Err = PricegateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || PricegateError::InvalidVersion(s.to_string());
        let caps = version_pattern().captures(s).ok_or_else(invalid)?;
        let number = |i: usize| -> Result<u32, PricegateError> {
            caps[i].parse::<u32>().map_err(|_| invalid())
        };
        let revision = match &caps[4] {
            "local" => Revision::Local,
            hash => Revision::Commit(hash.to_string()),
        };
        Ok(Version::new(number(1)?, number(2)?, number(3)?, revision))
    }
}

impl TryFrom<String> for Version {
    type Error = PricegateError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Version> for String {
    fn from(v: Version) -> Self {
        v.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_commit_and_local_forms() {
        let v = Version::new(1, 0, 0, Revision::Commit("a3b4c5d6".into()));
        assert_eq!(v.to_string(), "v1.0.0-a3b4c5d6");

        let local = Version::new(2, 3, 4, Revision::Local);
        assert_eq!(local.to_string(), "v2.3.4-local");
        assert!(local.is_local());
    }

    #[test]
    fn parses_its_own_output() {
        let v: Version = "v1.12.0-deadbeef".parse().unwrap();
        assert_eq!(v.minor, 12);
        assert_eq!(v.revision, Revision::Commit("deadbeef".into()));

        let local: Version = "v1.0.0-local".parse().unwrap();
        assert_eq!(local.revision, Revision::Local);
    }

    #[test]
    fn rejects_malformed_strings() {
        for bad in ["1.0.0-abc", "v1.0-abc", "v1.0.0", "v1.0.0-", "v1.0.0-ab/cd", "latest"] {
            assert!(bad.parse::<Version>().is_err(), "{bad} should not parse");
        }
    }

    #[test]
    fn serde_uses_string_form() {
        let v = Version::new(1, 0, 1, Revision::Commit("0011aabb".into()));
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, "\"v1.0.1-0011aabb\"");
        let back: Version = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);
    }
}
