//! Version and constraint model for extension packages.
//!
//! Extension versions are plain `major.minor.patch` triples: no prerelease
//! tags, no build metadata. Missing segments default to zero, so `"1.2"`
//! parses as `1.2.0`. Each segment must stay below 1000 so a triple packs
//! injectively into a single integer (`major * 1_000_000 + minor * 1_000 +
//! patch`), the form the catalog indexes for fast range queries.
//!
//! Range constraints live in [`range`]: empty (any version), a single
//! inclusive floor (`"1.2.0"`), or an inclusive floor-ceiling pair
//! (`"1.2.0-2.0.0"`).
//!
//! # Examples
//!
//! ```rust
//! use extman::version::{Version, VersionRange};
//!
//! let v = Version::parse("1.2")?;
//! assert_eq!(v.to_string(), "1.2.0");
//! assert_eq!(v.to_integer(), 1_002_000);
//!
//! let range = VersionRange::parse("1.0.0-2.0.0")?;
//! assert!(range.contains(&v));
//! # Ok::<(), anyhow::Error>(())
//! ```

use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::constants::{VERSION_MAJOR_FACTOR, VERSION_MINOR_FACTOR, VERSION_SEGMENT_LIMIT};
use crate::core::ExtmanError;

pub mod range;

pub use range::VersionRange;

/// A parsed extension version triple.
///
/// Ordering is lexicographic over `(major, minor, patch)`, which the derived
/// `Ord` provides, and coincides with ordering by [`Version::to_integer`]
/// because every segment is bounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    /// Major segment
    pub major: u64,
    /// Minor segment
    pub minor: u64,
    /// Patch segment
    pub patch: u64,
}

impl Version {
    /// Construct a version from explicit segments.
    #[must_use]
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self { major, minor, patch }
    }

    /// Parse a version string.
    ///
    /// Accepts `"major"`, `"major.minor"` or `"major.minor.patch"`; missing
    /// segments default to zero. Non-numeric segments, empty input, more than
    /// three segments and segments of 1000 or above are rejected with
    /// [`ExtmanError::InvalidVersion`]. The empty string deliberately fails
    /// here: "any version" is a range concern, not a version.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ExtmanError::InvalidVersion {
                input: input.to_string(),
                reason: "empty version string".to_string(),
            }
            .into());
        }

        let mut segments = [0u64; 3];
        let parts: Vec<&str> = trimmed.split('.').collect();
        if parts.len() > 3 {
            return Err(ExtmanError::InvalidVersion {
                input: input.to_string(),
                reason: format!("expected at most 3 segments, got {}", parts.len()),
            }
            .into());
        }

        for (i, part) in parts.iter().enumerate() {
            let value: u64 = part.parse().map_err(|_| ExtmanError::InvalidVersion {
                input: input.to_string(),
                reason: format!("non-numeric segment '{part}'"),
            })?;
            if value >= VERSION_SEGMENT_LIMIT {
                return Err(ExtmanError::InvalidVersion {
                    input: input.to_string(),
                    reason: format!("segment {value} exceeds the limit of {}", VERSION_SEGMENT_LIMIT - 1),
                }
                .into());
            }
            segments[i] = value;
        }

        Ok(Self {
            major: segments[0],
            minor: segments[1],
            patch: segments[2],
        })
    }

    /// Pack the triple into a single comparable integer.
    ///
    /// `1.2.3` becomes `1_002_003`. The catalog stores this alongside each
    /// entry so range queries compare integers instead of re-parsing strings.
    #[must_use]
    pub const fn to_integer(self) -> u64 {
        self.major * VERSION_MAJOR_FACTOR + self.minor * VERSION_MINOR_FACTOR + self.patch
    }

    /// Reconstruct a version from its packed integer form.
    #[must_use]
    pub const fn from_integer(value: u64) -> Self {
        Self {
            major: value / VERSION_MAJOR_FACTOR,
            minor: (value % VERSION_MAJOR_FACTOR) / VERSION_MINOR_FACTOR,
            patch: value % VERSION_MINOR_FACTOR,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for Version {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

// Versions serialize as their string form so catalog and metadata files stay
// human-readable.
impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_triple() {
        let v = Version::parse("1.2.3").unwrap();
        assert_eq!(v, Version::new(1, 2, 3));
    }

    #[test]
    fn test_parse_missing_segments_default_to_zero() {
        assert_eq!(Version::parse("1").unwrap(), Version::new(1, 0, 0));
        assert_eq!(Version::parse("1.2").unwrap(), Version::new(1, 2, 0));
        assert_eq!(Version::parse("0").unwrap(), Version::new(0, 0, 0));
    }

    #[test]
    fn test_parse_rejects_non_numeric() {
        assert!(Version::parse("1.x.0").is_err());
        assert!(Version::parse("a.b.c").is_err());
        assert!(Version::parse("1.2.3-beta").is_err());
        assert!(Version::parse("").is_err());
        assert!(Version::parse("  ").is_err());
    }

    #[test]
    fn test_parse_rejects_extra_segments() {
        assert!(Version::parse("1.2.3.4").is_err());
    }

    #[test]
    fn test_parse_rejects_oversized_segments() {
        assert!(Version::parse("1000.0.0").is_err());
        assert!(Version::parse("1.1000.0").is_err());
        assert!(Version::parse("1.2.999").is_ok());
    }

    #[test]
    fn test_parse_error_is_typed() {
        let err = Version::parse("nope").unwrap_err();
        match err.downcast_ref::<ExtmanError>() {
            Some(ExtmanError::InvalidVersion { input, .. }) => assert_eq!(input, "nope"),
            _ => panic!("Expected InvalidVersion"),
        }
    }

    #[test]
    fn test_display_round_trip() {
        for input in ["1.2.3", "0.0.1", "12.0.0", "999.999.999", "1.2", "3"] {
            let parsed = Version::parse(input).unwrap();
            let reparsed = Version::parse(&parsed.to_string()).unwrap();
            assert_eq!(parsed, reparsed, "round trip failed for {input}");
        }
    }

    #[test]
    fn test_ordering() {
        let a = Version::parse("1.2.3").unwrap();
        let b = Version::parse("1.2.4").unwrap();
        let c = Version::parse("1.3.0").unwrap();
        let d = Version::parse("2.0.0").unwrap();

        assert!(a < b);
        assert!(b < c);
        assert!(c < d);
        assert_eq!(a.cmp(&a), std::cmp::Ordering::Equal);
    }

    #[test]
    fn test_integer_packing() {
        assert_eq!(Version::new(1, 2, 3).to_integer(), 1_002_003);
        assert_eq!(Version::new(0, 0, 0).to_integer(), 0);
        assert_eq!(Version::new(999, 999, 999).to_integer(), 999_999_999);
    }

    #[test]
    fn test_integer_packing_preserves_order() {
        let versions = ["0.9.0", "1.0.0", "1.0.10", "1.9.0", "1.10.0", "2.0.0"];
        let integers: Vec<u64> = versions
            .iter()
            .map(|s| Version::parse(s).unwrap().to_integer())
            .collect();
        let mut sorted = integers.clone();
        sorted.sort_unstable();
        assert_eq!(integers, sorted);
    }

    #[test]
    fn test_from_integer_round_trip() {
        for input in ["1.2.3", "0.0.1", "999.0.999"] {
            let v = Version::parse(input).unwrap();
            assert_eq!(Version::from_integer(v.to_integer()), v);
        }
    }

    #[test]
    fn test_serde_as_string() {
        #[derive(Serialize, Deserialize)]
        struct Wrapper {
            version: Version,
        }

        let w = Wrapper {
            version: Version::new(1, 2, 3),
        };
        let toml_str = toml::to_string(&w).unwrap();
        assert!(toml_str.contains("\"1.2.3\""));

        let back: Wrapper = toml::from_str(&toml_str).unwrap();
        assert_eq!(back.version, w.version);
    }
}
