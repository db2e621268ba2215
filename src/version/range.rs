//! Version range constraints for dependency edges.
//!
//! A range is the constraint attached to a depends/conflicts/suggests edge.
//! The catalog feed writes them in three shapes:
//!
//! | Syntax            | Meaning                                   |
//! |-------------------|-------------------------------------------|
//! | `""`              | any version                               |
//! | `"1.2.0"`         | floor only, unbounded above               |
//! | `"1.2.0-2.0.0"`   | floor and ceiling, both inclusive         |
//!
//! A floor above the ceiling is invalid and rejected at parse time (which is
//! catalog-insert time for feed data), never silently swapped.

use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::core::ExtmanError;
use crate::version::Version;

/// An inclusive version range constraint.
///
/// `floor == None` means unconstrained below (the "any" range);
/// `ceiling == None` means unbounded above.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VersionRange {
    /// Lowest acceptable version, inclusive.
    pub floor: Option<Version>,
    /// Highest acceptable version, inclusive.
    pub ceiling: Option<Version>,
}

impl VersionRange {
    /// The unconstrained range: every version matches.
    #[must_use]
    pub const fn any() -> Self {
        Self { floor: None, ceiling: None }
    }

    /// A range with only an inclusive floor.
    #[must_use]
    pub const fn at_least(floor: Version) -> Self {
        Self { floor: Some(floor), ceiling: None }
    }

    /// A range with inclusive floor and ceiling.
    ///
    /// Returns [`ExtmanError::InvalidVersionRange`] when the floor exceeds the
    /// ceiling.
    pub fn between(floor: Version, ceiling: Version) -> Result<Self> {
        if floor > ceiling {
            return Err(ExtmanError::InvalidVersionRange {
                input: format!("{floor}-{ceiling}"),
                reason: "floor exceeds ceiling".to_string(),
            }
            .into());
        }
        Ok(Self {
            floor: Some(floor),
            ceiling: Some(ceiling),
        })
    }

    /// Parse a range string (`""`, `"1.2.0"` or `"1.2.0-2.0.0"`).
    ///
    /// An empty ceiling after the dash (`"1.2.0-"`) means unbounded, matching
    /// how catalog feeds commonly encode "at least". Whitespace around either
    /// bound is tolerated.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Ok(Self::any());
        }

        match trimmed.split_once('-') {
            None => Ok(Self::at_least(Version::parse(trimmed)?)),
            Some((floor_str, ceiling_str)) => {
                let floor = Version::parse(floor_str).map_err(|_| {
                    ExtmanError::InvalidVersionRange {
                        input: input.to_string(),
                        reason: format!("invalid floor '{}'", floor_str.trim()),
                    }
                })?;
                if ceiling_str.trim().is_empty() {
                    return Ok(Self::at_least(floor));
                }
                let ceiling = Version::parse(ceiling_str).map_err(|_| {
                    ExtmanError::InvalidVersionRange {
                        input: input.to_string(),
                        reason: format!("invalid ceiling '{}'", ceiling_str.trim()),
                    }
                })?;
                Self::between(floor, ceiling).map_err(|_| {
                    ExtmanError::InvalidVersionRange {
                        input: input.to_string(),
                        reason: "floor exceeds ceiling".to_string(),
                    }
                    .into()
                })
            }
        }
    }

    /// Whether `version` falls inside the range.
    ///
    /// Floor inclusive, ceiling inclusive when present, unbounded otherwise.
    #[must_use]
    pub fn contains(&self, version: &Version) -> bool {
        if let Some(floor) = &self.floor {
            if version < floor {
                return false;
            }
        }
        if let Some(ceiling) = &self.ceiling {
            if version > ceiling {
                return false;
            }
        }
        true
    }

    /// Whether this is the unconstrained range.
    #[must_use]
    pub const fn is_any(&self) -> bool {
        self.floor.is_none() && self.ceiling.is_none()
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.floor, &self.ceiling) {
            (None, None) => Ok(()),
            (Some(floor), None) => write!(f, "{floor}"),
            (Some(floor), Some(ceiling)) => write!(f, "{floor}-{ceiling}"),
            // Unreachable through the constructors; kept total for Display
            (None, Some(ceiling)) => write!(f, "0.0.0-{ceiling}"),
        }
    }
}

impl FromStr for VersionRange {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

// Ranges serialize as their string form, with "" for the any-range.
impl Serialize for VersionRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for VersionRange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn test_parse_empty_is_any() {
        let range = VersionRange::parse("").unwrap();
        assert!(range.is_any());
        assert!(range.contains(&v("0.0.0")));
        assert!(range.contains(&v("999.999.999")));
    }

    #[test]
    fn test_parse_floor_only() {
        let range = VersionRange::parse("1.2.0").unwrap();
        assert_eq!(range.floor, Some(v("1.2.0")));
        assert_eq!(range.ceiling, None);
        assert!(!range.contains(&v("1.1.9")));
        assert!(range.contains(&v("1.2.0")));
        assert!(range.contains(&v("99.0.0")));
    }

    #[test]
    fn test_parse_floor_and_ceiling() {
        let range = VersionRange::parse("1.2.0-2.0.0").unwrap();
        assert!(!range.contains(&v("1.1.9")));
        assert!(range.contains(&v("1.2.0")), "floor is inclusive");
        assert!(range.contains(&v("1.5.0")));
        assert!(range.contains(&v("2.0.0")), "ceiling is inclusive");
        assert!(!range.contains(&v("2.0.1")));
    }

    #[test]
    fn test_parse_trailing_dash_means_unbounded() {
        let range = VersionRange::parse("1.2.0-").unwrap();
        assert_eq!(range.ceiling, None);
        assert!(range.contains(&v("42.0.0")));
    }

    #[test]
    fn test_parse_tolerates_whitespace() {
        let range = VersionRange::parse(" 1.0.0 - 2.0.0 ").unwrap();
        assert!(range.contains(&v("1.5.0")));
    }

    #[test]
    fn test_floor_above_ceiling_rejected() {
        let err = VersionRange::parse("2.0.0-1.0.0").unwrap_err();
        match err.downcast_ref::<ExtmanError>() {
            Some(ExtmanError::InvalidVersionRange { reason, .. }) => {
                assert!(reason.contains("floor exceeds ceiling"));
            }
            _ => panic!("Expected InvalidVersionRange"),
        }

        assert!(VersionRange::between(v("2.0.0"), v("1.0.0")).is_err());
    }

    #[test]
    fn test_parse_rejects_garbage_bounds() {
        assert!(VersionRange::parse("abc").is_err());
        assert!(VersionRange::parse("1.0.0-abc").is_err());
    }

    #[test]
    fn test_equal_floor_and_ceiling_is_exact() {
        let range = VersionRange::parse("1.2.0-1.2.0").unwrap();
        assert!(range.contains(&v("1.2.0")));
        assert!(!range.contains(&v("1.2.1")));
        assert!(!range.contains(&v("1.1.9")));
    }

    #[test]
    fn test_containment_is_monotonic() {
        // If v1 <= v2 <= v3 and the range contains v1 and v3, it contains v2.
        let ranges = [
            VersionRange::parse("").unwrap(),
            VersionRange::parse("1.0.0").unwrap(),
            VersionRange::parse("1.0.0-3.0.0").unwrap(),
        ];
        let versions = [v("0.5.0"), v("1.0.0"), v("1.5.0"), v("2.0.0"), v("3.0.0"), v("4.0.0")];

        for range in &ranges {
            for window in versions.windows(3) {
                if range.contains(&window[0]) && range.contains(&window[2]) {
                    assert!(
                        range.contains(&window[1]),
                        "range {range} skipped {} between {} and {}",
                        window[1],
                        window[0],
                        window[2]
                    );
                }
            }
        }
    }

    #[test]
    fn test_display_round_trip() {
        for input in ["", "1.2.0", "1.2.0-2.0.0"] {
            let range = VersionRange::parse(input).unwrap();
            let reparsed = VersionRange::parse(&range.to_string()).unwrap();
            assert_eq!(range, reparsed, "round trip failed for '{input}'");
        }
    }

    #[test]
    fn test_serde_as_string() {
        #[derive(Serialize, Deserialize)]
        struct Wrapper {
            range: VersionRange,
        }

        let w = Wrapper {
            range: VersionRange::parse("1.0.0-2.0.0").unwrap(),
        };
        let toml_str = toml::to_string(&w).unwrap();
        assert!(toml_str.contains("\"1.0.0-2.0.0\""));

        let back: Wrapper = toml::from_str(&toml_str).unwrap();
        assert_eq!(back.range, w.range);

        let any: Wrapper = toml::from_str("range = \"\"\n").unwrap();
        assert!(any.range.is_any());
    }
}
