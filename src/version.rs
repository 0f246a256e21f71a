//! Dotted-triplet schema versions and "latest version" selection.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TreeError};

/// A `<major>.<minor>.<patch>` version. Field order gives the derived
/// ordering: most significant component first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl Version {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl FromStr for Version {
    type Err = TreeError;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split('.');
        let (Some(major), Some(minor), Some(patch), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(TreeError::Format(s.to_string()));
        };

        let component = |part: &str| -> Result<u64> {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(TreeError::Format(s.to_string()));
            }
            part.parse().map_err(|_| TreeError::Format(s.to_string()))
        };

        Ok(Self {
            major: component(major)?,
            minor: component(minor)?,
            patch: component(patch)?,
        })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Anything that carries a version string and can take part in "latest" selection.
pub trait Versioned {
    fn version_str(&self) -> &str;
}

impl Versioned for String {
    fn version_str(&self) -> &str {
        self
    }
}

impl Versioned for &str {
    fn version_str(&self) -> &str {
        self
    }
}

/// Compare two version strings component-wise.
pub fn compare_versions(a: &str, b: &str) -> Result<Ordering> {
    let a: Version = a.parse()?;
    let b: Version = b.parse()?;
    Ok(a.cmp(&b))
}

/// Select the highest-versioned candidate.
///
/// Every candidate is parsed before anything is selected, so one malformed
/// version fails the whole call. Candidates sharing the top version are all
/// valid answers; which one is returned is unspecified.
pub fn latest_of<T: Versioned>(candidates: &[T]) -> Result<Option<&T>> {
    let mut parsed = candidates
        .iter()
        .map(|c| c.version_str().parse::<Version>().map(|v| (v, c)))
        .collect::<Result<Vec<_>>>()?;

    parsed.sort_by(|a, b| b.0.cmp(&a.0));
    Ok(parsed.into_iter().next().map(|(_, c)| c))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_versions() {
        assert_eq!("1.2.3".parse::<Version>().unwrap(), Version::new(1, 2, 3));
        assert_eq!("01.002.0".parse::<Version>().unwrap(), Version::new(1, 2, 0));
    }

    #[test]
    fn rejects_malformed_versions() {
        for bad in ["0.0..1", "1.2", "1.2.3.4", "a.b.c", "1..2", "", "1.2.-3", " 1.2.3"] {
            assert!(
                matches!(bad.parse::<Version>(), Err(TreeError::Format(_))),
                "expected format error for {:?}",
                bad
            );
        }
    }

    #[test]
    fn compares_most_significant_first() {
        assert_eq!(compare_versions("2.0.0", "1.9.9").unwrap(), Ordering::Greater);
        assert_eq!(compare_versions("1.10.0", "1.9.0").unwrap(), Ordering::Greater);
        assert_eq!(compare_versions("1.0.2", "1.0.10").unwrap(), Ordering::Less);
        assert_eq!(compare_versions("1.0.0", "01.0.0").unwrap(), Ordering::Equal);
    }

    #[test]
    fn comparison_is_antisymmetric_and_transitive() {
        let versions = ["0.0.1", "0.1.0", "1.0.0", "1.0.10", "1.2.3", "10.0.0"];
        for a in versions {
            for b in versions {
                let ab = compare_versions(a, b).unwrap();
                let ba = compare_versions(b, a).unwrap();
                assert_eq!(ab, ba.reverse());
                for c in versions {
                    let bc = compare_versions(b, c).unwrap();
                    if ab == Ordering::Less && bc == Ordering::Less {
                        assert_eq!(compare_versions(a, c).unwrap(), Ordering::Less);
                    }
                }
            }
        }
    }

    #[test]
    fn comparison_fails_on_malformed_input() {
        assert!(compare_versions("1.0.0", "1.0").is_err());
    }

    #[test]
    fn latest_of_picks_highest_version() {
        let candidates = vec!["1.0.0".to_string(), "2.1.3".to_string(), "0.9.9".to_string()];
        assert_eq!(latest_of(&candidates).unwrap().unwrap(), "2.1.3");
    }

    #[test]
    fn latest_of_with_ties_returns_a_candidate() {
        let candidates = ["1.0.0", "1.0.0"];
        assert_eq!(*latest_of(&candidates).unwrap().unwrap(), "1.0.0");
    }

    #[test]
    fn latest_of_empty_is_none() {
        let candidates: Vec<String> = Vec::new();
        assert!(latest_of(&candidates).unwrap().is_none());
    }
}
