//! Semantic version parsing and comparison.
//!
//! Owned natively rather than delegated to an external crate: the teacher
//! crate leans on `node-semver`, but the version/range subsystem is the one
//! piece of this system the spec requires us to own (see SPEC_FULL.md §4.4).

use std::cmp::Ordering;
use std::fmt;

use crate::error::ZepoError;

/// A single dot-separated identifier within a pre-release channel
/// (`1.2.3-alpha.1` has identifiers `alpha` and `1`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier {
    Numeric(u64),
    Alphanumeric(String),
}

impl PartialOrd for Identifier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Identifier {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Identifier::Numeric(a), Identifier::Numeric(b)) => a.cmp(b),
            (Identifier::Numeric(_), Identifier::Alphanumeric(_)) => Ordering::Less,
            (Identifier::Alphanumeric(_), Identifier::Numeric(_)) => Ordering::Greater,
            (Identifier::Alphanumeric(a), Identifier::Alphanumeric(b)) => a.cmp(b),
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Numeric(n) => write!(f, "{n}"),
            Identifier::Alphanumeric(s) => write!(f, "{s}"),
        }
    }
}

fn parse_identifier(segment: &str) -> Identifier {
    if !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(n) = segment.parse() {
            return Identifier::Numeric(n);
        }
    }
    Identifier::Alphanumeric(segment.to_string())
}

/// A fully-specified `major.minor.patch[-pre][+build]` version.
#[derive(Debug, Clone, Eq)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub pre_release: Vec<Identifier>,
    pub build: Vec<String>,
}

impl Version {
    pub fn parse(input: &str) -> Result<Self, ZepoError> {
        let input = input.trim();
        let input = input.strip_prefix(['v', 'V']).unwrap_or(input);

        let (core_and_pre, build) = match input.split_once('+') {
            Some((a, b)) => (a, Some(b)),
            None => (input, None),
        };

        let (core, pre) = match core_and_pre.split_once('-') {
            Some((a, b)) => (a, Some(b)),
            None => (core_and_pre, None),
        };

        let mut parts = core.split('.');
        let major = parts
            .next()
            .ok_or_else(|| ZepoError::VersionParse(input.to_string()))?;
        let minor = parts.next().unwrap_or("0");
        let patch = parts.next().unwrap_or("0");

        if parts.next().is_some() {
            return Err(ZepoError::VersionParse(input.to_string()));
        }

        let parse_num = |s: &str| -> Result<u64, ZepoError> {
            s.parse::<u64>()
                .map_err(|_| ZepoError::VersionParse(input.to_string()))
        };

        let pre_release = pre
            .map(|s| s.split('.').map(parse_identifier).collect())
            .unwrap_or_default();

        let build = build
            .map(|s| s.split('.').map(|x| x.to_string()).collect())
            .unwrap_or_default();

        Ok(Version {
            major: parse_num(major)?,
            minor: parse_num(minor)?,
            patch: parse_num(patch)?,
            pre_release,
            build,
        })
    }

    pub fn is_prerelease(&self) -> bool {
        !self.pre_release.is_empty()
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if !self.pre_release.is_empty() {
            write!(f, "-")?;
            let parts: Vec<String> = self.pre_release.iter().map(|i| i.to_string()).collect();
            write!(f, "{}", parts.join("."))?;
        }
        if !self.build.is_empty() {
            write!(f, "+{}", self.build.join("."))?;
        }
        Ok(())
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| match (self.is_prerelease(), other.is_prerelease()) {
                (false, false) => Ordering::Equal,
                // a pre-release has lower precedence than the associated normal version
                (true, false) => Ordering::Less,
                (false, true) => Ordering::Greater,
                (true, true) => self.pre_release.cmp(&other.pre_release),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_version() {
        let v = Version::parse("1.2.3").unwrap();
        assert_eq!((v.major, v.minor, v.patch), (1, 2, 3));
    }

    #[test]
    fn parses_leading_v() {
        let v = Version::parse("v1.2.3").unwrap();
        assert_eq!((v.major, v.minor, v.patch), (1, 2, 3));
    }

    #[test]
    fn fills_missing_components() {
        let v = Version::parse("1.2").unwrap();
        assert_eq!((v.major, v.minor, v.patch), (1, 2, 0));
    }

    #[test]
    fn prerelease_has_lower_precedence() {
        let stable = Version::parse("1.0.0").unwrap();
        let pre = Version::parse("1.0.0-alpha").unwrap();
        assert!(pre < stable);
    }

    #[test]
    fn prerelease_numeric_identifiers_compare_numerically() {
        let a = Version::parse("1.0.0-alpha.2").unwrap();
        let b = Version::parse("1.0.0-alpha.10").unwrap();
        assert!(a < b);
    }

    #[test]
    fn rejects_malformed_version() {
        assert!(Version::parse("not-a-version!!").is_err());
    }
}
