//! # Service Versions
//!
//! Semantic version of the scanning service, compared as a
//! lexicographic `(major, minor, patch)` triple.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Prefix some firmware builds put in front of the version string.
const VERSION_PREFIX: &str = "DATAWEDGE";

/// Errors from parsing a version string.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VersionParseError {
    /// Nothing to parse.
    #[error("empty version string")]
    Empty,

    /// A numeric component could not be read.
    #[error("invalid version component '{component}' in '{input}'")]
    InvalidComponent { component: String, input: String },
}

/// A `major.minor.patch` service version.
///
/// Field order matters: the derived `Ord` compares major, then minor, then patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct ServiceVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl ServiceVersion {
    /// Create a version from its three components.
    #[must_use]
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Returns true if this version is at least `required`.
    #[must_use]
    pub fn satisfies(&self, required: &ServiceVersion) -> bool {
        self >= required
    }

    /// Parse a version string, returning the version and any build suffix.
    ///
    /// Accepts `"11.2.50"`, `"6.9.49.BUILD001"`, `"6.9.49BUILD001"` and
    /// `"DATAWEDGE 8.2.1"`. Missing components default to zero.
    pub fn parse_with_build(input: &str) -> Result<(Self, Option<String>), VersionParseError> {
        let trimmed = input.trim();
        let cleaned = trimmed
            .strip_prefix(VERSION_PREFIX)
            .map(str::trim_start)
            .unwrap_or(trimmed);

        if cleaned.is_empty() {
            return Err(VersionParseError::Empty);
        }

        let mut parts = cleaned.split('.');
        let component = |part: Option<&str>| -> Result<u32, VersionParseError> {
            match part {
                None => Ok(0),
                Some(p) => p.parse().map_err(|_| VersionParseError::InvalidComponent {
                    component: p.to_string(),
                    input: input.to_string(),
                }),
            }
        };

        let major = component(parts.next())?;
        let minor = component(parts.next())?;

        let mut build = String::new();
        let patch = match parts.next() {
            None => 0,
            Some(raw) => {
                let digits_end = raw
                    .find(|c: char| !c.is_ascii_digit())
                    .unwrap_or(raw.len());
                build.push_str(&raw[digits_end..]);
                if digits_end == 0 {
                    0
                } else {
                    component(Some(&raw[..digits_end]))?
                }
            }
        };

        for extra in parts {
            if !build.is_empty() {
                build.push('.');
            }
            build.push_str(extra);
        }

        let build = (!build.is_empty()).then_some(build);
        Ok((Self::new(major, minor, patch), build))
    }
}

impl FromStr for ServiceVersion {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_with_build(s).map(|(version, _)| version)
    }
}

impl fmt::Display for ServiceVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}
