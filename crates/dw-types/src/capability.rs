//! # Capability Snapshot
//!
//! Version and feature information reported by the service, cached by the
//! client for the session and used to gate calls.

use crate::operation::CATALOG;
use crate::version::{ServiceVersion, VersionParseError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Cached version/feature info used to gate calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilitySnapshot {
    /// Parsed semantic version.
    pub version: ServiceVersion,
    /// Build suffix, if the service reported one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<String>,
    /// Feature names the service supports.
    #[serde(default)]
    pub supported_features: BTreeSet<String>,
    /// Set when the service could not report its version.
    /// A snapshot with an error gates nothing through.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CapabilitySnapshot {
    /// Build a snapshot from a version, deriving the feature set from the catalog.
    #[must_use]
    pub fn from_version(version: ServiceVersion) -> Self {
        let supported_features = CATALOG
            .iter()
            .filter(|d| d.min_version.map_or(true, |min| version.satisfies(&min)))
            .map(|d| d.name.to_string())
            .collect();

        Self {
            version,
            build: None,
            supported_features,
            error: None,
        }
    }

    /// Build a snapshot from a raw version string.
    pub fn parse(raw: &str) -> Result<Self, VersionParseError> {
        let (version, build) = ServiceVersion::parse_with_build(raw)?;
        let mut snapshot = Self::from_version(version);
        snapshot.build = build;
        Ok(snapshot)
    }

    /// A snapshot recording that the version could not be determined.
    #[must_use]
    pub fn errored(error: impl Into<String>) -> Self {
        Self {
            version: ServiceVersion::default(),
            build: None,
            supported_features: BTreeSet::new(),
            error: Some(error.into()),
        }
    }

    /// True if the service reported a usable version.
    #[must_use]
    pub fn is_known(&self) -> bool {
        self.error.is_none()
    }

    /// Does the service list this feature?
    #[must_use]
    pub fn supports_feature(&self, feature: &str) -> bool {
        self.supported_features.contains(feature)
    }
}
