//! Typed reply shapes for reply-expecting operations.

use crate::capability::CapabilitySnapshot;
use crate::errors::{ClientError, ClientResult};
use crate::events::ScannerStatus;
use crate::operation::Operation;
use crate::options::AppConfig;
use crate::version::ServiceVersion;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Decode reply data into `T`, mapping shape errors to `MalformedReply`.
pub fn decode_reply<T: DeserializeOwned>(operation: Operation, data: Value) -> ClientResult<T> {
    serde_json::from_value(data).map_err(|e| ClientError::MalformedReply {
        operation,
        reason: e.to_string(),
    })
}

/// `getVersionInfo` reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub major: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minor: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supported_features: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl VersionInfo {
    /// Reply for a known version, with features derived from the catalog.
    #[must_use]
    pub fn for_version(version: ServiceVersion) -> Self {
        let snapshot = CapabilitySnapshot::from_version(version);
        Self {
            version: version.to_string(),
            major: Some(version.major),
            minor: Some(version.minor),
            patch: Some(version.patch),
            build: None,
            supported_features: Some(snapshot.supported_features.into_iter().collect()),
            error: None,
        }
    }

    /// Turn the reply into a cacheable snapshot.
    ///
    /// Numeric parts win over the version string. A reply with an `error`
    /// field, or one whose version cannot be parsed, yields an errored
    /// snapshot.
    #[must_use]
    pub fn into_snapshot(self) -> CapabilitySnapshot {
        if let Some(error) = self.error {
            return CapabilitySnapshot::errored(error);
        }

        let mut snapshot = match (self.major, self.minor, self.patch) {
            (Some(major), minor, patch) => {
                let mut snapshot = CapabilitySnapshot::from_version(ServiceVersion::new(
                    major,
                    minor.unwrap_or(0),
                    patch.unwrap_or(0),
                ));
                snapshot.build = self.build;
                snapshot
            }
            (None, _, _) => match CapabilitySnapshot::parse(&self.version) {
                Ok(mut snapshot) => {
                    if self.build.is_some() {
                        snapshot.build = self.build;
                    }
                    snapshot
                }
                Err(e) => return CapabilitySnapshot::errored(e.to_string()),
            },
        };

        if let Some(features) = self.supported_features {
            if !features.is_empty() {
                snapshot.supported_features = features.into_iter().collect();
            }
        }
        snapshot
    }
}

/// One entry of `enumerateScanners`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScannerInfo {
    pub scanner_name: String,
    pub scanner_index: String,
    #[serde(default)]
    pub scanner_connection_state: bool,
    #[serde(default)]
    pub scanner_identifier: String,
    #[serde(default)]
    pub is_default_scanner: bool,
}

/// `getDiagnosticInfo` reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticInfo {
    pub is_available: bool,
    /// Package name to installed flag.
    #[serde(default)]
    pub package_check: BTreeMap<String, bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub official_api_receivers_found: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub official_api_receivers_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_api_receivers_found: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_api_receivers_error: Option<String>,
}

/// `isDataWedgeAvailable` reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityStatus {
    pub available: bool,
}

/// `queryDataWedgeStatus` reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    pub available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// Single-field envelopes unwrapped by the facade.

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveProfileReply {
    pub profile_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProfilesListReply {
    pub profiles: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScannersReply {
    pub scanners: Vec<ScannerInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScannerStatusReply {
    pub status: ScannerStatus,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatawedgeStatusReply {
    pub is_enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppsReply {
    #[serde(default)]
    pub apps: Vec<AppConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IgnoreDisabledProfilesReply {
    pub ignore_disabled_profiles: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TriggersReply {
    pub triggers: Vec<String>,
}
