//! # Inbound Events
//!
//! Notification and scan-result shapes delivered by the service.
//! Events are transient: built from a raw inbound payload, fanned out,
//! then dropped.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Classification of an inbound notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationCategory {
    ScannerStatus,
    ProfileSwitch,
    ConfigurationUpdate,
    WorkflowStatus,
    /// Delivered only through the scan result channel.
    ScanResult,
}

impl NotificationCategory {
    /// Categories served by the generic notification registry.
    pub const GENERIC: [NotificationCategory; 4] = [
        Self::ScannerStatus,
        Self::ProfileSwitch,
        Self::ConfigurationUpdate,
        Self::WorkflowStatus,
    ];

    /// Wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ScannerStatus => "SCANNER_STATUS",
            Self::ProfileSwitch => "PROFILE_SWITCH",
            Self::ConfigurationUpdate => "CONFIGURATION_UPDATE",
            Self::WorkflowStatus => "WORKFLOW_STATUS",
            Self::ScanResult => "SCAN_RESULT",
        }
    }

    /// True for `SCAN_RESULT`.
    #[must_use]
    pub fn is_scan(self) -> bool {
        matches!(self, Self::ScanResult)
    }
}

impl fmt::Display for NotificationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scanner state as reported by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScannerStatus {
    Idle,
    Waiting,
    Scanning,
    Disabled,
    Error,
    #[serde(other)]
    Unknown,
}

/// Category-specific notification content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "notificationType",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum NotificationPayload {
    ScannerStatus {
        status: ScannerStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        profile_name: Option<String>,
    },
    ProfileSwitch {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        profile_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        previous_profile: Option<String>,
    },
    ConfigurationUpdate {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        profile_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<serde_json::Value>,
    },
    WorkflowStatus {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        workflow_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<serde_json::Value>,
    },
}

impl NotificationPayload {
    /// Category of this payload.
    #[must_use]
    pub fn category(&self) -> NotificationCategory {
        match self {
            Self::ScannerStatus { .. } => NotificationCategory::ScannerStatus,
            Self::ProfileSwitch { .. } => NotificationCategory::ProfileSwitch,
            Self::ConfigurationUpdate { .. } => NotificationCategory::ConfigurationUpdate,
            Self::WorkflowStatus { .. } => NotificationCategory::WorkflowStatus,
        }
    }
}

/// A notification as fanned out to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InboundEvent {
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    #[serde(flatten)]
    pub payload: NotificationPayload,
}

impl InboundEvent {
    /// Create an event.
    #[must_use]
    pub fn new(payload: NotificationPayload, timestamp: u64) -> Self {
        Self { timestamp, payload }
    }

    /// Category (for routing).
    #[must_use]
    pub fn category(&self) -> NotificationCategory {
        self.payload.category()
    }

    /// Profile the event refers to, if any. Used by profile filters.
    #[must_use]
    pub fn profile_name(&self) -> Option<&str> {
        match &self.payload {
            NotificationPayload::ScannerStatus { profile_name, .. }
            | NotificationPayload::ProfileSwitch { profile_name, .. }
            | NotificationPayload::ConfigurationUpdate { profile_name, .. } => {
                profile_name.as_deref()
            }
            NotificationPayload::WorkflowStatus { .. } => None,
        }
    }

    /// Status text, if the category carries one.
    #[must_use]
    pub fn status(&self) -> Option<String> {
        match &self.payload {
            NotificationPayload::ScannerStatus { status, .. } => serde_json::to_value(status)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string)),
            NotificationPayload::ConfigurationUpdate { status, .. }
            | NotificationPayload::WorkflowStatus { status, .. } => status.clone(),
            NotificationPayload::ProfileSwitch { .. } => None,
        }
    }

    /// Free-form data, if the category carries any.
    #[must_use]
    pub fn data(&self) -> Option<&serde_json::Value> {
        match &self.payload {
            NotificationPayload::ConfigurationUpdate { data, .. }
            | NotificationPayload::WorkflowStatus { data, .. } => data.as_ref(),
            _ => None,
        }
    }
}

/// Token tying a soft trigger to the scan result it produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TriggerToken(Uuid);

impl TriggerToken {
    /// Generate a fresh token.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TriggerToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TriggerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Label type used when the service omits one.
pub const UNKNOWN_LABEL_TYPE: &str = "UNKNOWN";

/// Source used when the service omits one.
pub const DEFAULT_SCAN_SOURCE: &str = "scanner";

/// A decoded barcode or RFID read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    /// Decoded data.
    pub data: String,
    /// Symbology (e.g. `LABEL-TYPE-EAN13`).
    pub label_type: String,
    /// Input source (`scanner`, `rfid`, ...).
    pub source: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    /// Echoed soft-trigger token, present only on triggered reads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_token: Option<TriggerToken>,
}
