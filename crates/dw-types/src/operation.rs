//! # Operation Catalog
//!
//! Every command the client can issue, with its reply behaviour and the
//! minimum service version that supports it.
//!
//! | Group | Gate range |
//! |-------|------------|
//! | Status/info | none, 6.3 – 7.1 |
//! | Configuration | 6.4 – 7.1 |
//! | Runtime | 6.0 – 11.0 |
//! | Notifications | none, 6.4 |

use crate::version::ServiceVersion;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use thiserror::Error;

/// How an operation answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReplyKind {
    /// Fire-and-forget: resolves as soon as the command is sent.
    None,
    /// A correlated reply payload carrying the same sequence number.
    Direct,
    /// The next scan result carrying the in-flight trigger token.
    ScanResult,
}

/// Catalog grouping, mirrors the service's API documentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationGroup {
    StatusInfo,
    Configuration,
    Runtime,
    Notification,
}

/// Every operation understood by the scanning service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Operation {
    // --- Status / info ---
    IsDataWedgeAvailable,
    GetDiagnosticInfo,
    QueryDataWedgeStatus,
    GetVersionInfo,
    EnumerateScanners,
    GetActiveProfile,
    GetProfilesList,
    GetScannerStatus,
    GetDatawedgeStatus,
    GetAssociatedApps,
    GetConfig,
    GetDisabledAppList,
    GetIgnoreDisabledProfiles,
    // --- Configuration management ---
    CloneProfile,
    CreateProfile,
    DeleteProfile,
    ImportConfig,
    RenameProfile,
    RestoreConfig,
    SetConfig,
    SetDisabledAppList,
    SetIgnoreDisabledProfiles,
    // --- Runtime ---
    DisableDatawedge,
    EnableDatawedge,
    DisableScannerInput,
    EnableScannerInput,
    EnumerateTriggers,
    Notify,
    ResetDefaultProfile,
    SetDefaultProfile,
    SetReportingOptions,
    SoftRfidTrigger,
    SoftScanTrigger,
    SwitchScanner,
    SwitchScannerParams,
    SwitchToProfile,
    // --- Notification management ---
    RegisterForNotification,
    UnRegisterForNotification,
    RegisterScanListener,
}

/// Immutable description of one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationDescriptor {
    /// The operation this describes.
    pub operation: Operation,
    /// Wire name (e.g. `"getActiveProfile"`).
    pub name: &'static str,
    /// Catalog group.
    pub group: OperationGroup,
    /// Minimum service version, `None` for ungated operations.
    pub min_version: Option<ServiceVersion>,
    /// Reply behaviour.
    pub reply: ReplyKind,
}

impl OperationDescriptor {
    const fn new(
        operation: Operation,
        name: &'static str,
        group: OperationGroup,
        min_version: Option<ServiceVersion>,
        reply: ReplyKind,
    ) -> Self {
        Self {
            operation,
            name,
            group,
            min_version,
            reply,
        }
    }

    /// Does the caller wait for something after the send?
    pub const fn expects_reply(&self) -> bool {
        !matches!(self.reply, ReplyKind::None)
    }
}

const fn v(major: u32, minor: u32) -> Option<ServiceVersion> {
    Some(ServiceVersion::new(major, minor, 0))
}

use Operation as Op;
use OperationGroup::{Configuration, Notification, Runtime, StatusInfo};

/// The full catalog, in declaration order.
pub const CATALOG: &[OperationDescriptor] = &[
    // ═══════════════════════════════════════════════════════════════════════
    // STATUS / INFO (all reply-expecting)
    // ═══════════════════════════════════════════════════════════════════════
    OperationDescriptor::new(Op::IsDataWedgeAvailable, "isDataWedgeAvailable", StatusInfo, None, ReplyKind::Direct),
    OperationDescriptor::new(Op::GetDiagnosticInfo, "getDiagnosticInfo", StatusInfo, None, ReplyKind::Direct),
    OperationDescriptor::new(Op::QueryDataWedgeStatus, "queryDataWedgeStatus", StatusInfo, None, ReplyKind::Direct),
    OperationDescriptor::new(Op::GetVersionInfo, "getVersionInfo", StatusInfo, None, ReplyKind::Direct),
    OperationDescriptor::new(Op::EnumerateScanners, "enumerateScanners", StatusInfo, v(6, 5), ReplyKind::Direct),
    OperationDescriptor::new(Op::GetActiveProfile, "getActiveProfile", StatusInfo, v(6, 5), ReplyKind::Direct),
    OperationDescriptor::new(Op::GetProfilesList, "getProfilesList", StatusInfo, v(6, 5), ReplyKind::Direct),
    OperationDescriptor::new(Op::GetScannerStatus, "getScannerStatus", StatusInfo, v(6, 3), ReplyKind::Direct),
    OperationDescriptor::new(Op::GetDatawedgeStatus, "getDatawedgeStatus", StatusInfo, v(6, 3), ReplyKind::Direct),
    OperationDescriptor::new(Op::GetAssociatedApps, "getAssociatedApps", StatusInfo, v(6, 5), ReplyKind::Direct),
    OperationDescriptor::new(Op::GetConfig, "getConfig", StatusInfo, v(6, 5), ReplyKind::Direct),
    OperationDescriptor::new(Op::GetDisabledAppList, "getDisabledAppList", StatusInfo, v(6, 9), ReplyKind::Direct),
    OperationDescriptor::new(Op::GetIgnoreDisabledProfiles, "getIgnoreDisabledProfiles", StatusInfo, v(7, 1), ReplyKind::Direct),
    // ═══════════════════════════════════════════════════════════════════════
    // CONFIGURATION MANAGEMENT (fire-and-forget)
    // ═══════════════════════════════════════════════════════════════════════
    OperationDescriptor::new(Op::CloneProfile, "cloneProfile", Configuration, v(6, 5), ReplyKind::None),
    OperationDescriptor::new(Op::CreateProfile, "createProfile", Configuration, v(6, 4), ReplyKind::None),
    OperationDescriptor::new(Op::DeleteProfile, "deleteProfile", Configuration, v(6, 6), ReplyKind::None),
    OperationDescriptor::new(Op::ImportConfig, "importConfig", Configuration, v(6, 7), ReplyKind::None),
    OperationDescriptor::new(Op::RenameProfile, "renameProfile", Configuration, v(6, 6), ReplyKind::None),
    OperationDescriptor::new(Op::RestoreConfig, "restoreConfig", Configuration, v(6, 7), ReplyKind::None),
    OperationDescriptor::new(Op::SetConfig, "setConfig", Configuration, v(6, 5), ReplyKind::None),
    OperationDescriptor::new(Op::SetDisabledAppList, "setDisabledAppList", Configuration, v(6, 9), ReplyKind::None),
    OperationDescriptor::new(Op::SetIgnoreDisabledProfiles, "setIgnoreDisabledProfiles", Configuration, v(7, 1), ReplyKind::None),
    // ═══════════════════════════════════════════════════════════════════════
    // RUNTIME
    // ═══════════════════════════════════════════════════════════════════════
    OperationDescriptor::new(Op::DisableDatawedge, "disableDatawedge", Runtime, v(6, 0), ReplyKind::None),
    OperationDescriptor::new(Op::EnableDatawedge, "enableDatawedge", Runtime, v(6, 0), ReplyKind::None),
    OperationDescriptor::new(Op::DisableScannerInput, "disableScannerInput", Runtime, v(6, 6), ReplyKind::None),
    OperationDescriptor::new(Op::EnableScannerInput, "enableScannerInput", Runtime, v(6, 6), ReplyKind::None),
    OperationDescriptor::new(Op::EnumerateTriggers, "enumerateTriggers", Runtime, v(8, 0), ReplyKind::Direct),
    OperationDescriptor::new(Op::Notify, "notify", Runtime, v(11, 0), ReplyKind::None),
    OperationDescriptor::new(Op::ResetDefaultProfile, "resetDefaultProfile", Runtime, v(6, 8), ReplyKind::None),
    OperationDescriptor::new(Op::SetDefaultProfile, "setDefaultProfile", Runtime, v(6, 8), ReplyKind::None),
    OperationDescriptor::new(Op::SetReportingOptions, "setReportingOptions", Runtime, v(6, 8), ReplyKind::None),
    OperationDescriptor::new(Op::SoftRfidTrigger, "softRfidTrigger", Runtime, v(7, 0), ReplyKind::ScanResult),
    OperationDescriptor::new(Op::SoftScanTrigger, "softScanTrigger", Runtime, v(6, 0), ReplyKind::ScanResult),
    OperationDescriptor::new(Op::SwitchScanner, "switchScanner", Runtime, v(6, 3), ReplyKind::None),
    OperationDescriptor::new(Op::SwitchScannerParams, "switchScannerParams", Runtime, v(6, 3), ReplyKind::None),
    OperationDescriptor::new(Op::SwitchToProfile, "switchToProfile", Runtime, v(6, 8), ReplyKind::None),
    // ═══════════════════════════════════════════════════════════════════════
    // NOTIFICATION MANAGEMENT
    // ═══════════════════════════════════════════════════════════════════════
    OperationDescriptor::new(Op::RegisterForNotification, "registerForNotification", Notification, v(6, 4), ReplyKind::None),
    OperationDescriptor::new(Op::UnRegisterForNotification, "unRegisterForNotification", Notification, v(6, 4), ReplyKind::None),
    OperationDescriptor::new(Op::RegisterScanListener, "registerScanListener", Notification, None, ReplyKind::None),
];

/// Lookup by wire name.
static BY_NAME: LazyLock<HashMap<&'static str, &'static OperationDescriptor>> =
    LazyLock::new(|| CATALOG.iter().map(|d| (d.name, d)).collect());

/// Unknown wire name.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown operation: {0}")]
pub struct UnknownOperation(pub String);

impl Operation {
    /// Catalog entry for this operation.
    #[must_use]
    pub fn descriptor(self) -> &'static OperationDescriptor {
        // CATALOG is laid out in variant order; see test_catalog_follows_variant_order.
        &CATALOG[self as usize]
    }

    /// Wire name.
    #[must_use]
    pub fn name(self) -> &'static str {
        self.descriptor().name
    }

    /// Minimum service version, if gated.
    #[must_use]
    pub fn min_version(self) -> Option<ServiceVersion> {
        self.descriptor().min_version
    }

    /// Reply behaviour.
    #[must_use]
    pub fn reply(self) -> ReplyKind {
        self.descriptor().reply
    }

    /// Look up an operation by wire name.
    pub fn from_name(name: &str) -> Result<Self, UnknownOperation> {
        BY_NAME
            .get(name)
            .map(|d| d.operation)
            .ok_or_else(|| UnknownOperation(name.to_string()))
    }

    /// Iterate the full catalog.
    pub fn all() -> impl Iterator<Item = Operation> {
        CATALOG.iter().map(|d| d.operation)
    }
}

impl FromStr for Operation {
    type Err = UnknownOperation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for Operation {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Operation {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let name = String::deserialize(deserializer)?;
        Self::from_name(&name).map_err(serde::de::Error::custom)
    }
}
