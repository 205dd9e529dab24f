//! # Request Options
//!
//! Typed payloads for the operations that take arguments. Each type
//! validates itself before it is encoded so a malformed call never reaches
//! the transport.

use crate::errors::{ClientError, ClientResult};
use crate::events::NotificationCategory;
use crate::operation::Operation;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A typed operation payload.
pub trait CommandOptions: Serialize {
    /// Check argument shape. Default accepts everything.
    fn validate(&self, _operation: Operation) -> ClientResult<()> {
        Ok(())
    }

    /// Validate, then encode as a JSON object.
    fn to_payload(&self, operation: Operation) -> ClientResult<Value> {
        self.validate(operation)?;
        let value = serde_json::to_value(self).map_err(|e| invalid(operation, e.to_string()))?;
        match value {
            Value::Object(_) => Ok(value),
            Value::Null => Ok(Value::Object(serde_json::Map::new())),
            _ => Err(invalid(operation, "options must encode to an object")),
        }
    }
}

fn invalid(operation: Operation, reason: impl Into<String>) -> ClientError {
    ClientError::InvalidArgument {
        operation,
        reason: reason.into(),
    }
}

fn require_name(operation: Operation, field: &str, value: &str) -> ClientResult<()> {
    if value.trim().is_empty() {
        return Err(invalid(operation, format!("{field} must not be empty")));
    }
    Ok(())
}

/// Options naming a single profile.
///
/// Used by `deleteProfile`, `setDefaultProfile`, `switchToProfile` and
/// `getAssociatedApps`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileOptions {
    pub profile_name: String,
}

impl ProfileOptions {
    pub fn new(profile_name: impl Into<String>) -> Self {
        Self {
            profile_name: profile_name.into(),
        }
    }
}

impl CommandOptions for ProfileOptions {
    fn validate(&self, operation: Operation) -> ClientResult<()> {
        require_name(operation, "profileName", &self.profile_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetConfigOptions {
    pub profile_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_type: Option<String>,
}

impl CommandOptions for GetConfigOptions {
    fn validate(&self, operation: Operation) -> ClientResult<()> {
        require_name(operation, "profileName", &self.profile_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloneProfileOptions {
    pub source_profile_name: String,
    pub destination_profile_name: String,
}

impl CommandOptions for CloneProfileOptions {
    fn validate(&self, operation: Operation) -> ClientResult<()> {
        require_name(operation, "sourceProfileName", &self.source_profile_name)?;
        require_name(
            operation,
            "destinationProfileName",
            &self.destination_profile_name,
        )?;
        if self.source_profile_name == self.destination_profile_name {
            return Err(invalid(
                operation,
                "source and destination profile names must differ",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProfileOptions {
    pub profile_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_enabled: Option<bool>,
}

impl CommandOptions for CreateProfileOptions {
    fn validate(&self, operation: Operation) -> ClientResult<()> {
        require_name(operation, "profileName", &self.profile_name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImportMode {
    #[default]
    Overwrite,
    Merge,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportConfigOptions {
    /// Path of the configuration file on the device.
    pub config_file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub import_mode: Option<ImportMode>,
}

impl CommandOptions for ImportConfigOptions {
    fn validate(&self, operation: Operation) -> ClientResult<()> {
        require_name(operation, "configFile", &self.config_file)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameProfileOptions {
    pub current_profile_name: String,
    pub new_profile_name: String,
}

impl CommandOptions for RenameProfileOptions {
    fn validate(&self, operation: Operation) -> ClientResult<()> {
        require_name(operation, "currentProfileName", &self.current_profile_name)?;
        require_name(operation, "newProfileName", &self.new_profile_name)?;
        if self.current_profile_name == self.new_profile_name {
            return Err(invalid(operation, "new profile name must differ"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfigMode {
    #[default]
    Update,
    CreateIfNotExist,
    Overwrite,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetConfigOptions {
    pub profile_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_mode: Option<ConfigMode>,
    /// Plugin configuration bundle, passed through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,
}

impl CommandOptions for SetConfigOptions {
    fn validate(&self, operation: Operation) -> ClientResult<()> {
        require_name(operation, "profileName", &self.profile_name)?;
        match &self.config {
            None | Some(Value::Object(_)) => Ok(()),
            Some(_) => Err(invalid(operation, "config must be an object")),
        }
    }
}

/// An application (and optionally some of its activities).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    pub package_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_list: Option<Vec<String>>,
}

impl AppConfig {
    pub fn new(package_name: impl Into<String>) -> Self {
        Self {
            package_name: package_name.into(),
            activity_list: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppListMode {
    Add,
    Remove,
    #[default]
    Set,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetDisabledAppListOptions {
    pub apps: Vec<AppConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<AppListMode>,
}

impl CommandOptions for SetDisabledAppListOptions {
    fn validate(&self, operation: Operation) -> ClientResult<()> {
        if self.apps.is_empty() {
            return Err(invalid(operation, "apps must not be empty"));
        }
        for app in &self.apps {
            require_name(operation, "packageName", &app.package_name)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IgnoreDisabledProfilesOptions {
    pub ignore_disabled_profiles: bool,
}

impl CommandOptions for IgnoreDisabledProfilesOptions {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotifyKind {
    Beep,
    Vibrate,
    Led,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifyOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_type: Option<NotifyKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub led_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub led_on_duration: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub led_off_duration: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beep_volume: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vibrate_duration: Option<u32>,
}

impl CommandOptions for NotifyOptions {}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetReportingOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_reporting: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_import: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_file_path: Option<String>,
}

impl CommandOptions for SetReportingOptions {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchScannerOptions {
    pub scanner_index: String,
}

impl CommandOptions for SwitchScannerOptions {
    fn validate(&self, operation: Operation) -> ClientResult<()> {
        require_name(operation, "scannerIndex", &self.scanner_index)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchScannerParamsOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scanner_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl CommandOptions for SwitchScannerParamsOptions {
    fn validate(&self, operation: Operation) -> ClientResult<()> {
        match &self.params {
            None | Some(Value::Object(_)) => Ok(()),
            Some(_) => Err(invalid(operation, "params must be an object")),
        }
    }
}

/// Options for `registerForNotification` / `unRegisterForNotification`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterForNotificationOptions {
    pub notification_type: NotificationCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_name: Option<String>,
}

impl RegisterForNotificationOptions {
    pub fn new(notification_type: NotificationCategory) -> Self {
        Self {
            notification_type,
            profile_name: None,
        }
    }

    pub fn with_profile(mut self, profile_name: impl Into<String>) -> Self {
        self.profile_name = Some(profile_name.into());
        self
    }
}

impl CommandOptions for RegisterForNotificationOptions {
    fn validate(&self, _operation: Operation) -> ClientResult<()> {
        if self.notification_type.is_scan() {
            return Err(ClientError::WrongChannel {
                category: self.notification_type,
            });
        }
        Ok(())
    }
}

/// Untyped payload for the generic `invoke` path.
impl CommandOptions for Value {
    fn validate(&self, operation: Operation) -> ClientResult<()> {
        match self {
            Value::Object(_) | Value::Null => Ok(()),
            _ => Err(invalid(operation, "payload must be an object")),
        }
    }
}
