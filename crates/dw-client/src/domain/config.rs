//! Client configuration with validation.
//!
//! Loaded from TOML, from the environment, or both (environment wins).
//!
//! ```toml
//! [dispatch]
//! default_timeout = "10s"
//! trigger_timeout = "30s"
//!
//! [capability]
//! auto_fetch = true
//! version_query_timeout = "5s"
//!
//! [scan]
//! intake_enabled_at_start = false
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Env var overriding `dispatch.default_timeout`, in milliseconds.
pub const ENV_DEFAULT_TIMEOUT_MS: &str = "DW_DEFAULT_TIMEOUT_MS";
/// Env var overriding `dispatch.trigger_timeout`, in milliseconds.
pub const ENV_TRIGGER_TIMEOUT_MS: &str = "DW_TRIGGER_TIMEOUT_MS";
/// Env var overriding `capability.auto_fetch`.
pub const ENV_AUTO_FETCH: &str = "DW_AUTO_FETCH_CAPABILITIES";

/// Main client configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Request/reply dispatch
    pub dispatch: DispatchConfig,
    /// Capability snapshot handling
    pub capability: CapabilityConfig,
    /// Scan intake
    pub scan: ScanConfig,
}

impl ClientConfig {
    /// Parse from TOML and validate.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overlaid with the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Overlay process environment variables onto this config.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| env::var(key).ok())
    }

    /// Overlay values from `lookup` (keyed by the `ENV_*` names), then validate.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_DEFAULT_TIMEOUT_MS) {
            self.dispatch.default_timeout = Some(parse_millis(ENV_DEFAULT_TIMEOUT_MS, &raw)?);
        }
        if let Some(raw) = lookup(ENV_TRIGGER_TIMEOUT_MS) {
            self.dispatch.trigger_timeout = Some(parse_millis(ENV_TRIGGER_TIMEOUT_MS, &raw)?);
        }
        if let Some(raw) = lookup(ENV_AUTO_FETCH) {
            self.capability.auto_fetch = parse_bool(ENV_AUTO_FETCH, &raw)?;
        }
        self.validate()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dispatch.default_timeout == Some(Duration::ZERO) {
            return Err(ConfigError::InvalidTimeout(
                "default_timeout cannot be 0".into(),
            ));
        }

        if self.dispatch.trigger_timeout == Some(Duration::ZERO) {
            return Err(ConfigError::InvalidTimeout(
                "trigger_timeout cannot be 0".into(),
            ));
        }

        if self.capability.version_query_timeout == Some(Duration::ZERO) {
            return Err(ConfigError::InvalidTimeout(
                "version_query_timeout cannot be 0".into(),
            ));
        }

        Ok(())
    }
}

/// Dispatch configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Timeout for reply-expecting calls. `None` waits indefinitely.
    #[serde(with = "humantime_serde::option", skip_serializing_if = "Option::is_none")]
    pub default_timeout: Option<Duration>,
    /// Timeout for soft triggers. `None` falls back to `default_timeout`.
    #[serde(with = "humantime_serde::option", skip_serializing_if = "Option::is_none")]
    pub trigger_timeout: Option<Duration>,
}

/// Capability configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapabilityConfig {
    /// Fetch the snapshot on the first gated call when none is cached.
    pub auto_fetch: bool,
    /// Timeout for the `getVersionInfo` query behind an auto-fetch.
    #[serde(with = "humantime_serde::option", skip_serializing_if = "Option::is_none")]
    pub version_query_timeout: Option<Duration>,
}

impl Default for CapabilityConfig {
    fn default() -> Self {
        Self {
            auto_fetch: true,
            version_query_timeout: Some(Duration::from_secs(5)),
        }
    }
}

/// Scan intake configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Accept scan payloads before `registerScanListener` is called.
    pub intake_enabled_at_start: bool,
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// TOML could not be parsed
    #[error("failed to parse configuration: {0}")]
    Parse(String),
    /// Invalid timeout value
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),
    /// An environment override could not be parsed
    #[error("invalid value for {var}: {value}")]
    InvalidEnv { var: &'static str, value: String },
}

fn parse_millis(var: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    raw.trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| ConfigError::InvalidEnv {
            var,
            value: raw.to_string(),
        })
}

fn parse_bool(var: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidEnv {
            var,
            value: raw.to_string(),
        }),
    }
}

/// Humantime serde module for Duration serialization
mod humantime_serde {
    use std::time::Duration;

    fn parse_duration(s: &str) -> Result<Duration, &'static str> {
        let s = s.trim();
        if let Some(ms) = s.strip_suffix("ms") {
            ms.trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| "invalid milliseconds")
        } else if let Some(secs) = s.strip_suffix('s') {
            secs.trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| "invalid seconds")
        } else if let Some(mins) = s.strip_suffix('m') {
            mins.trim()
                .parse::<u64>()
                .map(|m| Duration::from_secs(m * 60))
                .map_err(|_| "invalid minutes")
        } else {
            // Try parsing as plain seconds
            s.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| "invalid duration format")
        }
    }

    fn format_duration(duration: &Duration) -> String {
        if duration.subsec_millis() == 0 {
            format!("{}s", duration.as_secs())
        } else {
            format!("{}ms", duration.as_millis())
        }
    }

    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer};
        use std::time::Duration;

        pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match duration {
                Some(d) => serializer.serialize_str(&super::format_duration(d)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
        where
            D: Deserializer<'de>,
        {
            let s = Option::<String>::deserialize(deserializer)?;
            match s.as_deref().map(str::trim) {
                None | Some("none") | Some("") => Ok(None),
                Some(s) => super::parse_duration(s)
                    .map(Some)
                    .map_err(serde::de::Error::custom),
            }
        }
    }
}
