//! # DataWedge Telemetry
//!
//! Logging setup for processes embedding the DataWedge client.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use dw_telemetry::{init_logging, TelemetryConfig};
//!
//! let _logging = init_logging(&TelemetryConfig::from_env())?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `DW_LOG_LEVEL` / `RUST_LOG` | `info` | Filter directive |
//! | `DW_JSON_LOGS` | `false` | JSON output |
//! | `DW_CONSOLE_OUTPUT` | `true` | Write to stdout at all |
//! | `DW_SERVICE_NAME` | `datawedge-client` | Service name field |

#![cfg_attr(test, allow(clippy::unwrap_used))]

mod config;
mod logging;

pub use config::{TelemetryConfig, DEFAULT_SERVICE_NAME};
pub use logging::{build_filter, init_logging, LoggingHandle};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TelemetryError {
    #[error("a global tracing subscriber is already installed")]
    AlreadyInitialized,

    #[error("invalid log filter directive: {0}")]
    InvalidFilter(String),
}
