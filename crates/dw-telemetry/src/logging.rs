//! Subscriber installation.
//!
//! One global `tracing` subscriber per process: an `EnvFilter` built from
//! the configured directive plus either a pretty or a JSON `fmt` layer.

use crate::{TelemetryConfig, TelemetryError};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Proof that logging was initialised by this crate.
#[derive(Debug)]
pub struct LoggingHandle {
    service_name: String,
}

impl LoggingHandle {
    pub fn service_name(&self) -> &str {
        &self.service_name
    }
}

/// Build the filter for `config`.
pub fn build_filter(config: &TelemetryConfig) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_new(&config.log_level)
        .map_err(|e| TelemetryError::InvalidFilter(format!("{}: {e}", config.log_level)))
}

/// Install the global subscriber.
///
/// A second call returns `AlreadyInitialized` rather than panicking.
pub fn init_logging(config: &TelemetryConfig) -> Result<LoggingHandle, TelemetryError> {
    if INITIALIZED.swap(true, Ordering::AcqRel) {
        return Err(TelemetryError::AlreadyInitialized);
    }

    let result = install(config);
    if result.is_err() {
        INITIALIZED.store(false, Ordering::Release);
    }
    result?;

    tracing::info!(
        service = %config.service_name,
        filter = %config.log_level,
        json = config.json_logs,
        "Logging initialized"
    );

    Ok(LoggingHandle {
        service_name: config.service_name.clone(),
    })
}

fn install(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let env_filter = build_filter(config)?;

    if !config.console_output {
        return tracing_subscriber::registry()
            .with(env_filter)
            .try_init()
            .map_err(|_| TelemetryError::AlreadyInitialized);
    }

    if config.json_logs {
        let json_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(json_layer)
            .try_init()
            .map_err(|_| TelemetryError::AlreadyInitialized)
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .with_ansi(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|_| TelemetryError::AlreadyInitialized)
    }
}
