//! # Listeners and Diagnostics
//!
//! Callback traits for notification and scan subscribers, and the sink that
//! receives failures swallowed during fan-out.

use crate::events::{DeliverySource, SubscriptionHandle};
use dw_types::{InboundEvent, ListenerError, ScanResult};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::error;

/// Receives notifications from the registry.
///
/// Runs in the intake's context, so it should return quickly.
pub trait NotificationListener: Send + Sync {
    fn on_event(&self, event: &InboundEvent) -> Result<(), ListenerError>;
}

impl<F> NotificationListener for F
where
    F: Fn(&InboundEvent) -> Result<(), ListenerError> + Send + Sync,
{
    fn on_event(&self, event: &InboundEvent) -> Result<(), ListenerError> {
        self(event)
    }
}

/// Receives scan results from the channel.
///
/// Each listener runs on its own queue; a slow listener only delays itself.
pub trait ScanListener: Send + Sync {
    fn on_scan(&self, scan: &ScanResult) -> Result<(), ListenerError>;
}

impl<F> ScanListener for F
where
    F: Fn(&ScanResult) -> Result<(), ListenerError> + Send + Sync,
{
    fn on_scan(&self, scan: &ScanResult) -> Result<(), ListenerError> {
        self(scan)
    }
}

/// Process-wide destination for listener failures.
pub trait DiagnosticSink: Send + Sync {
    fn listener_failed(
        &self,
        handle: SubscriptionHandle,
        source: DeliverySource,
        error: &ListenerError,
    );
}

/// Default sink: logs at error level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn listener_failed(
        &self,
        handle: SubscriptionHandle,
        source: DeliverySource,
        error: &ListenerError,
    ) {
        error!(
            subscription = %handle,
            source = %source,
            error = %error,
            "Listener failed during fan-out"
        );
    }
}

/// Run a listener callback, turning panics into `ListenerError::Panicked`.
pub(crate) fn isolate<F>(f: F) -> Result<(), ListenerError>
where
    F: FnOnce() -> Result<(), ListenerError>,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(ListenerError::Panicked(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
