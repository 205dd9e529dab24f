//! # Error Types
//!
//! Defines the error taxonomy surfaced to callers of the client, plus the
//! listener and wire errors that stay inside the intake path.

use crate::events::NotificationCategory;
use crate::operation::Operation;
use crate::version::ServiceVersion;
use std::time::Duration;
use thiserror::Error;

/// Errors returned by client operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    /// The cached service version is below the operation's gate.
    #[error(
        "{operation} requires service {min_version_required}, current version is {current_version}"
    )]
    UnsupportedOperation {
        operation: Operation,
        min_version_required: ServiceVersion,
        current_version: ServiceVersion,
    },

    /// No usable capability snapshot is cached.
    #[error("capability unknown for {operation}: {reason}")]
    CapabilityUnknown { operation: Operation, reason: String },

    /// The call payload was malformed. Raised before any transport send.
    #[error("invalid argument for {operation}: {reason}")]
    InvalidArgument { operation: Operation, reason: String },

    /// No correlated reply arrived in time.
    #[error("{operation} (sequence {sequence}) timed out after {timeout:?}")]
    RequestTimeout {
        operation: Operation,
        sequence: u64,
        timeout: Duration,
    },

    /// The caller cancelled the request.
    #[error("{operation} (sequence {sequence}) was cancelled")]
    Cancelled { operation: Operation, sequence: u64 },

    /// A soft trigger is already waiting for its scan result.
    #[error("{operation} rejected: a soft trigger is already in flight")]
    TriggerAlreadyInFlight { operation: Operation },

    /// `SCAN_RESULT` must go through the scan result channel.
    #[error("{category} is not served by the notification registry; use the scan result channel")]
    WrongChannel { category: NotificationCategory },

    /// The service answered with an error.
    #[error("service rejected {operation}: {message}")]
    Service { operation: Operation, message: String },

    /// The reply did not match the operation's response shape.
    #[error("malformed reply for {operation}: {reason}")]
    MalformedReply { operation: Operation, reason: String },

    /// The transport failed to send.
    #[error("transport error: {0}")]
    Transport(String),

    /// A queued listener needs a Tokio runtime to run on.
    #[error("no Tokio runtime available to drive listener delivery")]
    RuntimeUnavailable,

    /// The client was shut down.
    #[error("client shut down")]
    ShutDown,
}

impl ClientError {
    /// Errors the caller may reasonably retry after some corrective action.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedOperation { .. }
                | Self::CapabilityUnknown { .. }
                | Self::RequestTimeout { .. }
                | Self::TriggerAlreadyInFlight { .. }
                | Self::Transport(_)
        )
    }

    /// Operation this error refers to, if any.
    #[must_use]
    pub fn operation(&self) -> Option<Operation> {
        match self {
            Self::UnsupportedOperation { operation, .. }
            | Self::CapabilityUnknown { operation, .. }
            | Self::InvalidArgument { operation, .. }
            | Self::RequestTimeout { operation, .. }
            | Self::Cancelled { operation, .. }
            | Self::TriggerAlreadyInFlight { operation }
            | Self::Service { operation, .. }
            | Self::MalformedReply { operation, .. } => Some(*operation),
            Self::WrongChannel { .. }
            | Self::Transport(_)
            | Self::RuntimeUnavailable
            | Self::ShutDown => None,
        }
    }
}

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Error raised by a listener callback during fan-out.
///
/// Never propagated to the intake; reported to the diagnostic sink.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ListenerError {
    /// The listener returned an error.
    #[error("listener failed: {0}")]
    Failed(String),

    /// The listener panicked.
    #[error("listener panicked: {0}")]
    Panicked(String),
}

impl ListenerError {
    /// Convenience constructor.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// An inbound payload that could not be decoded.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WireError {
    /// Payload is not a JSON object.
    #[error("inbound payload is not an object")]
    NotAnObject,

    /// The `kind` discriminator is missing.
    #[error("inbound payload has no 'kind' field")]
    MissingKind,

    /// The `kind` discriminator is not recognised.
    #[error("unknown inbound kind: {0}")]
    UnknownKind(String),

    /// The payload body did not match its kind.
    #[error("malformed {kind} payload: {reason}")]
    Malformed { kind: &'static str, reason: String },
}
