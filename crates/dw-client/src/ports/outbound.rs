//! Outbound ports for the DataWedge client.

use async_trait::async_trait;
use dw_types::{ClientError, OutboundCommand};

/// Send primitive of the intent channel.
///
/// Implementations deliver the command to the service and return once it
/// has been handed off. Replies and events come back separately through
/// the client's inbound intake. The transport MUST echo the payload's
/// `sequence` in replies and its `triggerToken` on triggered scans.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, command: OutboundCommand) -> Result<(), TransportError>;
}

/// Transport error types
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("transport closed")]
    Closed,
    #[error("send failed: {0}")]
    SendFailed(String),
    #[error("service unavailable: {0}")]
    Unavailable(String),
}

impl From<TransportError> for ClientError {
    fn from(e: TransportError) -> Self {
        ClientError::Transport(e.to_string())
    }
}

/// Time source trait for testability
pub trait TimeSource: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_ms(&self) -> u64;
}

/// System time implementation
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now_ms(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            // Clock before Unix epoch - return 0 rather than panic
            .unwrap_or(0)
    }
}
