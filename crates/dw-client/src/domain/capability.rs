//! Capability Table - version gating before dispatch.
//!
//! Holds the session's cached [`CapabilitySnapshot`] and compares it with
//! each operation's minimum version. The table never fetches on its own;
//! the client decides when to query `getVersionInfo`.

use dw_types::{CapabilitySnapshot, ClientError, ClientResult, Operation};
use parking_lot::RwLock;
use tracing::debug;

#[derive(Debug, Default)]
pub struct CapabilityTable {
    snapshot: RwLock<Option<CapabilitySnapshot>>,
}

impl CapabilityTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table pre-seeded with a snapshot.
    pub fn with_snapshot(snapshot: CapabilitySnapshot) -> Self {
        Self {
            snapshot: RwLock::new(Some(snapshot)),
        }
    }

    /// Check whether `operation` may be sent.
    ///
    /// Ungated operations always pass. Gated operations need a cached,
    /// error-free snapshot at or above the gate.
    pub fn check_supported(&self, operation: Operation) -> ClientResult<()> {
        let Some(required) = operation.min_version() else {
            return Ok(());
        };

        let guard = self.snapshot.read();
        let Some(snapshot) = guard.as_ref() else {
            return Err(ClientError::CapabilityUnknown {
                operation,
                reason: "no capability snapshot cached".into(),
            });
        };

        if let Some(error) = &snapshot.error {
            return Err(ClientError::CapabilityUnknown {
                operation,
                reason: error.clone(),
            });
        }

        if snapshot.version.satisfies(&required) {
            Ok(())
        } else {
            Err(ClientError::UnsupportedOperation {
                operation,
                min_version_required: required,
                current_version: snapshot.version,
            })
        }
    }

    /// True when a gated call would need a fetch first.
    pub fn needs_fetch(&self, operation: Operation) -> bool {
        operation.min_version().is_some() && self.snapshot.read().is_none()
    }

    /// Replace the cached snapshot.
    pub fn store(&self, snapshot: CapabilitySnapshot) {
        debug!(
            version = %snapshot.version,
            known = snapshot.is_known(),
            features = snapshot.supported_features.len(),
            "Capability snapshot cached"
        );
        *self.snapshot.write() = Some(snapshot);
    }

    /// Drop the cached snapshot.
    pub fn invalidate(&self) -> Option<CapabilitySnapshot> {
        let previous = self.snapshot.write().take();
        if previous.is_some() {
            debug!("Capability snapshot invalidated");
        }
        previous
    }

    pub fn snapshot(&self) -> Option<CapabilitySnapshot> {
        self.snapshot.read().clone()
    }

    pub fn is_cached(&self) -> bool {
        self.snapshot.read().is_some()
    }
}
