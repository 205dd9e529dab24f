//! Pending Request Store - correlation map from `(operation, sequence)` to
//! the waiting caller.
//!
//! Every entry is resolved at most once: the first of reply, timeout,
//! cancellation or shutdown removes it, and anything arriving later finds
//! nothing and is dropped.

use crate::domain::correlation::CorrelationKey;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use dw_types::{ClientError, ClientResult};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Outcome delivered to a waiting caller.
pub type ReplyOutcome = ClientResult<Value>;

/// A pending request waiting for its reply
struct PendingRequest {
    sender: oneshot::Sender<ReplyOutcome>,
    created_at: Instant,
}

/// Statistics for the pending request store
#[derive(Debug, Default)]
pub struct PendingStats {
    registered: AtomicU64,
    completed: AtomicU64,
    timed_out: AtomicU64,
    cancelled: AtomicU64,
    late_dropped: AtomicU64,
}

impl PendingStats {
    pub fn registered(&self) -> u64 {
        self.registered.load(Ordering::Relaxed)
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn timed_out(&self) -> u64 {
        self.timed_out.load(Ordering::Relaxed)
    }

    pub fn cancelled(&self) -> u64 {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Replies that arrived with no matching entry (late or unknown).
    pub fn late_dropped(&self) -> u64 {
        self.late_dropped.load(Ordering::Relaxed)
    }
}

/// Pending request store.
///
/// Flow:
/// 1. Dispatcher draws a key and calls `register()` to get a receiver
/// 2. Dispatcher sends the command carrying the key's sequence
/// 3. Intake decodes the reply and calls `complete()`
/// 4. Caller awaits the receiver, or times out and calls `time_out()`
#[derive(Default)]
pub struct PendingRequestStore {
    pending: DashMap<CorrelationKey, PendingRequest>,
    stats: PendingStats,
}

impl PendingRequestStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pending request and get a receiver for its outcome.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if the key is already pending.
    pub fn register(&self, key: CorrelationKey) -> ClientResult<oneshot::Receiver<ReplyOutcome>> {
        let (tx, rx) = oneshot::channel();

        match self.pending.entry(key) {
            Entry::Occupied(_) => {
                return Err(ClientError::InvalidArgument {
                    operation: key.operation,
                    reason: format!("sequence {} is already pending", key.sequence),
                })
            }
            Entry::Vacant(slot) => {
                slot.insert(PendingRequest {
                    sender: tx,
                    created_at: Instant::now(),
                });
            }
        }

        self.stats.registered.fetch_add(1, Ordering::Relaxed);
        debug!(key = %key, "Registered pending request");
        Ok(rx)
    }

    /// Resolve a pending request with a reply.
    ///
    /// `Err` outcomes carry the service's error message and reach the caller
    /// as `ClientError::Service`. Returns false if nothing was waiting.
    pub fn complete(&self, key: CorrelationKey, outcome: Result<Value, String>) -> bool {
        let Some((_, pending)) = self.pending.remove(&key) else {
            self.stats.late_dropped.fetch_add(1, Ordering::Relaxed);
            debug!(key = %key, "Dropping reply with no pending request");
            return false;
        };

        let response_time = pending.created_at.elapsed();
        let outcome = outcome.map_err(|message| ClientError::Service {
            operation: key.operation,
            message,
        });

        match pending.sender.send(outcome) {
            Ok(()) => {
                self.stats.completed.fetch_add(1, Ordering::Relaxed);
                debug!(
                    key = %key,
                    response_time_ms = response_time.as_millis(),
                    "Completed pending request"
                );
                true
            }
            Err(_) => {
                // Receiver was dropped (request cancelled)
                self.stats.cancelled.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, "Pending request receiver dropped");
                false
            }
        }
    }

    /// Remove a request whose caller gave up waiting.
    pub fn time_out(&self, key: CorrelationKey, after: Duration) -> bool {
        if self.pending.remove(&key).is_some() {
            self.stats.timed_out.fetch_add(1, Ordering::Relaxed);
            warn!(
                key = %key,
                timeout_ms = after.as_millis(),
                "Pending request timed out"
            );
            true
        } else {
            false
        }
    }

    /// Cancel a pending request. Its receiver observes `Cancelled`.
    pub fn cancel(&self, key: CorrelationKey) -> bool {
        let Some((_, pending)) = self.pending.remove(&key) else {
            return false;
        };
        self.stats.cancelled.fetch_add(1, Ordering::Relaxed);
        let _ = pending.sender.send(Err(ClientError::Cancelled {
            operation: key.operation,
            sequence: key.sequence,
        }));
        debug!(key = %key, "Cancelled pending request");
        true
    }

    /// Reject every pending request with `error`.
    pub fn reject_all(&self, error: &ClientError) -> usize {
        let keys: Vec<CorrelationKey> = self.pending.iter().map(|e| *e.key()).collect();
        let mut rejected = 0;
        for key in keys {
            if let Some((_, pending)) = self.pending.remove(&key) {
                let _ = pending.sender.send(Err(error.clone()));
                rejected += 1;
            }
        }
        if rejected > 0 {
            debug!(rejected, error = %error, "Rejected all pending requests");
        }
        rejected
    }

    /// Get number of currently pending requests
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Check if a key is pending
    pub fn is_pending(&self, key: &CorrelationKey) -> bool {
        self.pending.contains_key(key)
    }

    /// Get statistics
    pub fn stats(&self) -> &PendingStats {
        &self.stats
    }
}
