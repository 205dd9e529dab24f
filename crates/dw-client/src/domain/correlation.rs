//! Correlation keys for request/reply matching.
//!
//! A reply is matched by the `(operation, sequence)` pair. Sequences come
//! from a per-dispatcher monotonic counter and are never reused.

use dw_types::Operation;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Key identifying one in-flight request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CorrelationKey {
    pub operation: Operation,
    pub sequence: u64,
}

impl CorrelationKey {
    pub fn new(operation: Operation, sequence: u64) -> Self {
        Self {
            operation,
            sequence,
        }
    }
}

impl fmt::Display for CorrelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.operation, self.sequence)
    }
}

/// Monotonic sequence source.
#[derive(Debug)]
pub struct SequenceGenerator {
    next: AtomicU64,
}

impl SequenceGenerator {
    /// Start at 1. Zero is never issued.
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Next sequence number.
    pub fn next(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    /// Key for the next request of `operation`.
    pub fn next_key(&self, operation: Operation) -> CorrelationKey {
        CorrelationKey::new(operation, self.next())
    }

    /// Number of sequences issued so far.
    pub fn issued(&self) -> u64 {
        self.next.load(Ordering::Relaxed).saturating_sub(1)
    }
}

impl Default for SequenceGenerator {
    fn default() -> Self {
        Self::new()
    }
}
