//! Domain layer: configuration, capability gating and reply correlation.

pub mod capability;
pub mod config;
pub mod correlation;
pub mod pending;

// Re-exports for convenience
pub use capability::CapabilityTable;
pub use config::{CapabilityConfig, ClientConfig, ConfigError, DispatchConfig, ScanConfig};
pub use correlation::{CorrelationKey, SequenceGenerator};
pub use pending::{PendingRequestStore, PendingStats, ReplyOutcome};
