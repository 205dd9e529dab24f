//! # DataWedge Bus - Notification and Scan Fan-out
//!
//! Routes uncorrelated inbound payloads to subscribers.
//!
//! ## Channels
//!
//! ```text
//!                    ┌───────────────────────┐
//!  notification ───▶ │ NotificationRegistry  │ ──▶ listeners (insertion order,
//!                    │ category + profile    │     synchronous, isolated)
//!                    └───────────────────────┘
//!                    ┌───────────────────────┐
//!  scan ───────────▶ │ ScanResultChannel     │ ──▶ per-listener queues
//!                    │ TriggerSlot           │ ──▶ in-flight soft trigger
//!                    └───────────────────────┘
//! ```
//!
//! Listener failures never reach the intake. They are caught, counted and
//! handed to a [`DiagnosticSink`].

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod events;
pub mod listener;
pub mod registry;
pub mod scan;
pub mod subscriber;

// Re-export main types
pub use events::{DeliverySource, EventFilter, SubscriptionHandle};
pub use listener::{DiagnosticSink, NotificationListener, ScanListener, TracingSink};
pub use registry::{NotificationRegistry, RegistryStats};
pub use scan::{ScanResultChannel, ScanStats, TriggerSlot};
pub use subscriber::{EventStream, ScanStream};
