//! DataWedge Client - typed request/response and publish/subscribe over a
//! one-way broadcast transport.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        DataWedgeClient                           │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  typed call ──▶ options.validate ──▶ CapabilityTable (gate)      │
//! │                                            │                     │
//! │                                            ▼                     │
//! │                ┌────────────────────────────────────────┐        │
//! │                │           CommandDispatcher            │        │
//! │                │  sequence ─▶ PendingRequestStore       │        │
//! │                └──────────────────┬─────────────────────┘        │
//! │                                   │ Transport::send              │
//! └───────────────────────────────────┼──────────────────────────────┘
//!                                     ▼
//!                               DataWedge service
//!                                     │ broadcast
//!                                     ▼
//!                ┌────────────────────────────────────────┐
//!                │             InboundRouter              │
//!                └──────┬──────────────┬──────────────┬───┘
//!                reply  │ notification │         scan │
//!                       ▼              ▼              ▼
//!              pending waiter  NotificationRegistry  ScanResultChannel
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use dw_client::{ClientConfig, DataWedgeClient};
//!
//! let client = DataWedgeClient::builder(transport)
//!     .config(ClientConfig::from_env()?)
//!     .build()?;
//! let profile = client.get_active_profile().await?;
//! ```
//!
//! The transport adapter feeds every inbound payload to
//! [`DataWedgeClient::deliver`] (or to the shared [`InboundRouter`]).

#![warn(clippy::all)]
#![deny(unsafe_code)]
// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod client;
pub mod domain;
pub mod ipc;
pub mod ports;

// Re-exports for public API
pub use client::{DataWedgeClient, DataWedgeClientBuilder};
pub use domain::config::{ClientConfig, ConfigError};
pub use domain::correlation::CorrelationKey;
pub use domain::pending::PendingStats;
pub use ipc::{CancelHandle, InboundRouter, IntakeStats, InvokeOptions, PendingReply, Routed};
pub use ports::{SystemTimeSource, TimeSource, Transport, TransportError};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
