//! # DataWedge Types Crate
//!
//! Data model shared by every crate in the workspace: the operation
//! catalog with its version gates, capability snapshots, inbound event
//! shapes, wire envelopes, typed request options and replies, and the
//! client error taxonomy.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: the catalog is built once and never mutated.
//! - **Tagged Events**: notification payloads are a variant keyed by category.
//! - **Explicit Correlation**: replies carry the `(operation, sequence)` pair
//!   they answer.

#![warn(clippy::all)]
#![deny(unsafe_code)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod capability;
pub mod envelope;
pub mod errors;
pub mod events;
pub mod operation;
pub mod options;
pub mod replies;
pub mod version;

pub use capability::CapabilitySnapshot;
pub use envelope::{InboundMessage, OutboundCommand, ReplyEnvelope};
pub use errors::*;
pub use events::*;
pub use operation::{
    Operation, OperationDescriptor, OperationGroup, ReplyKind, UnknownOperation, CATALOG,
};
pub use options::*;
pub use version::{ServiceVersion, VersionParseError};
