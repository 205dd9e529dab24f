//! Ports: the collaborators the client depends on but does not implement.

pub mod outbound;

pub use outbound::{SystemTimeSource, TimeSource, Transport, TransportError};
