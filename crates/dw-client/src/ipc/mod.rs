//! Request/reply plumbing between the facade and the transport.
//!
//! The dispatcher owns outbound sends and reply correlation; the intake
//! owns every inbound payload and routes it to the dispatcher, the
//! notification registry or the scan channel.

pub mod dispatcher;
pub mod intake;

pub use dispatcher::{CancelHandle, CommandDispatcher, InvokeOptions, PendingReply};
pub use intake::{InboundRouter, IntakeStats, Routed};
