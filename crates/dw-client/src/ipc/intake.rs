//! Inbound intake - single entry point for every payload the service
//! broadcasts back.
//!
//! Replies go to the dispatcher, notifications to the registry, scans to
//! the scan channel. Nothing that arrives here is ever surfaced as an error
//! to the transport: undecodable payloads are logged and counted.

use crate::ipc::dispatcher::CommandDispatcher;
use crate::ports::TimeSource;
use dw_bus::{NotificationRegistry, ScanResultChannel};
use dw_types::{InboundMessage, NotificationCategory, Operation};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// What happened to one inbound payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routed {
    /// Reply handed to its waiter.
    Reply { operation: Operation, sequence: u64 },
    /// Reply with no waiter (late, cancelled or unknown).
    LateReply { operation: Operation, sequence: u64 },
    /// Notification fanned out to this many listeners.
    Notification {
        category: NotificationCategory,
        delivered: usize,
    },
    /// Scan queued for this many listeners.
    Scan { queued: usize },
    /// Scan dropped because intake is not enabled yet.
    ScanIgnored,
    /// Payload could not be decoded.
    Rejected,
}

/// Intake statistics
#[derive(Debug, Default)]
pub struct IntakeStats {
    received: AtomicU64,
    replies: AtomicU64,
    notifications: AtomicU64,
    scans: AtomicU64,
    scans_ignored: AtomicU64,
    rejected: AtomicU64,
}

impl IntakeStats {
    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    pub fn replies(&self) -> u64 {
        self.replies.load(Ordering::Relaxed)
    }

    pub fn notifications(&self) -> u64 {
        self.notifications.load(Ordering::Relaxed)
    }

    pub fn scans(&self) -> u64 {
        self.scans.load(Ordering::Relaxed)
    }

    pub fn scans_ignored(&self) -> u64 {
        self.scans_ignored.load(Ordering::Relaxed)
    }

    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }
}

/// Routes decoded inbound payloads.
pub struct InboundRouter {
    dispatcher: Arc<CommandDispatcher>,
    registry: NotificationRegistry,
    scans: ScanResultChannel,
    time: Arc<dyn TimeSource>,
    scan_intake: AtomicBool,
    stats: IntakeStats,
}

impl InboundRouter {
    pub fn new(
        dispatcher: Arc<CommandDispatcher>,
        registry: NotificationRegistry,
        scans: ScanResultChannel,
        time: Arc<dyn TimeSource>,
        scan_intake: bool,
    ) -> Self {
        Self {
            dispatcher,
            registry,
            scans,
            time,
            scan_intake: AtomicBool::new(scan_intake),
            stats: IntakeStats::default(),
        }
    }

    /// Decode and route one raw payload.
    pub fn deliver(&self, raw: Value) -> Routed {
        self.stats.received.fetch_add(1, Ordering::Relaxed);

        let message = match InboundMessage::parse(raw, self.time.now_ms()) {
            Ok(message) => message,
            Err(e) => {
                self.stats.rejected.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "Dropping undecodable inbound payload");
                return Routed::Rejected;
            }
        };

        self.route(message)
    }

    /// Route an already decoded message.
    pub fn route(&self, message: InboundMessage) -> Routed {
        match message {
            InboundMessage::Reply(reply) => {
                self.stats.replies.fetch_add(1, Ordering::Relaxed);
                let (operation, sequence) = (reply.operation, reply.sequence);
                if self.dispatcher.handle_reply(reply) {
                    Routed::Reply {
                        operation,
                        sequence,
                    }
                } else {
                    Routed::LateReply {
                        operation,
                        sequence,
                    }
                }
            }
            InboundMessage::Notification(event) => {
                self.stats.notifications.fetch_add(1, Ordering::Relaxed);
                let category = event.category();
                let delivered = self.registry.dispatch(&event);
                trace!(category = %category, delivered, "Notification routed");
                Routed::Notification {
                    category,
                    delivered,
                }
            }
            InboundMessage::Scan(scan) => {
                // Triggered reads are always accepted so their waiter resolves.
                if !self.scan_intake_enabled() && scan.trigger_token.is_none() {
                    self.stats.scans_ignored.fetch_add(1, Ordering::Relaxed);
                    debug!("Scan dropped; scan listener not registered");
                    return Routed::ScanIgnored;
                }
                self.stats.scans.fetch_add(1, Ordering::Relaxed);
                let queued = self.scans.publish(scan);
                Routed::Scan { queued }
            }
        }
    }

    pub fn enable_scan_intake(&self) {
        if !self.scan_intake.swap(true, Ordering::AcqRel) {
            debug!("Scan intake enabled");
        }
    }

    pub fn disable_scan_intake(&self) {
        self.scan_intake.store(false, Ordering::Release);
    }

    pub fn scan_intake_enabled(&self) -> bool {
        self.scan_intake.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> &IntakeStats {
        &self.stats
    }
}
