//! # Notification Registry
//!
//! Category subscriptions with ordered, isolated fan-out.
//!
//! ## Delivery Rules
//!
//! - Subscribers are visited in insertion order.
//! - Dispatch is serialized, so every listener sees events in arrival order.
//! - Liveness is checked under the entry's gate at the start of each
//!   delivery. Once `unsubscribe` returns, the listener is never invoked again.
//! - A failing or panicking listener is reported to the diagnostic sink and
//!   delivery continues with the next subscriber.

use crate::events::{DeliverySource, EventFilter, SubscriptionHandle};
use crate::listener::{isolate, DiagnosticSink, NotificationListener, TracingSink};
use crate::subscriber::EventStream;
use dw_types::{ClientError, ClientResult, InboundEvent, ListenerError};
use parking_lot::{ReentrantMutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

struct Entry {
    handle: SubscriptionHandle,
    filter: EventFilter,
    listener: Arc<dyn NotificationListener>,
    live: AtomicBool,
    /// Held for the duration of each delivery and by `unsubscribe`.
    gate: ReentrantMutex<()>,
}

/// Delivery counters.
#[derive(Debug, Default)]
pub struct RegistryStats {
    dispatched: AtomicU64,
    delivered: AtomicU64,
    listener_failures: AtomicU64,
}

impl RegistryStats {
    /// Events passed to `dispatch`.
    pub fn dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }

    /// Successful listener invocations.
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Listener errors and panics.
    pub fn listener_failures(&self) -> u64 {
        self.listener_failures.load(Ordering::Relaxed)
    }
}

pub(crate) struct RegistryInner {
    entries: RwLock<Vec<Arc<Entry>>>,
    dispatch_lock: ReentrantMutex<()>,
    sink: Arc<dyn DiagnosticSink>,
    stats: RegistryStats,
}

impl RegistryInner {
    pub(crate) fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        let removed = {
            let mut entries = self.entries.write();
            let position = entries.iter().position(|e| e.handle == handle);
            position.map(|i| entries.remove(i))
        };

        let Some(entry) = removed else {
            return false;
        };

        // Wait out any in-flight delivery before reporting removal.
        let _gate = entry.gate.lock();
        entry.live.store(false, Ordering::Release);
        debug!(subscription = %handle, "Notification subscription removed");
        true
    }
}

/// Registry of notification subscriptions.
///
/// Cheap to clone; clones share the same table. Owned by the client and
/// cleared on shutdown.
#[derive(Clone)]
pub struct NotificationRegistry {
    inner: Arc<RegistryInner>,
}

impl NotificationRegistry {
    /// Create a registry reporting failures through `tracing`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_sink(Arc::new(TracingSink))
    }

    /// Create a registry with a custom diagnostic sink.
    #[must_use]
    pub fn with_sink(sink: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                entries: RwLock::new(Vec::new()),
                dispatch_lock: ReentrantMutex::new(()),
                sink,
                stats: RegistryStats::default(),
            }),
        }
    }

    /// Subscribe a listener.
    ///
    /// # Errors
    ///
    /// `WrongChannel` for `SCAN_RESULT`.
    pub fn subscribe(
        &self,
        filter: EventFilter,
        listener: Arc<dyn NotificationListener>,
    ) -> ClientResult<SubscriptionHandle> {
        if filter.category.is_scan() {
            return Err(ClientError::WrongChannel {
                category: filter.category,
            });
        }

        let handle = SubscriptionHandle::next();
        let entry = Arc::new(Entry {
            handle,
            filter,
            listener,
            live: AtomicBool::new(true),
            gate: ReentrantMutex::new(()),
        });

        debug!(
            subscription = %handle,
            category = %entry.filter.category,
            profile = ?entry.filter.profile,
            "Notification subscription created"
        );
        self.inner.entries.write().push(entry);
        Ok(handle)
    }

    /// Subscribe and receive events as a stream.
    ///
    /// Dropping the stream removes the subscription.
    pub fn subscribe_stream(&self, filter: EventFilter) -> ClientResult<EventStream> {
        let (tx, rx) = mpsc::unbounded_channel();
        let listener = move |event: &InboundEvent| {
            tx.send(event.clone())
                .map_err(|_| ListenerError::failed("event stream closed"))
        };
        let handle = self.subscribe(filter, Arc::new(listener))?;
        Ok(EventStream::new(rx, handle, Arc::downgrade(&self.inner)))
    }

    /// Remove a subscription. Returns `false` if the handle is unknown.
    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        self.inner.unsubscribe(handle)
    }

    /// Remove every subscription.
    pub fn clear(&self) -> usize {
        let drained: Vec<Arc<Entry>> = std::mem::take(&mut *self.inner.entries.write());
        for entry in &drained {
            let _gate = entry.gate.lock();
            entry.live.store(false, Ordering::Release);
        }
        debug!(removed = drained.len(), "Notification registry cleared");
        drained.len()
    }

    /// Fan an event out to every matching live subscription.
    ///
    /// Returns the number of listeners that accepted the event.
    pub fn dispatch(&self, event: &InboundEvent) -> usize {
        let _serial = self.inner.dispatch_lock.lock();
        self.inner.stats.dispatched.fetch_add(1, Ordering::Relaxed);

        let targets: Vec<Arc<Entry>> = self
            .inner
            .entries
            .read()
            .iter()
            .filter(|e| e.filter.matches(event))
            .cloned()
            .collect();

        let mut delivered = 0;
        for entry in targets {
            let _gate = entry.gate.lock();
            if !entry.live.load(Ordering::Acquire) {
                continue;
            }

            match isolate(|| entry.listener.on_event(event)) {
                Ok(()) => {
                    delivered += 1;
                    self.inner.stats.delivered.fetch_add(1, Ordering::Relaxed);
                }
                Err(error) => {
                    self.inner
                        .stats
                        .listener_failures
                        .fetch_add(1, Ordering::Relaxed);
                    self.inner.sink.listener_failed(
                        entry.handle,
                        DeliverySource::Notification(event.category()),
                        &error,
                    );
                }
            }
        }

        debug!(
            category = %event.category(),
            profile = ?event.profile_name(),
            delivered,
            "Notification dispatched"
        );
        delivered
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.entries.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Does the registry hold this handle?
    #[must_use]
    pub fn contains(&self, handle: SubscriptionHandle) -> bool {
        self.inner.entries.read().iter().any(|e| e.handle == handle)
    }

    pub fn stats(&self) -> &RegistryStats {
        &self.inner.stats
    }
}

impl Default for NotificationRegistry {
    fn default() -> Self {
        Self::new()
    }
}
