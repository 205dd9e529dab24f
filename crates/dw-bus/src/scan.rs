//! # Scan Result Channel
//!
//! Delivers every barcode/RFID read to every listener, in arrival order,
//! exactly once per listener. Each listener drains its own unbounded queue
//! on a Tokio task, so a slow listener never holds up the others or the
//! intake.
//!
//! The channel also owns the soft-trigger slot: at most one
//! `softScanTrigger`/`softRfidTrigger` may wait for its scan at a time, and
//! only a scan echoing the in-flight token resolves it.

use crate::events::{DeliverySource, SubscriptionHandle};
use crate::listener::{isolate, DiagnosticSink, ScanListener, TracingSink};
use crate::subscriber::ScanStream;
use dw_types::{ClientError, ClientResult, Operation, ScanResult, TriggerToken};
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// Channel counters.
#[derive(Debug, Default)]
pub struct ScanStats {
    published: AtomicU64,
    queued: AtomicU64,
    delivered: AtomicU64,
    listener_failures: AtomicU64,
    triggers_resolved: AtomicU64,
}

impl ScanStats {
    /// Scans passed to `publish`.
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Per-listener enqueues.
    pub fn queued(&self) -> u64 {
        self.queued.load(Ordering::Relaxed)
    }

    /// Successful callback invocations.
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn listener_failures(&self) -> u64 {
        self.listener_failures.load(Ordering::Relaxed)
    }

    pub fn triggers_resolved(&self) -> u64 {
        self.triggers_resolved.load(Ordering::Relaxed)
    }
}

struct InFlightTrigger {
    token: TriggerToken,
    operation: Operation,
    sender: oneshot::Sender<ScanResult>,
}

/// Single slot for the outstanding soft trigger.
#[derive(Default)]
pub struct TriggerSlot {
    in_flight: Mutex<Option<InFlightTrigger>>,
}

impl TriggerSlot {
    /// Claim the slot.
    ///
    /// A slot whose waiter has gone away counts as free.
    ///
    /// # Errors
    ///
    /// `TriggerAlreadyInFlight` if another trigger is still waiting.
    pub fn begin(
        &self,
        operation: Operation,
    ) -> ClientResult<(TriggerToken, oneshot::Receiver<ScanResult>)> {
        let mut slot = self.in_flight.lock();
        if let Some(current) = slot.as_ref() {
            if !current.sender.is_closed() {
                return Err(ClientError::TriggerAlreadyInFlight { operation });
            }
            debug!(token = %current.token, "Reclaiming abandoned trigger slot");
        }

        let token = TriggerToken::new();
        let (sender, receiver) = oneshot::channel();
        *slot = Some(InFlightTrigger {
            token,
            operation,
            sender,
        });
        debug!(operation = %operation, token = %token, "Soft trigger in flight");
        Ok((token, receiver))
    }

    /// Resolve the in-flight trigger if `scan` echoes its token.
    pub fn resolve(&self, scan: &ScanResult) -> bool {
        let Some(token) = scan.trigger_token else {
            return false;
        };

        let mut slot = self.in_flight.lock();
        match slot.as_ref() {
            Some(current) if current.token == token => {}
            _ => return false,
        }

        let Some(trigger) = slot.take() else {
            return false;
        };
        let resolved = trigger.sender.send(scan.clone()).is_ok();
        debug!(
            operation = %trigger.operation,
            token = %token,
            resolved,
            "Soft trigger matched scan result"
        );
        resolved
    }

    /// Free the slot if it still holds `token`.
    pub fn release(&self, token: TriggerToken) -> bool {
        let mut slot = self.in_flight.lock();
        if slot.as_ref().is_some_and(|t| t.token == token) {
            *slot = None;
            return true;
        }
        false
    }

    /// Drop any in-flight trigger. Its waiter observes a closed channel.
    pub fn cancel(&self) -> Option<TriggerToken> {
        self.in_flight.lock().take().map(|t| t.token)
    }

    /// Token of the waiting trigger, if any.
    #[must_use]
    pub fn in_flight(&self) -> Option<TriggerToken> {
        self.in_flight
            .lock()
            .as_ref()
            .filter(|t| !t.sender.is_closed())
            .map(|t| t.token)
    }
}

/// Liveness flag plus the gate a worker holds while its listener runs.
struct Liveness {
    live: AtomicBool,
    gate: ReentrantMutex<()>,
}

impl Liveness {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            live: AtomicBool::new(true),
            gate: ReentrantMutex::new(()),
        })
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    /// Returns once no delivery is running. Re-entrant from the listener.
    fn retire(&self) {
        let _gate = self.gate.lock();
        self.live.store(false, Ordering::Release);
    }
}

struct ScanEntry {
    handle: SubscriptionHandle,
    queue: mpsc::UnboundedSender<Arc<ScanResult>>,
    liveness: Arc<Liveness>,
}

pub(crate) struct ScanInner {
    entries: RwLock<Vec<ScanEntry>>,
    publish_lock: Mutex<()>,
    last_scan: RwLock<Option<ScanResult>>,
    trigger: TriggerSlot,
    sink: Arc<dyn DiagnosticSink>,
    stats: Arc<ScanStats>,
}

impl ScanInner {
    pub(crate) fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        let entry = {
            let mut entries = self.entries.write();
            let Some(position) = entries.iter().position(|e| e.handle == handle) else {
                return false;
            };
            entries.remove(position)
        };
        entry.liveness.retire();
        debug!(subscription = %handle, "Scan subscription removed");
        true
    }
}

/// Fan-out channel for scan results.
#[derive(Clone)]
pub struct ScanResultChannel {
    inner: Arc<ScanInner>,
}

impl ScanResultChannel {
    #[must_use]
    pub fn new() -> Self {
        Self::with_sink(Arc::new(TracingSink))
    }

    #[must_use]
    pub fn with_sink(sink: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            inner: Arc::new(ScanInner {
                entries: RwLock::new(Vec::new()),
                publish_lock: Mutex::new(()),
                last_scan: RwLock::new(None),
                trigger: TriggerSlot::default(),
                sink,
                stats: Arc::new(ScanStats::default()),
            }),
        }
    }

    /// Register a callback listener.
    ///
    /// The listener runs on a task spawned onto the current Tokio runtime.
    ///
    /// # Errors
    ///
    /// `RuntimeUnavailable` when called outside a runtime.
    pub fn on_result(&self, listener: Arc<dyn ScanListener>) -> ClientResult<SubscriptionHandle> {
        let runtime = Handle::try_current().map_err(|_| ClientError::RuntimeUnavailable)?;

        let handle = SubscriptionHandle::next();
        let (queue, mut receiver) = mpsc::unbounded_channel::<Arc<ScanResult>>();
        let liveness = Liveness::new();

        let worker_liveness = liveness.clone();
        let sink = self.inner.sink.clone();
        let stats = self.inner.stats.clone();
        runtime.spawn(async move {
            while let Some(scan) = receiver.recv().await {
                let _gate = worker_liveness.gate.lock();
                if !worker_liveness.is_live() {
                    break;
                }
                match isolate(|| listener.on_scan(&scan)) {
                    Ok(()) => {
                        stats.delivered.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(error) => {
                        stats.listener_failures.fetch_add(1, Ordering::Relaxed);
                        sink.listener_failed(handle, DeliverySource::Scan, &error);
                    }
                }
            }
            debug!(subscription = %handle, "Scan listener worker stopped");
        });

        self.inner.entries.write().push(ScanEntry {
            handle,
            queue,
            liveness,
        });
        debug!(subscription = %handle, "Scan listener registered");
        Ok(handle)
    }

    /// Receive scan results as a stream. Dropping it unsubscribes.
    #[must_use]
    pub fn results(&self) -> ScanStream {
        let handle = SubscriptionHandle::next();
        let (queue, receiver) = mpsc::unbounded_channel();
        self.inner.entries.write().push(ScanEntry {
            handle,
            queue,
            liveness: Liveness::new(),
        });
        debug!(subscription = %handle, "Scan stream registered");
        ScanStream::new(receiver, handle, Arc::downgrade(&self.inner))
    }

    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        self.inner.unsubscribe(handle)
    }

    /// Remove every listener and stream.
    pub fn clear(&self) -> usize {
        let drained = std::mem::take(&mut *self.inner.entries.write());
        for entry in &drained {
            entry.liveness.retire();
        }
        debug!(removed = drained.len(), "Scan channel cleared");
        drained.len()
    }

    /// Accept a scan from the intake.
    ///
    /// Records it as the last scan, resolves a matching soft trigger, then
    /// queues it for every listener. Returns the number of queues reached.
    pub fn publish(&self, scan: ScanResult) -> usize {
        let _serial = self.inner.publish_lock.lock();
        self.inner.stats.published.fetch_add(1, Ordering::Relaxed);

        *self.inner.last_scan.write() = Some(scan.clone());
        if self.inner.trigger.resolve(&scan) {
            self.inner
                .stats
                .triggers_resolved
                .fetch_add(1, Ordering::Relaxed);
        }

        let scan = Arc::new(scan);
        let mut queued = 0;
        let mut closed = Vec::new();
        for entry in self.inner.entries.read().iter() {
            if !entry.liveness.is_live() {
                continue;
            }
            if entry.queue.send(scan.clone()).is_ok() {
                queued += 1;
            } else {
                closed.push(entry.handle);
            }
        }
        self.inner
            .stats
            .queued
            .fetch_add(queued as u64, Ordering::Relaxed);

        for handle in closed {
            warn!(subscription = %handle, "Scan listener queue closed; removing");
            self.inner.unsubscribe(handle);
        }
        queued
    }

    /// Most recent scan seen by the channel.
    #[must_use]
    pub fn last_scan(&self) -> Option<ScanResult> {
        self.inner.last_scan.read().clone()
    }

    pub fn trigger(&self) -> &TriggerSlot {
        &self.inner.trigger
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.entries.read().len()
    }

    #[must_use]
    pub fn contains(&self, handle: SubscriptionHandle) -> bool {
        self.inner.entries.read().iter().any(|e| e.handle == handle)
    }

    pub fn stats(&self) -> &ScanStats {
        &self.inner.stats
    }
}

impl Default for ScanResultChannel {
    fn default() -> Self {
        Self::new()
    }
}
