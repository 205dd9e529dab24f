//! # Subscription Streams
//!
//! Pull-style alternatives to callback listeners. Each stream owns its
//! subscription: dropping the stream removes it.

use crate::events::SubscriptionHandle;
use crate::registry::RegistryInner;
use crate::scan::ScanInner;
use dw_types::{InboundEvent, ScanResult};
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_stream::Stream;
use tracing::debug;

/// A stream of notifications matching one filter.
///
/// Implements `tokio_stream::Stream` for use with stream combinators.
pub struct EventStream {
    receiver: mpsc::UnboundedReceiver<InboundEvent>,
    handle: SubscriptionHandle,
    registry: Weak<RegistryInner>,
}

impl EventStream {
    pub(crate) fn new(
        receiver: mpsc::UnboundedReceiver<InboundEvent>,
        handle: SubscriptionHandle,
        registry: Weak<RegistryInner>,
    ) -> Self {
        Self {
            receiver,
            handle,
            registry,
        }
    }

    /// Receive the next event.
    ///
    /// Returns `None` once the subscription has been removed and the queue
    /// is drained.
    pub async fn recv(&mut self) -> Option<InboundEvent> {
        self.receiver.recv().await
    }

    /// Non-blocking receive.
    pub fn try_recv(&mut self) -> Option<InboundEvent> {
        self.receiver.try_recv().ok()
    }

    /// Handle of the underlying subscription.
    #[must_use]
    pub fn handle(&self) -> SubscriptionHandle {
        self.handle
    }
}

impl Stream for EventStream {
    type Item = InboundEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.unsubscribe(self.handle);
        }
        debug!(subscription = %self.handle, "Event stream dropped");
    }
}

/// A stream of every scan result.
pub struct ScanStream {
    receiver: mpsc::UnboundedReceiver<Arc<ScanResult>>,
    handle: SubscriptionHandle,
    channel: Weak<ScanInner>,
}

impl ScanStream {
    pub(crate) fn new(
        receiver: mpsc::UnboundedReceiver<Arc<ScanResult>>,
        handle: SubscriptionHandle,
        channel: Weak<ScanInner>,
    ) -> Self {
        Self {
            receiver,
            handle,
            channel,
        }
    }

    /// Receive the next scan result.
    pub async fn recv(&mut self) -> Option<ScanResult> {
        self.receiver.recv().await.map(|scan| (*scan).clone())
    }

    /// Non-blocking receive.
    pub fn try_recv(&mut self) -> Option<ScanResult> {
        self.receiver.try_recv().ok().map(|scan| (*scan).clone())
    }

    #[must_use]
    pub fn handle(&self) -> SubscriptionHandle {
        self.handle
    }
}

impl Stream for ScanStream {
    type Item = ScanResult;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver
            .poll_recv(cx)
            .map(|scan| scan.map(|s| (*s).clone()))
    }
}

impl Drop for ScanStream {
    fn drop(&mut self) {
        if let Some(channel) = self.channel.upgrade() {
            channel.unsubscribe(self.handle);
        }
        debug!(subscription = %self.handle, "Scan stream dropped");
    }
}
