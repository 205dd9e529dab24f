//! Command Dispatcher - typed call to transport send, with reply correlation.
//!
//! Reply-expecting calls register a pending entry under a fresh
//! `(operation, sequence)` key, embed the sequence in the payload and
//! suspend until the matching reply, a timeout, a cancellation or shutdown.

use crate::domain::correlation::{CorrelationKey, SequenceGenerator};
use crate::domain::pending::{PendingRequestStore, PendingStats, ReplyOutcome};
use crate::ports::Transport;
use dw_types::envelope::{SEQUENCE_FIELD, TRIGGER_TOKEN_FIELD};
use dw_types::{
    ClientError, ClientResult, Operation, OutboundCommand, ReplyEnvelope, ReplyKind, TriggerToken,
};
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::debug;

/// Per-call dispatch options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InvokeOptions {
    /// Wait for a correlated reply.
    pub expects_reply: bool,
    /// Overrides the dispatcher default. `None` uses the default.
    pub timeout: Option<Duration>,
}

impl InvokeOptions {
    /// Options matching the operation's catalog entry.
    pub fn for_operation(operation: Operation) -> Self {
        Self {
            expects_reply: operation.reply() == ReplyKind::Direct,
            timeout: None,
        }
    }

    pub fn fire_and_forget() -> Self {
        Self {
            expects_reply: false,
            timeout: None,
        }
    }

    pub fn expecting_reply() -> Self {
        Self {
            expects_reply: true,
            timeout: None,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Cancels a pending request from anywhere. Cheap to clone.
#[derive(Clone)]
pub struct CancelHandle {
    key: CorrelationKey,
    store: Arc<PendingRequestStore>,
}

impl CancelHandle {
    /// Cancel the request. Returns false if it already resolved.
    pub fn cancel(&self) -> bool {
        self.store.cancel(self.key)
    }

    pub fn key(&self) -> CorrelationKey {
        self.key
    }
}

/// Handle to an in-flight reply-expecting request.
///
/// Dropping an unfinished handle cancels the request.
pub struct PendingReply {
    key: CorrelationKey,
    receiver: oneshot::Receiver<ReplyOutcome>,
    store: Arc<PendingRequestStore>,
    timeout: Option<Duration>,
    finished: bool,
    on_reply: Option<ReplyObserver>,
}

type ReplyObserver = Box<dyn FnOnce(&Value) + Send>;

impl PendingReply {
    pub fn key(&self) -> CorrelationKey {
        self.key
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Cancel the request. A later reply is dropped.
    pub fn cancel(&self) -> bool {
        self.store.cancel(self.key)
    }

    /// Detachable cancel handle for use from another task.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            key: self.key,
            store: self.store.clone(),
        }
    }

    /// Run `observer` on the reply data if the request succeeds.
    #[must_use]
    pub(crate) fn on_reply(mut self, observer: impl FnOnce(&Value) + Send + 'static) -> Self {
        self.on_reply = Some(Box::new(observer));
        self
    }

    /// Wait for the reply, the timeout or a cancellation.
    pub async fn wait(mut self) -> ClientResult<Value> {
        let key = self.key;
        let received = match self.timeout {
            None => (&mut self.receiver).await,
            Some(limit) => match tokio::time::timeout(limit, &mut self.receiver).await {
                Ok(received) => received,
                Err(_) => return self.expire(limit),
            },
        };

        self.finished = true;
        match received {
            Ok(outcome) => self.settle(outcome),
            Err(_) => Err(ClientError::Cancelled {
                operation: key.operation,
                sequence: key.sequence,
            }),
        }
    }

    /// Resolve after the timer fired.
    ///
    /// If a reply or cancellation claimed the entry first, its outcome is
    /// already in the channel and wins over the timeout.
    fn expire(&mut self, limit: Duration) -> ClientResult<Value> {
        let key = self.key;
        self.finished = true;
        if self.store.time_out(key, limit) {
            return Err(ClientError::RequestTimeout {
                operation: key.operation,
                sequence: key.sequence,
                timeout: limit,
            });
        }

        match self.receiver.try_recv() {
            Ok(outcome) => self.settle(outcome),
            Err(_) => Err(ClientError::Cancelled {
                operation: key.operation,
                sequence: key.sequence,
            }),
        }
    }

    fn settle(&mut self, outcome: ReplyOutcome) -> ClientResult<Value> {
        if let (Ok(data), Some(observer)) = (&outcome, self.on_reply.take()) {
            observer(data);
        }
        outcome
    }
}

impl Drop for PendingReply {
    fn drop(&mut self) {
        if !self.finished && self.store.cancel(self.key) {
            debug!(key = %self.key, "Pending reply dropped before completion");
        }
    }
}

/// Command dispatcher.
pub struct CommandDispatcher {
    transport: Arc<dyn Transport>,
    pending: Arc<PendingRequestStore>,
    sequences: SequenceGenerator,
    default_timeout: Option<Duration>,
    closed: AtomicBool,
}

impl CommandDispatcher {
    pub fn new(transport: Arc<dyn Transport>, default_timeout: Option<Duration>) -> Self {
        Self {
            transport,
            pending: Arc::new(PendingRequestStore::new()),
            sequences: SequenceGenerator::new(),
            default_timeout,
            closed: AtomicBool::new(false),
        }
    }

    /// Send a command and, if requested, wait for its reply.
    ///
    /// Fire-and-forget calls resolve to `Value::Null` once sent.
    pub async fn invoke(
        &self,
        operation: Operation,
        payload: Value,
        options: InvokeOptions,
    ) -> ClientResult<Value> {
        if !options.expects_reply {
            self.send(operation, payload).await?;
            return Ok(Value::Null);
        }

        self.start(operation, payload, options.timeout)
            .await?
            .wait()
            .await
    }

    /// Register and send a reply-expecting command without waiting.
    pub async fn start(
        &self,
        operation: Operation,
        payload: Value,
        timeout: Option<Duration>,
    ) -> ClientResult<PendingReply> {
        self.ensure_open()?;
        let mut body = object_payload(operation, payload)?;

        let key = self.sequences.next_key(operation);
        body.insert(SEQUENCE_FIELD.into(), Value::from(key.sequence));

        let receiver = self.pending.register(key)?;
        let reply = PendingReply {
            key,
            receiver,
            store: self.pending.clone(),
            timeout: timeout.or(self.default_timeout),
            finished: false,
            on_reply: None,
        };

        // On failure the dropped handle removes the pending entry.
        self.transport
            .send(OutboundCommand::new(operation, Value::Object(body)))
            .await?;

        debug!(key = %key, timeout = ?reply.timeout, "Sent reply-expecting command");
        Ok(reply)
    }

    /// Send a fire-and-forget command.
    pub async fn send(&self, operation: Operation, payload: Value) -> ClientResult<()> {
        self.ensure_open()?;
        let body = object_payload(operation, payload)?;
        self.transport
            .send(OutboundCommand::new(operation, Value::Object(body)))
            .await?;
        debug!(operation = %operation, "Sent command");
        Ok(())
    }

    /// Send a soft trigger carrying `token`. Returns the sequence used.
    pub async fn send_trigger(
        &self,
        operation: Operation,
        payload: Value,
        token: TriggerToken,
    ) -> ClientResult<u64> {
        self.ensure_open()?;
        let mut body = object_payload(operation, payload)?;

        let sequence = self.sequences.next();
        body.insert(SEQUENCE_FIELD.into(), Value::from(sequence));
        body.insert(
            TRIGGER_TOKEN_FIELD.into(),
            Value::String(token.to_string()),
        );

        self.transport
            .send(OutboundCommand::new(operation, Value::Object(body)))
            .await?;
        debug!(operation = %operation, sequence, token = %token, "Sent soft trigger");
        Ok(sequence)
    }

    /// Route a decoded reply to its waiter. Returns false for late or
    /// unknown replies, which are dropped.
    pub fn handle_reply(&self, reply: ReplyEnvelope) -> bool {
        let key = CorrelationKey::new(reply.operation, reply.sequence);
        self.pending.complete(key, reply.outcome)
    }

    /// Reject all pending requests and refuse new ones.
    pub fn close(&self) -> usize {
        self.closed.store(true, Ordering::Release);
        self.pending.reject_all(&ClientError::ShutDown)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout
    }

    pub fn pending_count(&self) -> usize {
        self.pending.pending_count()
    }

    pub fn stats(&self) -> &PendingStats {
        self.pending.stats()
    }

    fn ensure_open(&self) -> ClientResult<()> {
        if self.is_closed() {
            Err(ClientError::ShutDown)
        } else {
            Ok(())
        }
    }
}

/// Accept an object or null; anything else is `InvalidArgument`.
fn object_payload(operation: Operation, payload: Value) -> ClientResult<Map<String, Value>> {
    match payload {
        Value::Object(map) => {
            for reserved in [SEQUENCE_FIELD, TRIGGER_TOKEN_FIELD] {
                if map.contains_key(reserved) {
                    return Err(ClientError::InvalidArgument {
                        operation,
                        reason: format!("'{reserved}' is reserved for correlation"),
                    });
                }
            }
            Ok(map)
        }
        Value::Null => Ok(Map::new()),
        other => Err(ClientError::InvalidArgument {
            operation,
            reason: format!("payload must be an object, got {}", json_kind(&other)),
        }),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
