//! # Wire Envelopes
//!
//! Outbound commands handed to the transport and the decoded form of
//! inbound payloads.
//!
//! ## Correlation Contract
//!
//! - Reply-expecting commands carry a `sequence` number inside their payload.
//! - The transport MUST echo that number verbatim in the reply.
//! - Soft triggers additionally carry a `triggerToken` that the transport
//!   MUST echo on the resulting scan payload.
//!
//! ## Inbound Shapes
//!
//! ```text
//! {"kind":"reply","operation":"getActiveProfile","sequence":7,"data":{..}}
//! {"kind":"reply","operation":"getConfig","sequence":8,"error":"..."}
//! {"kind":"notification","notificationType":"PROFILE_SWITCH","profileName":"P1"}
//! {"kind":"scan","data":"0123","labelType":"EAN13","triggerToken":"..."}
//! ```

use crate::errors::WireError;
use crate::events::{
    InboundEvent, NotificationPayload, ScanResult, TriggerToken, DEFAULT_SCAN_SOURCE,
    UNKNOWN_LABEL_TYPE,
};
use crate::operation::Operation;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Payload field carrying the correlation sequence.
pub const SEQUENCE_FIELD: &str = "sequence";

/// Payload field carrying the soft-trigger token.
pub const TRIGGER_TOKEN_FIELD: &str = "triggerToken";

/// Inbound discriminator field.
pub const KIND_FIELD: &str = "kind";

const KIND_REPLY: &str = "reply";
const KIND_NOTIFICATION: &str = "notification";
const KIND_SCAN: &str = "scan";

/// A command as handed to the transport.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundCommand {
    /// Operation to run.
    pub operation: Operation,
    /// Structured payload (always a JSON object).
    pub payload: Value,
}

impl OutboundCommand {
    /// Create a command.
    #[must_use]
    pub fn new(operation: Operation, payload: Value) -> Self {
        Self { operation, payload }
    }

    /// Embedded correlation sequence, if any.
    #[must_use]
    pub fn sequence(&self) -> Option<u64> {
        self.payload.get(SEQUENCE_FIELD).and_then(Value::as_u64)
    }

    /// Embedded trigger token, if any.
    #[must_use]
    pub fn trigger_token(&self) -> Option<TriggerToken> {
        self.payload
            .get(TRIGGER_TOKEN_FIELD)
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
    }
}

/// A reply correlated by (operation, sequence).
#[derive(Debug, Clone, PartialEq)]
pub struct ReplyEnvelope {
    pub operation: Operation,
    pub sequence: u64,
    /// Reply data, or the service's error message.
    pub outcome: Result<Value, String>,
}

impl ReplyEnvelope {
    /// Successful reply.
    #[must_use]
    pub fn ok(operation: Operation, sequence: u64, data: Value) -> Self {
        Self {
            operation,
            sequence,
            outcome: Ok(data),
        }
    }

    /// Failed reply.
    #[must_use]
    pub fn error(operation: Operation, sequence: u64, message: impl Into<String>) -> Self {
        Self {
            operation,
            sequence,
            outcome: Err(message.into()),
        }
    }
}

/// Decoded inbound payload.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    Reply(ReplyEnvelope),
    Notification(InboundEvent),
    Scan(ScanResult),
}

#[derive(Deserialize)]
struct RawReply {
    operation: Operation,
    sequence: u64,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawScan {
    data: String,
    #[serde(default)]
    label_type: Option<String>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    timestamp: Option<u64>,
    #[serde(default)]
    trigger_token: Option<TriggerToken>,
}

fn malformed(kind: &'static str, err: serde_json::Error) -> WireError {
    WireError::Malformed {
        kind,
        reason: err.to_string(),
    }
}

impl InboundMessage {
    /// Decode a raw inbound payload.
    ///
    /// `now_ms` stamps notifications and scans that arrive without a timestamp.
    pub fn parse(raw: Value, now_ms: u64) -> Result<Self, WireError> {
        let kind = match &raw {
            Value::Object(map) => match map.get(KIND_FIELD) {
                Some(Value::String(kind)) => kind.clone(),
                Some(_) | None => return Err(WireError::MissingKind),
            },
            _ => return Err(WireError::NotAnObject),
        };

        match kind.as_str() {
            KIND_REPLY => {
                let reply: RawReply =
                    serde_json::from_value(raw).map_err(|e| malformed(KIND_REPLY, e))?;
                let outcome = match reply.error {
                    Some(message) => Err(message),
                    None => Ok(reply.data.unwrap_or(Value::Null)),
                };
                Ok(Self::Reply(ReplyEnvelope {
                    operation: reply.operation,
                    sequence: reply.sequence,
                    outcome,
                }))
            }
            KIND_NOTIFICATION => {
                let timestamp = raw.get("timestamp").and_then(Value::as_u64).unwrap_or(now_ms);
                let payload: NotificationPayload =
                    serde_json::from_value(raw).map_err(|e| malformed(KIND_NOTIFICATION, e))?;
                Ok(Self::Notification(InboundEvent::new(payload, timestamp)))
            }
            KIND_SCAN => {
                let scan: RawScan =
                    serde_json::from_value(raw).map_err(|e| malformed(KIND_SCAN, e))?;
                Ok(Self::Scan(ScanResult {
                    data: scan.data,
                    label_type: scan
                        .label_type
                        .unwrap_or_else(|| UNKNOWN_LABEL_TYPE.to_string()),
                    source: scan
                        .source
                        .unwrap_or_else(|| DEFAULT_SCAN_SOURCE.to_string()),
                    timestamp: scan.timestamp.unwrap_or(now_ms),
                    trigger_token: scan.trigger_token,
                }))
            }
            other => Err(WireError::UnknownKind(other.to_string())),
        }
    }

    /// Encode back into the inbound wire shape.
    ///
    /// Transports and test doubles use this to build payloads for the intake.
    #[must_use]
    pub fn to_payload(&self) -> Value {
        let (kind, body) = match self {
            Self::Reply(reply) => {
                let mut map = Map::new();
                map.insert("operation".into(), Value::String(reply.operation.name().into()));
                map.insert(SEQUENCE_FIELD.into(), Value::from(reply.sequence));
                match &reply.outcome {
                    Ok(data) => map.insert("data".into(), data.clone()),
                    Err(message) => map.insert("error".into(), Value::String(message.clone())),
                };
                (KIND_REPLY, Value::Object(map))
            }
            Self::Notification(event) => (
                KIND_NOTIFICATION,
                serde_json::to_value(event).unwrap_or(Value::Null),
            ),
            Self::Scan(scan) => (KIND_SCAN, serde_json::to_value(scan).unwrap_or(Value::Null)),
        };

        let mut map = match body {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        map.insert(KIND_FIELD.into(), Value::String(kind.into()));
        Value::Object(map)
    }
}
