//! Inbound feed message types.
//!
//! Producers disagree on where the message body lives: some send `payload`,
//! others `data`. Frames are normalized here into one shape before they
//! reach a projector.

use crate::error::WsResult;
use serde::Deserialize;
use serde_json::{Map, Value};

/// Discriminator of heartbeat frames.
pub const HEARTBEAT_TYPE: &str = "ping";

// ============================================================================
// Raw frame (wire shape)
// ============================================================================

/// Frame as sent by the server, before normalization.
///
/// `{ type, status?, progress?, payload?, data?, ... }`
#[derive(Debug, Clone, Deserialize)]
pub struct RawFrame {
    /// Message discriminator.
    #[serde(rename = "type")]
    pub kind: String,
    /// Body, for producers that use `payload`.
    #[serde(default)]
    pub payload: Option<Value>,
    /// Body, for producers that use `data`.
    #[serde(default)]
    pub data: Option<Value>,
    /// Remaining top-level fields (`status`, `progress`, domain fields).
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

// ============================================================================
// Normalized message
// ============================================================================

/// Normalized inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedMessage {
    /// Liveness signal. Never reaches a projector.
    Heartbeat,
    /// Domain message to be folded into local state.
    Update(Update),
}

/// Domain message in canonical shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    /// Message discriminator (`status`, `progress`, `liquidation`, ...).
    pub kind: String,
    /// Top-level fields overlaid with the body's object fields.
    pub fields: Map<String, Value>,
    /// Body: `payload` if present, otherwise `data`.
    pub payload: Option<Value>,
}

impl FeedMessage {
    /// Parse a text frame.
    pub fn parse(text: &str) -> WsResult<Self> {
        let raw: RawFrame = serde_json::from_str(text)?;
        Ok(raw.into())
    }

    /// Parse an already-decoded JSON value.
    pub fn from_value(value: Value) -> WsResult<Self> {
        let raw: RawFrame = serde_json::from_value(value)?;
        Ok(raw.into())
    }

    pub fn is_heartbeat(&self) -> bool {
        matches!(self, Self::Heartbeat)
    }

    /// Get the update if this is a domain message.
    pub fn into_update(self) -> Option<Update> {
        match self {
            Self::Update(update) => Some(update),
            Self::Heartbeat => None,
        }
    }
}

impl From<RawFrame> for FeedMessage {
    fn from(raw: RawFrame) -> Self {
        if raw.kind == HEARTBEAT_TYPE {
            return Self::Heartbeat;
        }

        let payload = raw.payload.or(raw.data);

        let mut fields = raw.rest;
        if let Some(Value::Object(body)) = &payload {
            for (key, value) in body {
                fields.insert(key.clone(), value.clone());
            }
        }

        Self::Update(Update {
            kind: raw.kind,
            fields,
            payload,
        })
    }
}

impl Update {
    /// Build an update from a kind and a set of fields.
    pub fn new(kind: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            kind: kind.into(),
            fields,
            payload: None,
        }
    }

    /// Get a field by name.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Get a string field.
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Get a numeric field. Numeric strings are accepted; NaN and
    /// infinities are not.
    pub fn f64_field(&self, key: &str) -> Option<f64> {
        let value = match self.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        };
        value.filter(|v| v.is_finite())
    }

    /// `status` field, if present.
    pub fn status(&self) -> Option<&str> {
        self.str_field("status")
    }

    /// `progress` field, if present.
    pub fn progress(&self) -> Option<f64> {
        self.f64_field("progress")
    }
}
