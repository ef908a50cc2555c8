//! Live mirror.
//!
//! Client-side copy of server-authoritative state as a flat field map.
//! Each update is merged field by field: fields present in the update
//! overwrite, fields absent from it are left untouched.

use crate::error::{FeedError, FeedResult};
use crate::projector::Projector;
use chrono::{DateTime, Utc};
use pulse_ws::Update;
use serde_json::{Map, Value};

/// Last-write-wins field map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LiveMirror {
    fields: Map<String, Value>,
    /// Incremented on every change.
    revision: u64,
    last_update: Option<DateTime<Utc>>,
}

impl LiveMirror {
    /// Create an empty mirror.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mirror seeded with initial values.
    pub fn with_initial(fields: Map<String, Value>) -> Self {
        Self {
            fields,
            ..Default::default()
        }
    }

    /// Create a mirror seeded from a JSON object.
    pub fn from_value(value: Value) -> FeedResult<Self> {
        match value {
            Value::Object(fields) => Ok(Self::with_initial(fields)),
            other => Err(FeedError::InvalidData(format!(
                "mirror seed must be an object, got {other}"
            ))),
        }
    }

    /// Merge fields over the current state.
    ///
    /// Returns `true` if any value changed.
    pub fn merge(&mut self, fields: &Map<String, Value>) -> bool {
        let mut changed = false;
        for (key, value) in fields {
            if self.fields.get(key) != Some(value) {
                self.fields.insert(key.clone(), value.clone());
                changed = true;
            }
        }

        if changed {
            self.revision += 1;
            self.last_update = Some(Utc::now());
        }
        changed
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Numeric field. Numeric strings are accepted; non-finite values are not.
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        let value = match self.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        };
        value.filter(|v| v.is_finite())
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Copy of the current state as a JSON object.
    pub fn snapshot(&self) -> Value {
        Value::Object(self.fields.clone())
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.last_update
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Projector for LiveMirror {
    fn apply(&mut self, update: &Update) -> bool {
        self.merge(&update.fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_ws::FeedMessage;
    use serde_json::json;

    fn apply_frame(mirror: &mut LiveMirror, frame: Value) -> bool {
        match FeedMessage::from_value(frame).unwrap() {
            FeedMessage::Update(update) => mirror.apply(&update),
            FeedMessage::Heartbeat => false,
        }
    }

    #[test]
    fn test_status_scenario() {
        let mut mirror = LiveMirror::from_value(json!({"status": "inactive", "pnl": 0})).unwrap();

        let changed = apply_frame(
            &mut mirror,
            json!({"type": "status", "status": "active", "pnl": 120.5}),
        );
        assert!(changed);
        assert_eq!(mirror.snapshot(), json!({"status": "active", "pnl": 120.5}));

        let changed = apply_frame(&mut mirror, json!({"type": "ping"}));
        assert!(!changed);
        assert_eq!(mirror.snapshot(), json!({"status": "active", "pnl": 120.5}));
    }

    #[test]
    fn test_heartbeats_never_mutate() {
        let mut mirror = LiveMirror::from_value(json!({"status": "active", "pnl": 3})).unwrap();
        let before = mirror.clone();

        for _ in 0..100 {
            apply_frame(&mut mirror, json!({"type": "ping"}));
        }

        assert_eq!(mirror, before);
        assert_eq!(mirror.revision(), 0);
    }

    #[test]
    fn test_last_write_wins_per_field() {
        let frames = [
            json!({"type": "status", "status": "active", "pnl": 1.0}),
            json!({"type": "status", "pnl": 2.0, "price": 100}),
            json!({"type": "status", "status": "paused"}),
            json!({"type": "status", "price": 101, "pnl": 2.0}),
        ];

        let mut mirror = LiveMirror::new();
        let mut expected = Map::new();
        for frame in frames {
            let update = FeedMessage::from_value(frame)
                .unwrap()
                .into_update()
                .unwrap();
            for (k, v) in &update.fields {
                expected.insert(k.clone(), v.clone());
            }
            mirror.apply(&update);
            assert_eq!(mirror.fields(), &expected);
        }

        assert_eq!(mirror.get_str("status"), Some("paused"));
        assert_eq!(mirror.get_f64("pnl"), Some(2.0));
        assert_eq!(mirror.get_f64("price"), Some(101.0));
    }

    #[test]
    fn test_unchanged_values_do_not_bump_revision() {
        let mut mirror = LiveMirror::new();
        assert!(apply_frame(&mut mirror, json!({"type": "status", "status": "active"})));
        assert_eq!(mirror.revision(), 1);
        assert!(mirror.last_update().is_some());

        assert!(!apply_frame(&mut mirror, json!({"type": "status", "status": "active"})));
        assert_eq!(mirror.revision(), 1);
    }

    #[test]
    fn test_payload_fields_merge_into_mirror() {
        let mut mirror = LiveMirror::new();
        apply_frame(
            &mut mirror,
            json!({"type": "correlation", "data": {"window": "1h"}}),
        );
        assert_eq!(mirror.get_str("window"), Some("1h"));
        assert_eq!(mirror.len(), 1);
    }

    #[test]
    fn test_seed_must_be_object() {
        assert!(LiveMirror::from_value(json!([1, 2])).is_err());
        assert!(LiveMirror::from_value(json!({})).unwrap().is_empty());
    }
}
