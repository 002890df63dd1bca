//! # Telemetry Records
//!
//! A record is the unit passed to both history and notification. It is built
//! from `{timestamp, value, id}` and, for every identifier except the opaque
//! binary ones, flattened into a single-level object whose keys are the
//! dot-joined paths from the root to each leaf:
//!
//! ```text
//! {timestamp: 5, value: {acc: {x: 1, y: 2}}, id: "sens.imu"}
//!   -> {"timestamp": 5, "value.acc.x": 1, "value.acc.y": 2, "id": "sens.imu"}
//! ```
//!
//! Key order follows the canonical state's insertion order.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A timestamped, flattened (or opaque) telemetry sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TelemetryRecord(Map<String, Value>);

impl TelemetryRecord {
    /// Builds a flattened record.
    pub fn flattened(timestamp: i64, value: &Value, id: &str) -> Self {
        let mut fields = Map::new();
        fields.insert("timestamp".to_string(), Value::from(timestamp));
        flatten_into(&mut fields, "value", value);
        fields.insert("id".to_string(), Value::from(id));
        Self(fields)
    }

    /// Builds a record carrying `value` as a single unflattened field.
    pub fn opaque(timestamp: i64, value: Value, id: &str) -> Self {
        let mut fields = Map::new();
        fields.insert("timestamp".to_string(), Value::from(timestamp));
        fields.insert("value".to_string(), value);
        fields.insert("id".to_string(), Value::from(id));
        Self(fields)
    }

    /// Record timestamp in Unix milliseconds.
    pub fn timestamp(&self) -> i64 {
        self.0.get("timestamp").and_then(Value::as_i64).unwrap_or_default()
    }

    /// Source identifier.
    pub fn id(&self) -> &str {
        self.0.get("id").and_then(Value::as_str).unwrap_or_default()
    }

    /// A single field by its flattened key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// All fields, in generation order.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// Flattens a nested object into dot-joined leaf keys.
///
/// Arrays are flattened by index. `null` and scalars are leaves; empty objects
/// and arrays contribute no keys.
pub fn flatten(nested: &Map<String, Value>) -> Map<String, Value> {
    let mut flat = Map::new();
    for (key, value) in nested {
        flatten_into(&mut flat, key, value);
    }
    flat
}

fn flatten_into(flat: &mut Map<String, Value>, path: &str, value: &Value) {
    match value {
        Value::Object(children) => {
            for (key, child) in children {
                flatten_into(flat, &format!("{path}.{key}"), child);
            }
        }
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                flatten_into(flat, &format!("{path}.{index}"), item);
            }
        }
        leaf => {
            flat.insert(path.to_string(), leaf.clone());
        }
    }
}

/// Re-nests dot-joined keys into objects. Inverse of [`flatten`] for states
/// built only from objects and leaves.
pub fn unflatten(flat: &Map<String, Value>) -> Value {
    let mut root = Map::new();
    for (path, leaf) in flat {
        let mut node = &mut root;
        let mut segments = path.split('.').peekable();
        while let Some(segment) = segments.next() {
            if segments.peek().is_none() {
                node.insert(segment.to_string(), leaf.clone());
                break;
            }
            let child = node
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !child.is_object() {
                *child = Value::Object(Map::new());
            }
            node = match child {
                Value::Object(map) => map,
                _ => unreachable!("child was just made an object"),
            };
        }
    }
    Value::Object(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn as_map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    #[test]
    fn flattens_under_root_key() {
        let flat = flatten(&as_map(json!({"x": {"a": {"b": 1, "c": 2}}})));
        assert_eq!(Value::Object(flat), json!({"x.a.b": 1, "x.a.c": 2}));
    }

    #[test]
    fn unflatten_recovers_structure() {
        let nested = json!({"x": {"a": {"b": 1, "c": 2}, "d": "log"}});
        let flat = flatten(&as_map(nested.clone()));
        assert_eq!(unflatten(&flat), nested);
    }

    #[test]
    fn record_key_order_follows_state_order() {
        let state = json!({"ori": {"roll": 1, "pitch": 2}, "acc": {"x": 3}});
        let record = TelemetryRecord::flattened(7, &state, "sens.imu");
        let keys: Vec<&str> = record.fields().keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec!["timestamp", "value.ori.roll", "value.ori.pitch", "value.acc.x", "id"]
        );
        assert_eq!(record.timestamp(), 7);
        assert_eq!(record.id(), "sens.imu");
    }

    #[test]
    fn scalar_state_keeps_plain_value_key() {
        let record = TelemetryRecord::flattened(1, &json!(42.5), "temp.sensor");
        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({"timestamp": 1, "value": 42.5, "id": "temp.sensor"})
        );
    }

    #[test]
    fn arrays_flatten_by_index_and_empties_vanish() {
        let record = TelemetryRecord::flattened(1, &json!({"v": [10, 20], "e": {}, "n": null}), "x");
        assert_eq!(record.get("value.v.0"), Some(&json!(10)));
        assert_eq!(record.get("value.v.1"), Some(&json!(20)));
        assert_eq!(record.get("value.n"), Some(&Value::Null));
        assert!(record.fields().keys().all(|k| !k.starts_with("value.e")));
    }

    #[test]
    fn opaque_record_is_not_exploded() {
        let frame = json!("data:image/jpeg;base64,AAAA");
        let record = TelemetryRecord::opaque(3, frame.clone(), "sens.camLeftEye");
        assert_eq!(record.fields().len(), 3);
        assert_eq!(record.get("value"), Some(&frame));
    }
}
