use std::collections::HashMap;

use serde_json::Value;

/// Current canonical value of every known identifier.
///
/// Entries are created at engine build time with the decoder's default shape
/// and afterwards only replaced by a successful decode.
#[derive(Debug, Clone, Default)]
pub struct StateStore {
    values: HashMap<String, Value>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the value of `id`.
    pub fn set(&mut self, id: &str, value: Value) {
        match self.values.get_mut(id) {
            Some(slot) => *slot = value,
            None => {
                self.values.insert(id.to_string(), value);
            }
        }
    }

    /// Inserts `value` only if `id` has no entry yet.
    pub fn ensure(&mut self, id: &str, value: Value) {
        if !self.values.contains_key(id) {
            self.values.insert(id.to_string(), value);
        }
    }

    pub fn get(&self, id: &str) -> Option<&Value> {
        self.values.get(id)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ensure_keeps_existing_value() {
        let mut store = StateStore::new();
        store.ensure("sens.a", json!({"x": 0}));
        store.set("sens.a", json!({"x": 4}));
        store.ensure("sens.a", json!({"x": 0}));
        assert_eq!(store.get("sens.a"), Some(&json!({"x": 4})));
        assert_eq!(store.len(), 1);
    }
}
