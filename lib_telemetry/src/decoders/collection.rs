use serde_json::{Map, Value};

use super::{value_at, DecodeError, Decoder};

/// Keyed collection: `sample[0]` is a list of `[name, value]` pairs, each
/// copied into the state map. Names not present in the sample keep their
/// previous value.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyedCollectionDecoder;

impl Decoder for KeyedCollectionDecoder {
    fn decode(&self, state: &mut Value, sample: &Value) -> Result<(), DecodeError> {
        let entries = value_at(sample, &[0])?
            .as_array()
            .ok_or_else(|| DecodeError::UnexpectedType {
                path: "[0]".to_string(),
                expected: "array",
            })?;

        // Validate everything before touching the state.
        let mut pairs = Vec::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            let pair = match entry.as_array() {
                Some(pair) if pair.len() == 2 => pair,
                _ => {
                    return Err(DecodeError::MalformedEntry {
                        index,
                        reason: "expected a [name, value] pair",
                    })
                }
            };
            let name = pair[0].as_str().ok_or(DecodeError::MalformedEntry {
                index,
                reason: "name is not a string",
            })?;
            pairs.push((name, &pair[1]));
        }

        if !state.is_object() {
            *state = Value::Object(Map::new());
        }
        if let Value::Object(map) = state {
            for (name, value) in pairs {
                map.insert(name.to_string(), value.clone());
            }
        }
        Ok(())
    }

    fn default_state(&self) -> Value {
        Value::Object(Map::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn copies_pairs_and_keeps_others() {
        let mut state = json!({"kept": 1});
        KeyedCollectionDecoder
            .decode(&mut state, &json!([[["com.x", 0.1], ["com.y", -0.2]]]))
            .unwrap();
        assert_eq!(state, json!({"kept": 1, "com.x": 0.1, "com.y": -0.2}));
    }

    #[test]
    fn rejects_malformed_entries() {
        let mut state = KeyedCollectionDecoder.default_state();
        let err = KeyedCollectionDecoder
            .decode(&mut state, &json!([[["a", 1], ["b"]]]))
            .unwrap_err();
        assert!(matches!(err, DecodeError::MalformedEntry { index: 1, .. }));

        let err = KeyedCollectionDecoder
            .decode(&mut state, &json!([[[7, 1]]]))
            .unwrap_err();
        assert_eq!(
            err,
            DecodeError::MalformedEntry { index: 0, reason: "name is not a string" }
        );
    }
}
