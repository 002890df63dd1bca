use serde_json::Value;

use super::{DecodeError, Decoder};

/// Single-value sensor: the state is `sample[0]`, or the sample itself when
/// it is not an array.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScalarDecoder;

impl Decoder for ScalarDecoder {
    fn decode(&self, state: &mut Value, sample: &Value) -> Result<(), DecodeError> {
        *state = match sample {
            Value::Array(items) => items
                .first()
                .cloned()
                .ok_or_else(|| DecodeError::MissingIndex { path: "[0]".to_string() })?,
            other => other.clone(),
        };
        Ok(())
    }

    fn default_state(&self) -> Value {
        Value::from(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn takes_first_element_or_bare_value() {
        let mut state = ScalarDecoder.default_state();
        ScalarDecoder.decode(&mut state, &json!([42.5, 7])).unwrap();
        assert_eq!(state, json!(42.5));
        ScalarDecoder.decode(&mut state, &json!(3)).unwrap();
        assert_eq!(state, json!(3));
    }

    #[test]
    fn empty_array_fails() {
        let mut state = ScalarDecoder.default_state();
        assert!(ScalarDecoder.decode(&mut state, &json!([])).is_err());
    }
}
