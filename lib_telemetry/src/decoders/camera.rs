use serde_json::Value;

use super::{DecodeError, Decoder};

/// Camera frames are stored as received and emitted unflattened.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpaqueFrameDecoder;

impl Decoder for OpaqueFrameDecoder {
    fn decode(&self, state: &mut Value, sample: &Value) -> Result<(), DecodeError> {
        *state = sample.clone();
        Ok(())
    }

    fn default_state(&self) -> Value {
        Value::from(0)
    }

    fn is_opaque(&self) -> bool {
        true
    }

    fn replaces_state(&self) -> bool {
        true
    }
}
