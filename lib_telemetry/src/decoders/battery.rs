use serde_json::Value;

use super::{number_at, slot, zeroed, DecodeError, Decoder};

const FIELDS: [&str; 5] = ["voltage", "current", "charge", "temperature", "status"];

/// Battery status, five flat values in [`FIELDS`] order.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatteryDecoder;

impl Decoder for BatteryDecoder {
    fn decode(&self, state: &mut Value, sample: &Value) -> Result<(), DecodeError> {
        for (i, field) in FIELDS.into_iter().enumerate() {
            *slot(state, &[field]) = number_at(sample, &[i])?;
        }
        Ok(())
    }

    fn default_state(&self) -> Value {
        zeroed(&FIELDS)
    }
}
