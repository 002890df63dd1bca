//! IMU decoders.
//!
//! The legacy inertial port streams 12 flat floats:
//!
//! ```text
//! 0  1  2   Euler orientation (roll, pitch, yaw)
//! 3  4  5   calibrated acceleration (x, y, z)
//! 6  7  8   calibrated gyroscope (x, y, z)
//! 9 10 11   calibrated magnetometer (x, y, z)
//! ```
//!
//! The MAS IMUs stream one channel per measurement kind, each nested as
//! `[channel][sensor][measurement][axis]`: gyroscope on channel 0,
//! accelerometer on 1, magnetometer on 2 and orientation on 3.

use serde_json::Value;

use super::{number_at, slot, zeroed, DecodeError, Decoder};

const GROUPS: [(&str, [&str; 3]); 4] = [
    ("ori", ["roll", "pitch", "yaw"]),
    ("acc", ["x", "y", "z"]),
    ("gyr", ["x", "y", "z"]),
    ("mag", ["x", "y", "z"]),
];

/// MAS channel index of each group, in `GROUPS` order.
const MAS_CHANNELS: [usize; 4] = [3, 1, 0, 2];

/// Identifiers decoded with [`ImuDecoder`].
pub const MAS_IMU_IDS: [&str; 7] = [
    "sens.headIMU",
    "sens.leftArmIMU",
    "sens.rightArmIMU",
    "sens.leftLegIMU",
    "sens.rightLegIMU",
    "sens.leftFootIMU",
    "sens.rightFootIMU",
];

fn imu_state() -> Value {
    Value::Object(
        GROUPS
            .iter()
            .map(|(group, axes)| (group.to_string(), zeroed(axes)))
            .collect(),
    )
}

/// Flat 12-float inertial sample.
#[derive(Debug, Clone, Copy, Default)]
pub struct LegacyImuDecoder;

impl Decoder for LegacyImuDecoder {
    fn decode(&self, state: &mut Value, sample: &Value) -> Result<(), DecodeError> {
        for (g, (group, axes)) in GROUPS.into_iter().enumerate() {
            for (a, axis) in axes.into_iter().enumerate() {
                *slot(state, &[group, axis]) = number_at(sample, &[g * 3 + a])?;
            }
        }
        Ok(())
    }

    fn default_state(&self) -> Value {
        imu_state()
    }
}

/// Multi-channel MAS inertial sample.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImuDecoder;

impl Decoder for ImuDecoder {
    fn decode(&self, state: &mut Value, sample: &Value) -> Result<(), DecodeError> {
        for ((group, axes), channel) in GROUPS.into_iter().zip(MAS_CHANNELS) {
            for (a, axis) in axes.into_iter().enumerate() {
                *slot(state, &[group, axis]) = number_at(sample, &[channel, 0, 0, a])?;
            }
        }
        Ok(())
    }

    fn default_state(&self) -> Value {
        imu_state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn legacy_imu_maps_flat_offsets() {
        let decoder = LegacyImuDecoder;
        let mut state = decoder.default_state();
        let sample = json!([1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0, 12.0]);
        decoder.decode(&mut state, &sample).unwrap();
        assert_eq!(
            state,
            json!({
                "ori": {"roll": 1.0, "pitch": 2.0, "yaw": 3.0},
                "acc": {"x": 4.0, "y": 5.0, "z": 6.0},
                "gyr": {"x": 7.0, "y": 8.0, "z": 9.0},
                "mag": {"x": 10.0, "y": 11.0, "z": 12.0}
            })
        );
    }

    #[test]
    fn mas_imu_reads_channels() {
        let decoder = ImuDecoder;
        let mut state = decoder.default_state();
        let channel = |c: i64| json!([[[c * 10, c * 10 + 1, c * 10 + 2]]]);
        let sample = json!([channel(0), channel(1), channel(2), channel(3)]);
        decoder.decode(&mut state, &sample).unwrap();
        assert_eq!(state["gyr"]["x"], json!(0));
        assert_eq!(state["acc"]["y"], json!(11));
        assert_eq!(state["mag"]["z"], json!(22));
        assert_eq!(state["ori"]["roll"], json!(30));
    }

    #[test]
    fn short_sample_is_an_error() {
        let decoder = LegacyImuDecoder;
        let mut state = decoder.default_state();
        let err = decoder.decode(&mut state, &json!([1.0, 2.0])).unwrap_err();
        assert_eq!(err, DecodeError::MissingIndex { path: "[2]".to_string() });
    }

    #[test]
    fn default_state_is_zeroed_in_order() {
        let state = ImuDecoder.default_state();
        let groups: Vec<&String> = state.as_object().unwrap().keys().collect();
        assert_eq!(groups, vec!["ori", "acc", "gyr", "mag"]);
        assert_eq!(state["ori"]["yaw"], json!(0));
    }
}
