//! Joint-state decoder for a limb.
//!
//! The extended state port sends one vector per quantity; the quantity's
//! vector sits at a fixed offset and holds one entry per joint, in the limb's
//! joint order.

use serde_json::Value;

use super::{grouped, number_at, slot, zeroed, DecodeError, Decoder};

/// `(field group, sample offset)` pairs.
pub const JOINT_STATE_OFFSETS: [(&str, usize); 9] = [
    ("jointPos", 0),
    ("jointVel", 2),
    ("jointAcc", 4),
    ("jointTrq", 12),
    ("motorPos", 6),
    ("motorVel", 8),
    ("motorAcc", 10),
    ("motorPwm", 14),
    ("motorCur", 16),
];

const GROUP_ORDER: [&str; 9] = [
    "jointPos", "jointVel", "jointAcc", "jointTrq", "motorPos", "motorVel", "motorAcc", "motorCur",
    "motorPwm",
];

pub const LEG_JOINTS: &[&str] = &["hip_pitch", "hip_roll", "hip_yaw", "knee", "ankle_pitch", "ankle_roll"];
pub const ARM_JOINTS: &[&str] = &[
    "shoulder_pitch",
    "shoulder_roll",
    "shoulder_yaw",
    "elbow",
    "wrist_prosup",
    "wrist_pitch",
    "wrist_yaw",
];
pub const TORSO_JOINTS: &[&str] = &["torso_pitch", "torso_roll", "torso_yaw"];
pub const HEAD_JOINTS: &[&str] = &["head_pitch", "head_roll", "head_yaw"];

/// Applies [`JOINT_STATE_OFFSETS`] across a fixed set of joint names.
#[derive(Debug, Clone, Copy)]
pub struct JointStateDecoder {
    joints: &'static [&'static str],
}

impl JointStateDecoder {
    pub fn new(joints: &'static [&'static str]) -> Self {
        Self { joints }
    }
}

impl Decoder for JointStateDecoder {
    fn decode(&self, state: &mut Value, sample: &Value) -> Result<(), DecodeError> {
        for (group, offset) in JOINT_STATE_OFFSETS {
            for (j, &joint) in self.joints.iter().enumerate() {
                *slot(state, &[group, joint]) = number_at(sample, &[offset, j])?;
            }
        }
        Ok(())
    }

    fn default_state(&self) -> Value {
        grouped(&GROUP_ORDER, |_| zeroed(self.joints))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample(joints: usize) -> Value {
        // Quantity vector k holds k*100 + joint index.
        Value::Array(
            (0..18)
                .map(|k| Value::Array((0..joints).map(|j| json!(k * 100 + j)).collect()))
                .collect(),
        )
    }

    #[test]
    fn head_offsets_follow_table() {
        let decoder = JointStateDecoder::new(HEAD_JOINTS);
        let mut state = decoder.default_state();
        decoder.decode(&mut state, &sample(3)).unwrap();

        assert_eq!(state["jointPos"]["head_pitch"], json!(0));
        assert_eq!(state["jointVel"]["head_roll"], json!(201));
        assert_eq!(state["jointTrq"]["head_yaw"], json!(1202));
        assert_eq!(state["motorPwm"]["head_pitch"], json!(1400));
        assert_eq!(state["motorCur"]["head_yaw"], json!(1602));
    }

    #[test]
    fn arm_uses_seven_joints() {
        let decoder = JointStateDecoder::new(ARM_JOINTS);
        let mut state = decoder.default_state();
        decoder.decode(&mut state, &sample(7)).unwrap();
        assert_eq!(state["motorAcc"]["wrist_yaw"], json!(1006));
    }

    #[test]
    fn missing_joint_entry_fails() {
        let decoder = JointStateDecoder::new(LEG_JOINTS);
        let mut state = decoder.default_state();
        let err = decoder.decode(&mut state, &sample(4)).unwrap_err();
        assert_eq!(err, DecodeError::MissingIndex { path: "[0][4]".to_string() });
    }

    #[test]
    fn default_groups_keep_declared_order() {
        let state = JointStateDecoder::new(TORSO_JOINTS).default_state();
        let groups: Vec<&str> = state.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(groups, GROUP_ORDER.to_vec());
        let joints: Vec<&str> = state["motorCur"].as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(joints, TORSO_JOINTS.to_vec());
    }
}
