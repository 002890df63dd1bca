//! # Decoders
//!
//! Each decoder turns one raw sample (a positional array, a nested array
//! structure or a keyed collection, carried as a `serde_json::Value`) into an
//! in-place mutation of its identifier's canonical state.
//!
//! Dispatch is by identifier through a [`DecoderCatalog`], not by inspecting
//! the sample. The engine hands every decoder a *working copy* of the state
//! and commits it only when decoding succeeds, so a short or malformed sample
//! leaves the previous state untouched and never reaches other identifiers.
//!
//! ## Families
//! - **`imu`**: legacy flat IMU and the multi-channel MAS IMUs.
//! - **`joint_state`**: offset table across the fixed joint names of a limb.
//! - **`force_torque`**: end-effector wrenches and MAS force/torque sensors.
//! - **`battery`**: fixed field order battery status.
//! - **`camera`**: opaque frame payloads (records are not flattened).
//! - **`yarp_log`**: port-name regex plus bottle key/value log payload.
//! - **`scalar`**: single numeric value.
//! - **`collection`**: the generic `[name, value]` keyed collection.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use thiserror::Error;

pub mod battery;
pub mod camera;
pub mod collection;
pub mod force_torque;
pub mod imu;
pub mod joint_state;
pub mod scalar;
pub mod yarp_log;

pub use battery::BatteryDecoder;
pub use camera::OpaqueFrameDecoder;
pub use collection::KeyedCollectionDecoder;
pub use force_torque::{MasForceTorqueDecoder, PairedMasForceTorqueDecoder, WrenchDecoder};
pub use imu::{ImuDecoder, LegacyImuDecoder};
pub use joint_state::JointStateDecoder;
pub use scalar::ScalarDecoder;
pub use yarp_log::YarpLogDecoder;

/// Why a raw sample could not be decoded.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("sample is missing element {path}")]
    MissingIndex { path: String },

    #[error("expected {expected} at {path}")]
    UnexpectedType { path: String, expected: &'static str },

    #[error("log source '{input}' does not match the expected port pattern")]
    PatternMismatch { input: String },

    #[error("malformed collection entry #{index}: {reason}")]
    MalformedEntry { index: usize, reason: &'static str },
}

/// Decoding strategy for one identifier (or one identifier family).
pub trait Decoder: Send + Sync {
    /// Applies `sample` to `state`. On error the caller discards `state`.
    fn decode(&self, state: &mut Value, sample: &Value) -> Result<(), DecodeError>;

    /// Canonical state the identifier starts with.
    fn default_state(&self) -> Value;

    /// Opaque identifiers carry their value unflattened.
    fn is_opaque(&self) -> bool {
        false
    }

    /// Decoders that overwrite the state without reading it start from `null`
    /// instead of a copy of the previous state.
    fn replaces_state(&self) -> bool {
        false
    }
}

/// Replaces the state wholesale with the raw sample. Used for identifiers
/// that have no catalog entry.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplaceDecoder;

impl Decoder for ReplaceDecoder {
    fn decode(&self, state: &mut Value, sample: &Value) -> Result<(), DecodeError> {
        *state = sample.clone();
        Ok(())
    }

    fn default_state(&self) -> Value {
        Value::Null
    }

    fn replaces_state(&self) -> bool {
        true
    }
}

/// Identifier → decoder table.
#[derive(Clone, Default)]
pub struct DecoderCatalog {
    decoders: HashMap<String, Arc<dyn Decoder>>,
}

impl DecoderCatalog {
    /// An empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// The robot sensor set: IMUs, joint states, wrenches, F/T sensors,
    /// battery, cameras and log channels.
    pub fn robot() -> Self {
        let mut catalog = Self::new();

        catalog.register("sens.legacyIMU", LegacyImuDecoder);
        for id in imu::MAS_IMU_IDS {
            catalog.register(id, ImuDecoder);
        }

        for id in ["sens.leftLegJointState", "sens.rightLegJointState"] {
            catalog.register(id, JointStateDecoder::new(joint_state::LEG_JOINTS));
        }
        for id in ["sens.leftArmJointState", "sens.rightArmJointState"] {
            catalog.register(id, JointStateDecoder::new(joint_state::ARM_JOINTS));
        }
        catalog.register("sens.torsoJointState", JointStateDecoder::new(joint_state::TORSO_JOINTS));
        catalog.register("sens.headJointState", JointStateDecoder::new(joint_state::HEAD_JOINTS));

        for id in force_torque::WRENCH_IDS {
            catalog.register(id, WrenchDecoder);
        }
        for id in force_torque::MAS_FT_IDS {
            catalog.register(id, MasForceTorqueDecoder::new(0));
        }
        for id in ["sens.leftFootHeelTiptoeFTs", "sens.rightFootHeelTiptoeFTs"] {
            catalog.register(id, PairedMasForceTorqueDecoder::heel_and_toetip());
        }

        catalog.register("sens.batteryStatus", BatteryDecoder);

        for id in ["sens.camLeftEye", "sens.camRightEye"] {
            catalog.register(id, OpaqueFrameDecoder);
        }

        for id in ["yarplogger.yarpRobotInterface", "yarplogger.walkingModule"] {
            catalog.register(id, YarpLogDecoder);
        }

        catalog
    }

    /// Adds or replaces the decoder of `id`.
    pub fn register<D: Decoder + 'static>(&mut self, id: impl Into<String>, decoder: D) {
        self.decoders.insert(id.into(), Arc::new(decoder));
    }

    pub fn get(&self, id: &str) -> Option<&dyn Decoder> {
        self.decoders.get(id).map(|d| d.as_ref())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.decoders.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &dyn Decoder)> {
        self.decoders.iter().map(|(id, d)| (id, d.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }
}

// --- shared extraction helpers ---

fn format_path(path: &[usize]) -> String {
    path.iter().map(|i| format!("[{i}]")).collect()
}

/// Element at a nested array index path.
pub(crate) fn value_at<'a>(sample: &'a Value, path: &[usize]) -> Result<&'a Value, DecodeError> {
    let mut current = sample;
    for (depth, &index) in path.iter().enumerate() {
        let items = current.as_array().ok_or_else(|| DecodeError::UnexpectedType {
            path: format_path(&path[..depth]),
            expected: "array",
        })?;
        current = items.get(index).ok_or_else(|| DecodeError::MissingIndex {
            path: format_path(&path[..=depth]),
        })?;
    }
    Ok(current)
}

/// Numeric element at a nested array index path.
pub(crate) fn number_at(sample: &Value, path: &[usize]) -> Result<Value, DecodeError> {
    let value = value_at(sample, path)?;
    if value.is_number() {
        Ok(value.clone())
    } else {
        Err(DecodeError::UnexpectedType {
            path: format_path(path),
            expected: "number",
        })
    }
}

/// Mutable slot at a key path, creating intermediate objects as needed.
pub(crate) fn slot<'a>(state: &'a mut Value, keys: &[&str]) -> &'a mut Value {
    let mut current = state;
    for key in keys {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        current = match current {
            Value::Object(map) => map.entry(*key).or_insert(Value::Null),
            _ => unreachable!("current was just made an object"),
        };
    }
    current
}

/// An object with every field set to zero, in the given order.
pub(crate) fn zeroed(fields: &[&str]) -> Value {
    Value::Object(
        fields
            .iter()
            .map(|f| (f.to_string(), Value::from(0)))
            .collect(),
    )
}

/// An object of named groups, each produced by `group`.
pub(crate) fn grouped(groups: &[&str], group: impl Fn(&str) -> Value) -> Value {
    Value::Object(
        groups
            .iter()
            .map(|g| (g.to_string(), group(g)))
            .collect(),
    )
}
