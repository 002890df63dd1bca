//! Force/torque decoders: flat end-effector wrenches and MAS six-axis
//! sensors.

use serde_json::{Map, Value};

use super::{number_at, slot, zeroed, DecodeError, Decoder};

const AXES: [&str; 3] = ["x", "y", "z"];

/// MAS channel carrying the six-axis measurements.
const MAS_FT_CHANNEL: usize = 5;
/// MAS channel carrying the sensor temperature.
const MAS_TEMPERATURE_CHANNEL: usize = 4;

pub const WRENCH_IDS: [&str; 10] = [
    "sens.leftArmEEwrench",
    "sens.rightArmEEwrench",
    "sens.leftUpperLegEEwrench",
    "sens.rightUpperLegEEwrench",
    "sens.leftLowerLegEEwrench",
    "sens.rightLowerLegEEwrench",
    "sens.leftFootFrontEEwrench",
    "sens.rightFootFrontEEwrench",
    "sens.leftFootRearEEwrench",
    "sens.rightFootRearEEwrench",
];

pub const MAS_FT_IDS: [&str; 4] = [
    "sens.leftArmFT",
    "sens.rightArmFT",
    "sens.leftLegHipFT",
    "sens.rightLegHipFT",
];

fn wrench_state() -> Value {
    let mut state = Map::new();
    state.insert("force".to_string(), zeroed(&AXES));
    state.insert("torque".to_string(), zeroed(&AXES));
    Value::Object(state)
}

fn mas_state() -> Value {
    let mut state = wrench_state();
    *slot(&mut state, &["temperature"]) = Value::from(0);
    state
}

/// Writes six consecutive values into `force` then `torque`.
fn write_wrench(
    state: &mut Value,
    prefix: &[&str],
    sample: &Value,
    base: &[usize],
) -> Result<(), DecodeError> {
    let mut path = base.to_vec();
    path.push(0);
    let last = path.len() - 1;
    for (g, group) in ["force", "torque"].into_iter().enumerate() {
        for (a, axis) in AXES.into_iter().enumerate() {
            path[last] = g * 3 + a;
            let keys: Vec<&str> = prefix.iter().copied().chain([group, axis]).collect();
            *slot(state, &keys) = number_at(sample, &path)?;
        }
    }
    Ok(())
}

/// Six flat floats: `force{x,y,z}` then `torque{x,y,z}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WrenchDecoder;

impl Decoder for WrenchDecoder {
    fn decode(&self, state: &mut Value, sample: &Value) -> Result<(), DecodeError> {
        write_wrench(state, &[], sample, &[])
    }

    fn default_state(&self) -> Value {
        wrench_state()
    }
}

fn decode_mas(
    state: &mut Value,
    prefix: &[&str],
    sample: &Value,
    index: usize,
) -> Result<(), DecodeError> {
    write_wrench(state, prefix, sample, &[MAS_FT_CHANNEL, index, 0])?;
    let keys: Vec<&str> = prefix.iter().copied().chain(["temperature"]).collect();
    *slot(state, &keys) = number_at(sample, &[MAS_TEMPERATURE_CHANNEL, index, 0, 0])?;
    Ok(())
}

/// One MAS six-axis sensor plus its temperature.
#[derive(Debug, Clone, Copy, Default)]
pub struct MasForceTorqueDecoder {
    index: usize,
}

impl MasForceTorqueDecoder {
    /// `index` selects the sensor within the MAS channels.
    pub fn new(index: usize) -> Self {
        Self { index }
    }
}

impl Decoder for MasForceTorqueDecoder {
    fn decode(&self, state: &mut Value, sample: &Value) -> Result<(), DecodeError> {
        decode_mas(state, &[], sample, self.index)
    }

    fn default_state(&self) -> Value {
        mas_state()
    }
}

/// Several MAS sensors on one port, each written into its own group.
#[derive(Debug, Clone)]
pub struct PairedMasForceTorqueDecoder {
    groups: Vec<(&'static str, usize)>,
}

impl PairedMasForceTorqueDecoder {
    pub fn new(groups: Vec<(&'static str, usize)>) -> Self {
        Self { groups }
    }

    /// Foot sole layout: heel on index 0, toe tip on index 1.
    pub fn heel_and_toetip() -> Self {
        Self::new(vec![("heel", 0), ("toetip", 1)])
    }
}

impl Decoder for PairedMasForceTorqueDecoder {
    fn decode(&self, state: &mut Value, sample: &Value) -> Result<(), DecodeError> {
        for (group, index) in &self.groups {
            decode_mas(state, &[*group], sample, *index)?;
        }
        Ok(())
    }

    fn default_state(&self) -> Value {
        Value::Object(
            self.groups
                .iter()
                .map(|(group, _)| (group.to_string(), mas_state()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// A MAS sample with `sensors` F/T sensors; sensor `s` reads `s*10 + axis`
    /// and has temperature `30 + s`.
    fn mas_sample(sensors: usize) -> Value {
        let ft: Vec<Value> = (0..sensors)
            .map(|s| {
                let axes: Vec<usize> = (0..6).map(|a| s * 10 + a).collect();
                json!([axes])
            })
            .collect();
        let temp: Vec<Value> = (0..sensors).map(|s| json!([[30 + s]])).collect();
        json!([[], [], [], [], temp, ft])
    }

    #[test]
    fn wrench_maps_six_floats() {
        let mut state = WrenchDecoder.default_state();
        WrenchDecoder
            .decode(&mut state, &json!([1.0, 2.0, 3.0, 4.0, 5.0, 6.0]))
            .unwrap();
        assert_eq!(
            state,
            json!({"force": {"x": 1.0, "y": 2.0, "z": 3.0}, "torque": {"x": 4.0, "y": 5.0, "z": 6.0}})
        );
    }

    #[test]
    fn mas_sensor_reads_ft_and_temperature_channels() {
        let decoder = MasForceTorqueDecoder::new(0);
        let mut state = decoder.default_state();
        decoder.decode(&mut state, &mas_sample(1)).unwrap();
        assert_eq!(
            state,
            json!({
                "force": {"x": 0, "y": 1, "z": 2},
                "torque": {"x": 3, "y": 4, "z": 5},
                "temperature": 30
            })
        );
    }

    #[test]
    fn paired_sensors_fill_heel_and_toetip() {
        let decoder = PairedMasForceTorqueDecoder::heel_and_toetip();
        let mut state = decoder.default_state();
        decoder.decode(&mut state, &mas_sample(2)).unwrap();
        assert_eq!(state["heel"]["torque"]["z"], json!(5));
        assert_eq!(state["toetip"]["force"]["x"], json!(10));
        assert_eq!(state["toetip"]["temperature"], json!(31));
    }

    #[test]
    fn missing_second_sensor_is_an_error() {
        let decoder = PairedMasForceTorqueDecoder::heel_and_toetip();
        let mut state = decoder.default_state();
        let err = decoder.decode(&mut state, &mas_sample(1)).unwrap_err();
        assert_eq!(err, DecodeError::MissingIndex { path: "[5][1]".to_string() });
    }
}
