//! Log-channel decoder.
//!
//! A log sample is `[port, bottle]`:
//! - `port` is the emitting port, `<prefix>/log/<hostname>/<module>/<pid>`;
//! - `bottle` is a sequence of `(key value)` pairs such as
//!   `(level INFO) (filename "main.cpp") (line 42) (message "walking \"on\"")`.
//!
//! Hostname and pid are written first, then every bottle pair, so a pair
//! overrides a default field and unknown keys are appended.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

use super::{value_at, DecodeError, Decoder};

static PORT_PATTERN: OnceLock<Regex> = OnceLock::new();
static PAIR_PATTERN: OnceLock<Regex> = OnceLock::new();

fn port_pattern() -> &'static Regex {
    PORT_PATTERN.get_or_init(|| {
        Regex::new(r"[^/]*/log/(.+)/(.+)/([0-9]+)").expect("log port pattern is valid")
    })
}

fn pair_pattern() -> &'static Regex {
    PAIR_PATTERN.get_or_init(|| {
        Regex::new(r#"\(\s*([^\s()"]+)\s+("(?:[^"\\]|\\.)*"|[^()]*?)\s*\)"#)
            .expect("bottle pair pattern is valid")
    })
}

const NUMERIC_FIELDS: [&str; 6] = ["line", "pid", "thread_id", "systemtime", "networktime", "externaltime"];
/// Default fields of a log state, in emission order.
const FIELD_ORDER: [&str; 16] = [
    "message",
    "level",
    "filename",
    "line",
    "function",
    "hostname",
    "pid",
    "cmd",
    "args",
    "thread_id",
    "component",
    "id",
    "systemtime",
    "networktime",
    "externaltime",
    "backtrace",
];

/// Parses a bottle string of `(key value)` pairs. Quoted values are
/// unescaped, numeric values become numbers, anything else stays a string.
pub fn parse_bottle(bottle: &str) -> Map<String, Value> {
    pair_pattern()
        .captures_iter(bottle)
        .map(|caps| (caps[1].to_string(), bottle_value(&caps[2])))
        .collect()
}

fn bottle_value(raw: &str) -> Value {
    if raw.starts_with('"') {
        return serde_json::from_str::<String>(raw)
            .map(Value::String)
            .unwrap_or_else(|_| Value::String(raw.trim_matches('"').to_string()));
    }
    if let Ok(n) = raw.parse::<i64>() {
        return Value::from(n);
    }
    match raw.parse::<f64>() {
        Ok(f) if f.is_finite() => Value::from(f),
        _ => Value::String(raw.to_string()),
    }
}

fn string_at<'a>(sample: &'a Value, index: usize) -> Result<&'a str, DecodeError> {
    value_at(sample, &[index])?
        .as_str()
        .ok_or_else(|| DecodeError::UnexpectedType {
            path: format!("[{index}]"),
            expected: "string",
        })
}

/// Decoder for `yarplogger.*` channels.
#[derive(Debug, Clone, Copy, Default)]
pub struct YarpLogDecoder;

impl Decoder for YarpLogDecoder {
    fn decode(&self, state: &mut Value, sample: &Value) -> Result<(), DecodeError> {
        let port = string_at(sample, 0)?;
        let bottle = string_at(sample, 1)?;

        let caps = port_pattern()
            .captures(port)
            .ok_or_else(|| DecodeError::PatternMismatch { input: port.to_string() })?;
        let pid: u64 = caps[3]
            .parse()
            .map_err(|_| DecodeError::PatternMismatch { input: port.to_string() })?;

        if !state.is_object() {
            *state = self.default_state();
        }
        if let Value::Object(map) = state {
            map.insert("pid".to_string(), Value::from(pid));
            map.insert("hostname".to_string(), Value::String(caps[1].to_string()));
            map.extend(parse_bottle(bottle));
        }
        Ok(())
    }

    fn default_state(&self) -> Value {
        Value::Object(
            FIELD_ORDER
                .iter()
                .map(|field| {
                    let initial = if NUMERIC_FIELDS.contains(field) {
                        Value::from(0)
                    } else {
                        Value::String(String::new())
                    };
                    (field.to_string(), initial)
                })
                .collect(),
        )
    }
}
