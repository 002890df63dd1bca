use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::registry::{DecodeRule, DecoderKind, SyncMode};

/// Default sampler tick.
pub const NOTIFIER_REPEAT_INTERVAL_MS: u64 = 10;
/// Default retained history span.
pub const TELEMETRY_DATA_DEPTH_MS: u64 = 60 * 1000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error occurred: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Unsupported parser type: {0}")]
    UnsupportedParserType(String),

    #[error("Unsupported output format: {0}")]
    UnsupportedOutputFormat(String),

    #[error("Unsupported synch source: {0}")]
    UnsupportedSourceSync(String),

    #[error("{0} must be greater than zero")]
    InvalidInterval(&'static str),
}

/// Parser section of a source entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParserConfig {
    /// Only `"internal"` is supported.
    #[serde(rename = "type")]
    pub parser_type: String,
    /// `"fromId"` or `"vectorCollection"`.
    pub output_format: String,
}

/// One configured telemetry source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceConfig {
    pub parser: ParserConfig,
    /// `"yarpPort"` (push) or `"localTimer"` (clock).
    pub source_sync: String,
}

impl SourceConfig {
    /// Convenience constructor using the typed rule.
    pub fn new(kind: DecoderKind, sync: SyncMode) -> Self {
        Self {
            parser: ParserConfig {
                parser_type: "internal".to_string(),
                output_format: kind.to_string(),
            },
            source_sync: sync.to_string(),
        }
    }

    /// Resolves the wire strings into a typed rule.
    pub fn rule(&self) -> Result<DecodeRule, ConfigError> {
        if self.parser.parser_type != "internal" {
            return Err(ConfigError::UnsupportedParserType(self.parser.parser_type.clone()));
        }
        Ok(DecodeRule::new(
            self.parser.output_format.parse()?,
            self.source_sync.parse()?,
        ))
    }
}

/// Engine configuration.
///
/// ```json
/// {
///   "tickIntervalMs": 10,
///   "windowDurationMs": 60000,
///   "extraPoints": ["ping"],
///   "sources": {
///     "sens.legacyIMU": { "parser": { "type": "internal", "outputFormat": "fromId" }, "sourceSync": "localTimer" }
///   }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    pub tick_interval_ms: u64,
    pub window_duration_ms: u64,
    /// Identifiers that only receive ad-hoc records (no decoder, no routing).
    pub extra_points: Vec<String>,
    pub sources: BTreeMap<String, SourceConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: NOTIFIER_REPEAT_INTERVAL_MS,
            window_duration_ms: TELEMETRY_DATA_DEPTH_MS,
            extra_points: vec!["ping".to_string()],
            sources: BTreeMap::new(),
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Adds (or replaces) a source entry.
    pub fn with_source(mut self, id: impl Into<String>, kind: DecoderKind, sync: SyncMode) -> Self {
        self.sources.insert(id.into(), SourceConfig::new(kind, sync));
        self
    }

    /// Rejects zero timings and any source whose parser / sync strings are
    /// not supported.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::InvalidInterval("tickIntervalMs"));
        }
        if self.window_duration_ms == 0 {
            return Err(ConfigError::InvalidInterval("windowDurationMs"));
        }
        for source in self.sources.values() {
            source.rule()?;
        }
        Ok(())
    }

    /// Maximum records retained per identifier: `ceil(window / tick)`, at least one.
    pub fn history_depth(&self) -> usize {
        let tick = self.tick_interval_ms.max(1);
        (self.window_duration_ms.div_ceil(tick) as usize).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_notifier_constants() {
        let config = EngineConfig::default();
        assert_eq!(config.tick_interval_ms, 10);
        assert_eq!(config.window_duration_ms, 60_000);
        assert_eq!(config.history_depth(), 6000);
        assert_eq!(config.extra_points, vec!["ping".to_string()]);
    }

    #[test]
    fn history_depth_rounds_up() {
        let config = EngineConfig {
            tick_interval_ms: 7,
            window_duration_ms: 100,
            ..Default::default()
        };
        assert_eq!(config.history_depth(), 15);
    }

    #[test]
    fn parses_sources_and_partial_fields() {
        let config = EngineConfig::from_json_str(
            r#"{
                "windowDurationMs": 1000,
                "sources": {
                    "sens.legacyIMU": { "parser": { "type": "internal", "outputFormat": "fromId" }, "sourceSync": "localTimer" },
                    "sens.wbdCollection": { "parser": { "type": "internal", "outputFormat": "vectorCollection" }, "sourceSync": "yarpPort" }
                }
            }"#,
        )
        .unwrap();

        assert_eq!(config.tick_interval_ms, 10);
        assert_eq!(config.history_depth(), 100);
        assert_eq!(
            config.sources["sens.legacyIMU"].rule().unwrap(),
            DecodeRule::new(DecoderKind::FromId, SyncMode::SampledOnClock)
        );
        assert_eq!(
            config.sources["sens.wbdCollection"].rule().unwrap(),
            DecodeRule::new(DecoderKind::KeyedCollection, SyncMode::PushImmediate)
        );
    }

    #[test]
    fn rejects_unsupported_entries() {
        let bad_type = r#"{"sources": {"a": {"parser": {"type": "external", "outputFormat": "fromId"}, "sourceSync": "yarpPort"}}}"#;
        assert!(matches!(
            EngineConfig::from_json_str(bad_type),
            Err(ConfigError::UnsupportedParserType(_))
        ));

        let bad_sync = r#"{"sources": {"a": {"parser": {"type": "internal", "outputFormat": "fromId"}, "sourceSync": "ntp"}}}"#;
        assert!(matches!(
            EngineConfig::from_json_str(bad_sync),
            Err(ConfigError::UnsupportedSourceSync(_))
        ));

        assert!(matches!(
            EngineConfig::from_json_str(r#"{"tickIntervalMs": 0}"#),
            Err(ConfigError::InvalidInterval("tickIntervalMs"))
        ));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"tickIntervalMs": 20, "extraPoints": []}}"#).unwrap();

        let config = EngineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.tick_interval_ms, 20);
        assert_eq!(config.history_depth(), 3000);
        assert!(config.extra_points.is_empty());
    }

    #[test]
    fn missing_file_is_io_error() {
        assert!(matches!(
            EngineConfig::from_file("/definitely/not/here.json"),
            Err(ConfigError::IoError(_))
        ));
    }
}
