//! # Identifier Registry
//!
//! Static mapping from a logical point identifier to its decode rule and its
//! synchronization mode. Rules are created once from configuration; the only
//! runtime addition is the fallback rule registered when routing is enabled
//! for an identifier that was never configured. Existing rules never change.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::configs::engine_config::{ConfigError, EngineConfig};

/// How a raw sample is turned into canonical state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecoderKind {
    /// Identifier-specific, fixed-shape extraction looked up in the decoder catalog.
    FromId,
    /// Generic `[name, value]` pair copy into the state map.
    KeyedCollection,
}

impl FromStr for DecoderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fromId" => Ok(DecoderKind::FromId),
            "vectorCollection" => Ok(DecoderKind::KeyedCollection),
            other => Err(ConfigError::UnsupportedOutputFormat(other.to_string())),
        }
    }
}

impl fmt::Display for DecoderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecoderKind::FromId => write!(f, "fromId"),
            DecoderKind::KeyedCollection => write!(f, "vectorCollection"),
        }
    }
}

/// When a decoded value becomes a telemetry record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncMode {
    /// Every successful decode immediately generates a record stamped with the
    /// arrival time.
    PushImmediate,
    /// The identifier is marked pending and emitted once on the next sampler
    /// tick with the tick's timestamp.
    SampledOnClock,
}

impl FromStr for SyncMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "yarpPort" => Ok(SyncMode::PushImmediate),
            "localTimer" => Ok(SyncMode::SampledOnClock),
            other => Err(ConfigError::UnsupportedSourceSync(other.to_string())),
        }
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncMode::PushImmediate => write!(f, "yarpPort"),
            SyncMode::SampledOnClock => write!(f, "localTimer"),
        }
    }
}

/// Decode rule for one identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeRule {
    /// Dispatch style.
    pub kind: DecoderKind,
    /// Record generation timing.
    pub sync: SyncMode,
}

impl DecodeRule {
    /// Creates a rule.
    pub fn new(kind: DecoderKind, sync: SyncMode) -> Self {
        Self { kind, sync }
    }

    /// Rule applied to identifiers routed without configuration: catalog
    /// lookup (wholesale replace when absent), pushed immediately.
    pub fn fallback() -> Self {
        Self::new(DecoderKind::FromId, SyncMode::PushImmediate)
    }
}

/// The identifier → rule table.
#[derive(Debug, Clone, Default)]
pub struct IdentifierRegistry {
    rules: HashMap<String, DecodeRule>,
}

impl IdentifierRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the registry from every configured source, rejecting unsupported
    /// parser types, output formats and sync modes.
    pub fn from_config(config: &EngineConfig) -> Result<Self, ConfigError> {
        let mut registry = Self::new();
        for (id, source) in &config.sources {
            registry.rules.insert(id.clone(), source.rule()?);
        }
        Ok(registry)
    }

    /// Adds a rule for an identifier that has none. Returns `false` and keeps
    /// the existing rule otherwise.
    pub fn register(&mut self, id: &str, rule: DecodeRule) -> bool {
        if self.rules.contains_key(id) {
            return false;
        }
        self.rules.insert(id.to_string(), rule);
        true
    }

    /// The rule for `id`, if configured.
    pub fn rule(&self, id: &str) -> Option<DecodeRule> {
        self.rules.get(id).copied()
    }

    /// Whether `id` has a rule.
    pub fn contains(&self, id: &str) -> bool {
        self.rules.contains_key(id)
    }

    /// Iterates over all `(identifier, rule)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &DecodeRule)> {
        self.rules.iter()
    }

    /// Number of configured identifiers.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether no identifier is configured.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wire_names() {
        assert_eq!("fromId".parse::<DecoderKind>().unwrap(), DecoderKind::FromId);
        assert_eq!(
            "vectorCollection".parse::<DecoderKind>().unwrap(),
            DecoderKind::KeyedCollection
        );
        assert_eq!("yarpPort".parse::<SyncMode>().unwrap(), SyncMode::PushImmediate);
        assert_eq!("localTimer".parse::<SyncMode>().unwrap(), SyncMode::SampledOnClock);
    }

    #[test]
    fn rejects_unknown_wire_names() {
        assert!(matches!(
            "matrix".parse::<DecoderKind>(),
            Err(ConfigError::UnsupportedOutputFormat(s)) if s == "matrix"
        ));
        assert!(matches!(
            "gpsClock".parse::<SyncMode>(),
            Err(ConfigError::UnsupportedSourceSync(s)) if s == "gpsClock"
        ));
    }

    #[test]
    fn register_never_overwrites() {
        let mut registry = IdentifierRegistry::new();
        let clock = DecodeRule::new(DecoderKind::KeyedCollection, SyncMode::SampledOnClock);
        assert!(registry.register("sens.a", clock));
        assert!(!registry.register("sens.a", DecodeRule::fallback()));
        assert_eq!(registry.rule("sens.a"), Some(clock));
        assert_eq!(registry.rule("sens.b"), None);
    }
}
