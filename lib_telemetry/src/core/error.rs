use thiserror::Error;

use crate::configs::engine_config::ConfigError;

/// Errors returned by the engine API.
///
/// Decode failures never appear here: they are contained and logged
/// inside `deliver` and never reach the caller.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The identifier is not part of this engine (NotFound). Distinct from an
    /// identifier that exists but has no buffered data yet.
    #[error("Unknown telemetry identifier: {0}")]
    UnknownIdentifier(String),

    /// The notifier was started outside of a tokio runtime.
    #[error("The notifier requires a running tokio runtime")]
    NoRuntime,

    /// The engine configuration was rejected.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}
