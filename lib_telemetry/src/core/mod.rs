//! # Core Engine Module
//!
//! This module forms the heart of the telemetry aggregation engine. It
//! aggregates the components that move a decoded sample from the state store
//! to history and to live subscribers.
//!
//! ## Core Components:
//!
//! - **`registry`**: the static identifier → decode rule / sync mode map,
//!   built from configuration.
//! - **`state_store`**: the current canonical value of every known identifier.
//! - **`record`**: telemetry record generation and dot-path flattening.
//! - **`history`**: bounded, oldest-evicted ring buffers per identifier plus the
//!   `latest` / `range` read paths.
//! - **`dispatcher`**: the ordered, synchronous notification bus.
//! - **`lifecycle`**: per-identifier routing and the injected network connector.
//! - **`sampler`**: the fixed-clock notifier task (feature `sampler`).
//! - **`engine`**: the owned engine handle that ties all of the above together.

/// Errors surfaced by the engine API.
pub mod error;
/// Identifier → decode rule and sync mode.
pub mod registry;
/// Current canonical state per identifier.
pub mod state_store;
/// Telemetry records and flattening.
pub mod record;
/// Per-identifier history ring buffers.
pub mod history;
/// Synchronous, ordered fan-out to subscribers.
pub mod dispatcher;
/// Source routing and connect/disconnect callbacks.
pub mod lifecycle;
/// The periodic notifier for clock-synchronized identifiers.
#[cfg(feature = "sampler")]
pub mod sampler;
/// The aggregation engine.
pub mod engine;

// --- Public API Re-exports ---
pub use dispatcher::{NotificationBus, Unsubscriber};
pub use engine::{EngineBuilder, TelemetryEngine};
pub use error::EngineError;
pub use history::{History, HistoryBuffer};
pub use record::TelemetryRecord;
pub use registry::{DecodeRule, DecoderKind, IdentifierRegistry, SyncMode};
pub use state_store::StateStore;

/// Current wall-clock time in Unix milliseconds.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
