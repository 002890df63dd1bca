//! # lib_telemetry
//!
//! A real-time telemetry aggregation engine. Raw samples arriving from many
//! independent sources are decoded per identifier into a canonical state,
//! turned into flat time-stamped records, retained in a bounded per-identifier
//! history and fanned out synchronously to live subscribers.
//!
//! The crate is split into three folders:
//!
//! - **`core`**: the engine itself (identifier registry, state store, history
//!   ring buffers, notification bus, source lifecycle and the fixed-clock
//!   sampler).
//! - **`decoders`**: one strategy per sensor family, plus the generic
//!   keyed-collection and wholesale-replace fallbacks.
//! - **`configs`**: the serde-backed engine configuration.
//!
//! ```rust
//! use lib_telemetry::{EngineConfig, TelemetryEngine};
//! use lib_telemetry::decoders::ScalarDecoder;
//! use serde_json::json;
//!
//! let config = EngineConfig::from_json_str(r#"{
//!     "sources": {
//!         "temp.sensor": { "parser": { "type": "internal", "outputFormat": "fromId" }, "sourceSync": "yarpPort" }
//!     }
//! }"#).unwrap();
//!
//! let engine = TelemetryEngine::builder()
//!     .config(config)
//!     .decoder("temp.sensor", ScalarDecoder)
//!     .build()
//!     .unwrap();
//!
//! let _source = engine.enable("temp.sensor");
//! engine.deliver_at("temp.sensor", &json!([42.5]), 1_000);
//!
//! let latest = engine.latest(&["temp.sensor"]).unwrap();
//! assert_eq!(latest[0].get("value"), Some(&json!(42.5)));
//! ```

#![forbid(unsafe_code)]

pub mod configs;
pub mod core;
pub mod decoders;

// --- Public API Re-exports ---
pub use configs::engine_config::{ConfigError, EngineConfig, ParserConfig, SourceConfig};
pub use crate::core::dispatcher::{NotificationBus, Unsubscriber};
pub use crate::core::engine::{EngineBuilder, TelemetryEngine};
pub use crate::core::error::EngineError;
pub use crate::core::lifecycle::{NetworkConnector, NoopConnector, SourceHandle};
pub use crate::core::record::TelemetryRecord;
pub use crate::core::registry::{DecodeRule, DecoderKind, IdentifierRegistry, SyncMode};
pub use decoders::{DecodeError, Decoder, DecoderCatalog};
