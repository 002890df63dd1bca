//! # Configuration Modules
//!
//! Engine configuration: timing constants, ad-hoc points and the per-source
//! parser / synchronization table.

/// The serde-backed engine configuration and its validation.
pub mod engine_config;
