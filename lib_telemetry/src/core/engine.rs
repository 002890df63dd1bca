//! # Telemetry Engine
//!
//! The owned engine handle. It ties the identifier registry, state store,
//! history, notification bus and source routing together and exposes the
//! ingestion, generation and query API.
//!
//! ## Locking
//!
//! Two mutexes guard the engine:
//!
//! - the **state lock** protects the registry, state store, history, routing
//!   table, pending set and last generated timestamp;
//! - the **emission lock** serializes whole event handlers (decode and
//!   push, a sampler tick, `generate_telemetry`).
//!
//! Records are appended to history under the state lock, which is then
//! released before subscribers are notified. Subscribers therefore run with
//! only the emission lock held: they may query (`latest`, `range`, `state`)
//! and may `listen` or unsubscribe, but must not generate records or stop the
//! notifier from inside a callback.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
#[cfg(feature = "sampler")]
use std::sync::Weak;
#[cfg(feature = "sampler")]
use std::time::Duration;

use serde_json::{Map, Value};

use crate::configs::engine_config::EngineConfig;
use crate::core::dispatcher::{NotificationBus, Unsubscriber};
use crate::core::error::EngineError;
use crate::core::history::History;
use crate::core::lifecycle::{NetworkConnector, NoopConnector, Routing, SourceHandle};
use crate::core::now_ms;
use crate::core::record::TelemetryRecord;
use crate::core::registry::{DecodeRule, DecoderKind, IdentifierRegistry, SyncMode};
#[cfg(feature = "sampler")]
use crate::core::sampler::Sampler;
use crate::core::state_store::StateStore;
use crate::decoders::{Decoder, DecoderCatalog, KeyedCollectionDecoder, ReplaceDecoder};

static KEYED_COLLECTION: KeyedCollectionDecoder = KeyedCollectionDecoder;
static REPLACE: ReplaceDecoder = ReplaceDecoder;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Everything guarded by the state lock.
struct EngineState {
    registry: IdentifierRegistry,
    store: StateStore,
    history: History,
    routing: Routing,
    /// Clock-synchronized identifiers decoded since the last tick, in
    /// first-decode order.
    pending: Vec<String>,
    opaque: HashSet<String>,
    last_timestamp: Option<i64>,
}

impl EngineState {
    /// Builds the record for `id`, appends it to history and returns it.
    fn generate(&mut self, timestamp: i64, value: &Value, id: &str) -> Result<TelemetryRecord, EngineError> {
        if !self.history.contains(id) {
            return Err(EngineError::UnknownIdentifier(id.to_string()));
        }

        // Never go back in time.
        let timestamp = match self.last_timestamp {
            Some(last) if timestamp < last => last,
            _ => timestamp,
        };
        self.last_timestamp = Some(timestamp);

        let record = if self.opaque.contains(id) {
            TelemetryRecord::opaque(timestamp, value.clone(), id)
        } else {
            TelemetryRecord::flattened(timestamp, value, id)
        };
        self.history.push(id, record.clone())?;
        log::trace!("Generated record for {} at {}", id, timestamp);
        Ok(record)
    }
}

struct EngineInner {
    state: Mutex<EngineState>,
    emission: Mutex<()>,
    bus: NotificationBus,
    catalog: DecoderCatalog,
    connector: Arc<dyn NetworkConnector>,
    #[cfg(feature = "sampler")]
    sampler: Mutex<Sampler>,
}

/// Configures and builds a [`TelemetryEngine`].
pub struct EngineBuilder {
    config: EngineConfig,
    catalog: DecoderCatalog,
    connector: Arc<dyn NetworkConnector>,
}

impl EngineBuilder {
    fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            catalog: DecoderCatalog::robot(),
            connector: Arc::new(NoopConnector),
        }
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Replaces the whole decoder catalog (the robot sensor set by default).
    pub fn catalog(mut self, catalog: DecoderCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Adds or replaces the decoder of one identifier.
    pub fn decoder<D: Decoder + 'static>(mut self, id: impl Into<String>, decoder: D) -> Self {
        self.catalog.register(id, decoder);
        self
    }

    /// Installs the transport connector. Without one, connect and disconnect
    /// are no-ops.
    pub fn connector<C: NetworkConnector + 'static>(mut self, connector: C) -> Self {
        self.connector = Arc::new(connector);
        self
    }

    pub fn build(self) -> Result<TelemetryEngine, EngineError> {
        let Self {
            config,
            catalog,
            connector,
        } = self;

        config.validate()?;
        let registry = IdentifierRegistry::from_config(&config)?;

        let mut store = StateStore::new();
        let mut history = History::new(config.history_depth());
        let mut opaque = HashSet::new();

        for (id, decoder) in catalog.iter() {
            store.ensure(id, decoder.default_state());
            history.ensure(id);
            if decoder.is_opaque() {
                opaque.insert(id.clone());
            }
        }
        for (id, rule) in registry.iter() {
            match rule.kind {
                DecoderKind::KeyedCollection => store.set(id, Value::Object(Map::new())),
                DecoderKind::FromId => store.ensure(id, Value::Null),
            }
            history.ensure(id);
        }
        for id in &config.extra_points {
            history.ensure(id);
        }

        log::info!(
            "Telemetry engine built: {} configured sources, {} known identifiers, history depth {}",
            registry.len(),
            history.ids().count(),
            config.history_depth()
        );

        let state = EngineState {
            registry,
            store,
            history,
            routing: Routing::default(),
            pending: Vec::new(),
            opaque,
            last_timestamp: None,
        };

        Ok(TelemetryEngine {
            inner: Arc::new(EngineInner {
                state: Mutex::new(state),
                emission: Mutex::new(()),
                bus: NotificationBus::new(),
                catalog,
                connector,
                #[cfg(feature = "sampler")]
                sampler: Mutex::new(Sampler::new(Duration::from_millis(config.tick_interval_ms))),
            }),
        })
    }
}

/// Cheaply clonable handle to one aggregation engine.
#[derive(Clone)]
pub struct TelemetryEngine {
    inner: Arc<EngineInner>,
}

impl TelemetryEngine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Engine over `config` with the robot decoder catalog and no connector.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        Self::builder().config(config).build()
    }

    // --- Ingestion ---

    /// Delivers a raw sample stamped with the current time.
    pub fn deliver(&self, id: &str, raw: &Value) {
        self.deliver_at(id, raw, now_ms());
    }

    /// Delivers a raw sample for `id`.
    ///
    /// Samples for identifiers that are not routed are dropped. A sample that
    /// fails to decode is logged and leaves the previous state in place.
    /// Push-immediate identifiers generate and fan out a record before this
    /// returns; clock-synchronized ones are marked pending for the next tick.
    pub fn deliver_at(&self, id: &str, raw: &Value, timestamp: i64) {
        let _emission = lock(&self.inner.emission);

        let record = {
            let mut state = lock(&self.inner.state);
            if !state.routing.is_enabled(id) {
                log::trace!("Dropping sample for unrouted identifier {}", id);
                return;
            }

            let rule = state.registry.rule(id).unwrap_or_else(DecodeRule::fallback);
            let decoder: &dyn Decoder = match rule.kind {
                DecoderKind::KeyedCollection => &KEYED_COLLECTION,
                DecoderKind::FromId => self.inner.catalog.get(id).unwrap_or(&REPLACE),
            };

            let mut working = if decoder.replaces_state() {
                Value::Null
            } else {
                state.store.get(id).cloned().unwrap_or(Value::Null)
            };
            if let Err(e) = decoder.decode(&mut working, raw) {
                log::warn!("Failed to decode sample for {}: {}", id, e);
                return;
            }

            match rule.sync {
                SyncMode::PushImmediate => {
                    let generated = state.generate(timestamp, &working, id);
                    state.store.set(id, working);
                    match generated {
                        Ok(record) => record,
                        Err(e) => {
                            log::warn!("Could not record sample for {}: {}", id, e);
                            return;
                        }
                    }
                }
                SyncMode::SampledOnClock => {
                    state.store.set(id, working);
                    if !state.pending.iter().any(|p| p == id) {
                        state.pending.push(id.to_string());
                    }
                    return;
                }
            }
        };

        self.inner.bus.notify(&record);
    }

    /// Builds, stores and fans out a record for `id` directly, bypassing the
    /// decoders. Used by ad-hoc producers such as `ping`.
    pub fn generate_telemetry(&self, timestamp: i64, value: Value, id: &str) -> Result<TelemetryRecord, EngineError> {
        let _emission = lock(&self.inner.emission);
        let record = lock(&self.inner.state).generate(timestamp, &value, id)?;
        self.inner.bus.notify(&record);
        Ok(record)
    }

    /// Emits every pending clock-synchronized identifier once, all stamped
    /// with `timestamp`. Returns the number of records emitted.
    pub fn notifier_tick(&self, timestamp: i64) -> usize {
        self.emit_pending(timestamp, || false)
    }

    fn emit_pending(&self, timestamp: i64, cancelled: impl Fn() -> bool) -> usize {
        let _emission = lock(&self.inner.emission);
        if cancelled() {
            return 0;
        }

        let records = {
            let mut state = lock(&self.inner.state);
            let pending = std::mem::take(&mut state.pending);
            let mut records = Vec::with_capacity(pending.len());
            for id in pending {
                if !state.routing.is_enabled(&id) {
                    continue;
                }
                let Some(value) = state.store.get(&id).cloned() else {
                    continue;
                };
                match state.generate(timestamp, &value, &id) {
                    Ok(record) => records.push(record),
                    Err(e) => log::warn!("Could not record sample for {}: {}", id, e),
                }
            }
            records
        };

        for record in &records {
            self.inner.bus.notify(record);
        }
        records.len()
    }

    // --- Notifier ---

    /// Starts the periodic notifier on the current tokio runtime. Starting it
    /// twice logs a warning and does nothing.
    #[cfg(feature = "sampler")]
    pub fn start_notifier(&self) -> Result<(), EngineError> {
        let weak: Weak<EngineInner> = Arc::downgrade(&self.inner);
        lock(&self.inner.sampler).start(move |token| {
            let Some(inner) = weak.upgrade() else {
                return false;
            };
            TelemetryEngine { inner }.emit_pending(now_ms(), || token.is_cancelled());
            true
        })
    }

    /// Stops the periodic notifier. Once this returns no further tick emits.
    /// Stopping a stopped notifier logs a warning and does nothing.
    #[cfg(feature = "sampler")]
    pub fn stop_notifier(&self) {
        let stopped = lock(&self.inner.sampler).stop();
        if stopped {
            // Wait out a tick that is already emitting.
            drop(lock(&self.inner.emission));
        }
    }

    #[cfg(feature = "sampler")]
    pub fn is_notifier_running(&self) -> bool {
        lock(&self.inner.sampler).is_running()
    }

    // --- Source lifecycle ---

    /// Routes raw samples for `id` into its decoder and asks the connector to
    /// connect. The returned handle undoes both, once.
    ///
    /// An identifier that is not configured is registered with the fallback
    /// rule (`fromId`, pushed immediately).
    pub fn enable(&self, id: &str) -> SourceHandle {
        let newly_enabled = {
            let mut state = lock(&self.inner.state);
            if !state.registry.contains(id) {
                log::warn!("Identifier {} is not configured; enabling with the fallback rule", id);
                state.registry.register(id, DecodeRule::fallback());
                let initial = self
                    .inner
                    .catalog
                    .get(id)
                    .map(|d| d.default_state())
                    .unwrap_or(Value::Null);
                state.store.ensure(id, initial);
                state.history.ensure(id);
            }
            state.routing.enable(id)
        };

        if newly_enabled {
            log::info!("Routing enabled for {}", id);
            self.inner.connector.connect(id);
        } else {
            log::debug!("Routing already enabled for {}", id);
        }

        let weak = Arc::downgrade(&self.inner);
        let owned = id.to_string();
        SourceHandle::new(id, move || {
            if let Some(inner) = weak.upgrade() {
                TelemetryEngine { inner }.disable(&owned);
            }
        })
    }

    /// Stops routing samples for `id` and asks the connector to disconnect.
    pub fn disable(&self, id: &str) {
        let was_enabled = {
            let mut state = lock(&self.inner.state);
            state.pending.retain(|p| p != id);
            state.routing.disable(id)
        };

        if was_enabled {
            self.inner.connector.disconnect(id);
            log::info!("Routing disabled for {}", id);
        }
    }

    pub fn is_enabled(&self, id: &str) -> bool {
        lock(&self.inner.state).routing.is_enabled(id)
    }

    // --- Queries ---

    /// The last record of each identifier, concatenated in argument order.
    /// Identifiers with no data contribute nothing.
    pub fn latest<S: AsRef<str>>(&self, ids: &[S]) -> Result<Vec<TelemetryRecord>, EngineError> {
        lock(&self.inner.state).history.latest(ids)
    }

    /// Records with `start < timestamp < end`, concatenated per identifier in
    /// argument order.
    pub fn range<S: AsRef<str>>(&self, ids: &[S], start: i64, end: i64) -> Result<Vec<TelemetryRecord>, EngineError> {
        lock(&self.inner.state).history.range(ids, start, end)
    }

    /// Current canonical state of `id`.
    pub fn state(&self, id: &str) -> Option<Value> {
        lock(&self.inner.state).store.get(id).cloned()
    }

    /// Every identifier with a history buffer, sorted.
    pub fn identifiers(&self) -> Vec<String> {
        let mut ids: Vec<String> = lock(&self.inner.state).history.ids().cloned().collect();
        ids.sort();
        ids
    }

    pub fn history_len(&self, id: &str) -> Option<usize> {
        lock(&self.inner.state).history.buffer(id).map(|b| b.len())
    }

    // --- Subscribers ---

    /// Registers a subscriber for every generated record.
    pub fn listen<F>(&self, listener: F) -> Unsubscriber
    where
        F: Fn(&TelemetryRecord) + Send + Sync + 'static,
    {
        self.inner.bus.listen(listener)
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.bus.len()
    }
}

impl fmt::Debug for TelemetryEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock(&self.inner.state);
        f.debug_struct("TelemetryEngine")
            .field("sources", &state.registry.len())
            .field("enabled", &state.routing.len())
            .field("pending", &state.pending.len())
            .field("subscribers", &self.inner.bus.len())
            .finish()
    }
}
