use lib_telemetry::{EngineConfig, EngineError, NetworkConnector, SourceHandle, TelemetryEngine};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Connector that records which sources are connected. Samples arrive on the
/// shared UDP ingress, so connecting a source only needs bookkeeping.
#[derive(Debug, Default)]
pub struct TrackingConnector {
    connected: Mutex<BTreeSet<String>>,
}

impl TrackingConnector {
    pub fn connected(&self) -> Vec<String> {
        self.connected
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}

impl NetworkConnector for TrackingConnector {
    fn connect(&self, id: &str) {
        log::info!("Source {} connected", id);
        self.connected
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.to_string());
    }

    fn disconnect(&self, id: &str) {
        log::info!("Source {} disconnected", id);
        self.connected
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
    }
}

/// UDP ingress counters.
#[derive(Debug, Default)]
pub struct IngressStats {
    pub datagrams: AtomicU64,
    pub samples: AtomicU64,
    pub points: AtomicU64,
    pub rejected: AtomicU64,
}

impl IngressStats {
    pub fn snapshot(&self) -> [u64; 4] {
        [
            self.datagrams.load(Ordering::Relaxed),
            self.samples.load(Ordering::Relaxed),
            self.points.load(Ordering::Relaxed),
            self.rejected.load(Ordering::Relaxed),
        ]
    }
}

#[derive(Clone)]
pub struct AppState {
    pub engine: TelemetryEngine,
    pub connector: Arc<TrackingConnector>,
    pub stats: Arc<IngressStats>,
    // Handles of the sources enabled at startup
    sources: Arc<Mutex<Vec<SourceHandle>>>,
    configured: Arc<Vec<String>>,
}

impl AppState {
    pub fn new(engine_config: EngineConfig) -> Result<Self, EngineError> {
        let connector = Arc::new(TrackingConnector::default());
        let configured: Vec<String> = engine_config.sources.keys().cloned().collect();
        let engine = TelemetryEngine::builder()
            .config(engine_config)
            .connector(Arc::clone(&connector))
            .build()?;

        Ok(Self {
            engine,
            connector,
            stats: Arc::new(IngressStats::default()),
            sources: Arc::new(Mutex::new(Vec::new())),
            configured: Arc::new(configured),
        })
    }

    /// Enables every configured source.
    pub fn enable_all_sources(&self) {
        let mut sources = self.sources.lock().unwrap_or_else(PoisonError::into_inner);
        for id in self.configured.iter() {
            sources.push(self.engine.enable(id));
        }
        log::info!("Enabled {} telemetry sources", sources.len());
    }

    /// Disconnects every source enabled by `enable_all_sources`.
    pub fn disable_all_sources(&self) {
        let handles: Vec<SourceHandle> = self
            .sources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for handle in &handles {
            handle.disconnect();
        }
        log::info!("Disabled {} telemetry sources", handles.len());
    }
}
