//! # Source Lifecycle
//!
//! Per-identifier routing of raw samples into the decoders, and the injected
//! connector that establishes or tears down the external transport
//! subscription for an identifier.

use std::collections::HashSet;
use std::fmt;
use std::sync::Mutex;

/// Transport-side connect / disconnect for one identifier.
///
/// Installed once through the engine builder, before any routing can be
/// enabled.
pub trait NetworkConnector: Send + Sync {
    /// Establishes the transport subscription for `id`.
    fn connect(&self, id: &str);
    /// Tears down the transport subscription for `id`.
    fn disconnect(&self, id: &str);
}

impl<T: NetworkConnector + ?Sized> NetworkConnector for std::sync::Arc<T> {
    fn connect(&self, id: &str) {
        (**self).connect(id)
    }

    fn disconnect(&self, id: &str) {
        (**self).disconnect(id)
    }
}

/// Connector used when none is injected.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopConnector;

impl NetworkConnector for NoopConnector {
    fn connect(&self, _id: &str) {}
    fn disconnect(&self, _id: &str) {}
}

/// A connector assembled from two closures.
pub struct FnConnector<C, D> {
    on_connect: C,
    on_disconnect: D,
}

impl<C, D> FnConnector<C, D>
where
    C: Fn(&str) + Send + Sync,
    D: Fn(&str) + Send + Sync,
{
    pub fn new(on_connect: C, on_disconnect: D) -> Self {
        Self {
            on_connect,
            on_disconnect,
        }
    }
}

impl<C, D> NetworkConnector for FnConnector<C, D>
where
    C: Fn(&str) + Send + Sync,
    D: Fn(&str) + Send + Sync,
{
    fn connect(&self, id: &str) {
        (self.on_connect)(id)
    }

    fn disconnect(&self, id: &str) {
        (self.on_disconnect)(id)
    }
}

/// The set of identifiers whose raw samples currently reach the decoders.
#[derive(Debug, Clone, Default)]
pub struct Routing {
    enabled: HashSet<String>,
}

impl Routing {
    /// Returns `false` if `id` was already routed.
    pub fn enable(&mut self, id: &str) -> bool {
        self.enabled.insert(id.to_string())
    }

    /// Returns `false` if `id` was not routed.
    pub fn disable(&mut self, id: &str) -> bool {
        self.enabled.remove(id)
    }

    pub fn is_enabled(&self, id: &str) -> bool {
        self.enabled.contains(id)
    }

    pub fn len(&self) -> usize {
        self.enabled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.enabled.is_empty()
    }
}

type Disposer = Box<dyn FnOnce() + Send>;

/// Disposer returned when a source is enabled. `disconnect` disables routing
/// and calls the connector's `disconnect`, at most once.
pub struct SourceHandle {
    id: String,
    disposer: Mutex<Option<Disposer>>,
}

impl SourceHandle {
    pub(crate) fn new(id: &str, disposer: impl FnOnce() + Send + 'static) -> Self {
        Self {
            id: id.to_string(),
            disposer: Mutex::new(Some(Box::new(disposer))),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn disconnect(&self) {
        let disposer = self
            .disposer
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        if let Some(dispose) = disposer {
            dispose();
        }
    }
}

impl fmt::Debug for SourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceHandle").field("id", &self.id).finish()
    }
}
