//! Observers for resolution events.
//!
//! The engine emits `tracing` events on its own; observers are for hosts
//! and tests that want the events as values, for example to attach them to
//! an IDE trace view or to assert on the order requests were visited in.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::callable::InjectableRequest;
use crate::result::{NodeKind, ResolutionFailure, ResolutionNode};

/// Observer trait for resolution events.
///
/// Observer calls are made synchronously during resolution. Keep
/// implementations lightweight.
///
/// # Examples
///
/// ```
/// use ferrous_inject::{InjectableRequest, ResolutionFailure, ResolutionNode, ResolutionObserver};
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// #[derive(Default)]
/// struct CountingObserver {
///     requests: AtomicUsize,
/// }
///
/// impl ResolutionObserver for CountingObserver {
///     fn resolving(&self, _request: &InjectableRequest) {
///         self.requests.fetch_add(1, Ordering::Relaxed);
///     }
///
///     fn resolved(&self, _request: &InjectableRequest, _node: Option<&ResolutionNode>) {}
///
///     fn failed(&self, _failure: &ResolutionFailure) {}
/// }
/// ```
pub trait ResolutionObserver: Send + Sync {
    /// Called before candidates are collected for a request.
    fn resolving(&self, request: &InjectableRequest);

    /// Called once a request is satisfied. `node` is `None` when the
    /// parameter's default value is used.
    fn resolved(&self, request: &InjectableRequest, node: Option<&ResolutionNode>);

    /// Called once per failed `resolve` call with the reported failure.
    fn failed(&self, failure: &ResolutionFailure);
}

/// Container for registered observers.
///
/// Notifying an empty container is a single emptiness check.
#[derive(Default, Clone)]
pub(crate) struct Observers {
    observers: Vec<Arc<dyn ResolutionObserver>>,
}

impl Observers {
    pub(crate) fn new() -> Self {
        Self {
            observers: Vec::new(),
        }
    }

    pub(crate) fn add(&mut self, observer: Arc<dyn ResolutionObserver>) {
        self.observers.push(observer);
    }

    #[inline]
    pub(crate) fn has_observers(&self) -> bool {
        !self.observers.is_empty()
    }

    #[inline]
    pub(crate) fn resolving(&self, request: &InjectableRequest) {
        for observer in &self.observers {
            observer.resolving(request);
        }
    }

    #[inline]
    pub(crate) fn resolved(&self, request: &InjectableRequest, node: Option<&ResolutionNode>) {
        for observer in &self.observers {
            observer.resolved(request, node);
        }
    }

    #[inline]
    pub(crate) fn failed(&self, failure: &ResolutionFailure) {
        for observer in &self.observers {
            observer.failed(failure);
        }
    }
}

impl std::fmt::Debug for Observers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observers")
            .field("count", &self.observers.len())
            .finish()
    }
}

/// Built-in observer that forwards events to `tracing`.
///
/// ```
/// use ferrous_inject::{AnalysisSession, InMemoryCatalog, LoggingObserver, Resolver};
/// use std::sync::Arc;
///
/// let session = AnalysisSession::from_catalog(InMemoryCatalog::builder().build());
/// let mut resolver = Resolver::new(session);
/// resolver.add_observer(Arc::new(LoggingObserver::with_prefix("app")));
/// ```
pub struct LoggingObserver {
    prefix: String,
}

impl LoggingObserver {
    pub fn new() -> Self {
        Self {
            prefix: "ferrous-inject".to_string(),
        }
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Default for LoggingObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl ResolutionObserver for LoggingObserver {
    fn resolving(&self, request: &InjectableRequest) {
        debug!(prefix = %self.prefix, ty = %request.ty, origin = %request.origin, "resolving");
    }

    fn resolved(&self, request: &InjectableRequest, node: Option<&ResolutionNode>) {
        match node {
            Some(node) => debug!(
                prefix = %self.prefix,
                ty = %request.ty,
                node = %node.id,
                kind = node_label(node),
                "resolved"
            ),
            None => debug!(prefix = %self.prefix, ty = %request.ty, "resolved by default value"),
        }
    }

    fn failed(&self, failure: &ResolutionFailure) {
        warn!(prefix = %self.prefix, kind = failure.kind_name(), "{}", failure);
    }
}

fn node_label(node: &ResolutionNode) -> &'static str {
    match node.kind {
        NodeKind::Callable { .. } => "callable",
        NodeKind::SetAggregate { .. } => "set",
        NodeKind::MapAggregate { .. } => "map",
        NodeKind::FunctionProvider { .. } => "function",
    }
}

/// One recorded event.
#[derive(Debug, Clone, PartialEq)]
pub enum ObservedEvent {
    Resolving(String),
    /// Requested type and the chosen callable, or `None` for a default
    Resolved(String, Option<String>),
    Failed(String),
}

/// Observer that records rendered events in order.
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<ObservedEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ObservedEvent> {
        self.events.lock().clone()
    }

    /// Rendered types of every `resolving` event
    pub fn requested_types(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                ObservedEvent::Resolving(ty) => Some(ty.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl ResolutionObserver for RecordingObserver {
    fn resolving(&self, request: &InjectableRequest) {
        self.events.lock().push(ObservedEvent::Resolving(request.ty.render()));
    }

    fn resolved(&self, request: &InjectableRequest, node: Option<&ResolutionNode>) {
        let chosen = node.map(|n| match n.candidate() {
            Some(candidate) => candidate.id.to_string(),
            None => node_label(n).to_string(),
        });
        self.events
            .lock()
            .push(ObservedEvent::Resolved(request.ty.render(), chosen));
    }

    fn failed(&self, failure: &ResolutionFailure) {
        self.events.lock().push(ObservedEvent::Failed(failure.to_string()));
    }
}
