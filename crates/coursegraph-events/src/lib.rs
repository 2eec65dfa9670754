use coursegraph_core::{NodeId, ResourceQuery};
use crossbeam_channel::{Receiver, Sender, TrySendError, bounded, unbounded};
use serde::{Deserialize, Serialize};

pub mod telemetry;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ActivationOrigin {
    Select,
    DoubleActivate,
    Keyboard,
}

/// Which node budget a warning refers to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BudgetKind {
    /// Initial load produced more nodes than is comfortable to browse.
    Comfortable,
    /// Expansion crossed the soft ceiling but was committed.
    Soft,
    /// Expansion would have crossed the hard ceiling and was rolled back.
    Hard,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Event {
    // Root
    RootLoadStarted,
    RootLoaded {
        node_count: usize,
        expanded_groups: usize,
    },
    RootLoadFailed {
        error: String,
    },

    // Expansion
    NodeFetchStarted {
        id: NodeId,
    },
    NodeExpanded {
        id: NodeId,
        added: usize,
    },
    NodeCollapsed {
        id: NodeId,
        removed: usize,
    },
    NodeFetchFailed {
        id: NodeId,
        error: String,
    },
    FetchDiscarded {
        id: NodeId,
    },
    /// `id` is `None` for the group level.
    ResultTruncated {
        id: Option<NodeId>,
        received: usize,
        kept: usize,
    },

    // Budget
    BudgetWarning {
        kind: BudgetKind,
        node_count: usize,
        limit: usize,
    },
    BudgetExceeded {
        id: NodeId,
        projected: usize,
        limit: usize,
    },

    // Viewport
    ViewportChanged {
        scale: f32,
        x: f32,
        y: f32,
    },
    ViewReset,

    // Navigation
    NodeActivated {
        id: NodeId,
        origin: ActivationOrigin,
        query: ResourceQuery,
    },
}

/// Pending events kept by [`EventBus::new`] before the oldest are dropped.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Queue of navigator events.
///
/// The bus owns both ends of its channel, so events stay queued until a
/// consumer calls [`EventBus::drain`] or [`EventBus::dispatch_to`]. A bounded
/// bus drops its oldest pending event when a new one does not fit, so an
/// embedder that never drains it holds at most `capacity` events.
#[derive(Clone)]
pub struct EventBus {
    tx: Sender<Event>,
    rx: Receiver<Event>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity.max(1));
        Self { tx, rx }
    }

    /// Bus that never drops events. Only for consumers that drain it.
    pub fn unbounded() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    pub fn sender(&self) -> Sender<Event> {
        self.tx.clone()
    }

    pub fn receiver(&self) -> Receiver<Event> {
        self.rx.clone()
    }

    pub fn publish(&self, event: Event) {
        let mut event = event;
        loop {
            match self.tx.try_send(event) {
                Ok(()) => return,
                Err(TrySendError::Full(rejected)) => {
                    if let Ok(dropped) = self.rx.try_recv() {
                        tracing::debug!(?dropped, "event bus full; dropping oldest event");
                    }
                    event = rejected;
                }
                Err(TrySendError::Disconnected(_)) => return,
            }
        }
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Drain every pending event without blocking.
    pub fn drain(&self) -> Vec<Event> {
        self.rx.try_iter().collect()
    }

    /// Dispatch all pending events to a listener.
    /// This is useful for processing events in the UI loop.
    pub fn dispatch_to<L: EventListener>(&self, listener: &mut L) {
        while let Ok(event) = self.rx.try_recv() {
            listener.handle_event(&event);
        }
    }
}

/// Trait for components that respond to events.
/// Implement this to receive events from the EventBus.
pub trait EventListener {
    fn handle_event(&mut self, event: &Event);
}
