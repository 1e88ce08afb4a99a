//! Playback Events
//!
//! Typed publish/subscribe for player lifecycle events. Listeners are kept per
//! event kind in registration order; each registration returns a
//! [`ListenerId`] used to remove it again.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::error;

/// The fixed set of player events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Play,
    Pause,
    Stop,
    Seek,
    Next,
    Previous,
    Skip,
    Playing,
    Load,
    Error,
}

/// Events emitted by the player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlayerEvent {
    /// Playback was requested for a muse
    Play { id: String },

    /// Playback was paused
    Pause { id: String },

    /// Playback stopped and rewound (explicitly or at the end of the list)
    Stop { id: String },

    /// Position changed through a seek
    Seek { id: String, position: Duration },

    /// Selection moved forward
    Next { from: String, to: String },

    /// Selection moved back
    Previous { from: String, to: String },

    /// Selection jumped directly to another muse
    Skip { from: String, to: String },

    /// The resource confirmed playback
    Playing { id: String },

    /// A resource finished loading
    Load { id: String },

    /// A resource failed
    Error { id: Option<String>, message: String },
}

impl PlayerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            PlayerEvent::Play { .. } => EventKind::Play,
            PlayerEvent::Pause { .. } => EventKind::Pause,
            PlayerEvent::Stop { .. } => EventKind::Stop,
            PlayerEvent::Seek { .. } => EventKind::Seek,
            PlayerEvent::Next { .. } => EventKind::Next,
            PlayerEvent::Previous { .. } => EventKind::Previous,
            PlayerEvent::Skip { .. } => EventKind::Skip,
            PlayerEvent::Playing { .. } => EventKind::Playing,
            PlayerEvent::Load { .. } => EventKind::Load,
            PlayerEvent::Error { .. } => EventKind::Error,
        }
    }
}

/// Handle identifying one registered listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Handler = Arc<dyn Fn(&PlayerEvent) + Send + Sync>;

struct Listener {
    id: ListenerId,
    once: bool,
    handler: Handler,
}

/// Event registry and dispatcher
pub struct EventBus {
    listeners: Mutex<HashMap<EventKind, Vec<Listener>>>,
    next_id: AtomicU64,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a persistent listener
    pub fn on<F>(&self, kind: EventKind, handler: F) -> ListenerId
    where
        F: Fn(&PlayerEvent) + Send + Sync + 'static,
    {
        self.register(kind, Arc::new(handler), false)
    }

    /// Register a listener that is removed after its first call
    pub fn once<F>(&self, kind: EventKind, handler: F) -> ListenerId
    where
        F: Fn(&PlayerEvent) + Send + Sync + 'static,
    {
        self.register(kind, Arc::new(handler), true)
    }

    /// Remove a listener
    ///
    /// Returns `true` if it was registered for `kind`.
    pub fn not_on(&self, kind: EventKind, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let Some(list) = listeners.get_mut(&kind) else {
            return false;
        };
        let before = list.len();
        list.retain(|l| l.id != id);
        before != list.len()
    }

    /// Number of listeners registered for `kind`
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners.lock().get(&kind).map_or(0, Vec::len)
    }

    /// Remove every listener
    pub fn clear(&self) {
        self.listeners.lock().clear();
    }

    /// Deliver an event to its listeners in registration order
    ///
    /// The registry is not locked while handlers run, so handlers may add or
    /// remove listeners. A panicking handler is logged and skipped.
    pub fn emit(&self, event: &PlayerEvent) {
        let kind = event.kind();
        let handlers: Vec<Handler> = {
            let mut listeners = self.listeners.lock();
            let Some(list) = listeners.get_mut(&kind) else {
                return;
            };
            let handlers = list.iter().map(|l| Arc::clone(&l.handler)).collect();
            list.retain(|l| !l.once);
            handlers
        };

        for handler in handlers {
            if catch_unwind(AssertUnwindSafe(|| handler(event))).is_err() {
                error!(?kind, "event handler panicked");
            }
        }
    }

    fn register(&self, kind: EventKind, handler: Handler, once: bool) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .lock()
            .entry(kind)
            .or_default()
            .push(Listener { id, once, handler });
        id
    }
}
