//! Client event surface
//!
//! Connection lifecycle and inbound traffic are published as [`ClientEvent`]s
//! on an [`EventBus`]. Listeners subscribe to one [`EventKind`], run
//! synchronously on the emitting task, and are removed with the
//! [`ListenerId`] returned at registration.
//!
//! # Examples
//!
//! ```rust
//! use wireql_client::{ClientEvent, EventBus, EventKind};
//!
//! let bus = EventBus::new();
//! let id = bus.on(EventKind::Disconnect, |event| {
//!     if let ClientEvent::Disconnect { reason, .. } = event {
//!         println!("socket closed: {}", reason);
//!     }
//! });
//!
//! bus.emit(&ClientEvent::Disconnect { reason: "Code: 1006".into(), code: 1006 });
//! assert!(bus.off(id));
//! ```

use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Something that happened on the client
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// WebSocket opened
    Connect,
    /// WebSocket closed; `reason` is the close reason or `Code: <n>`
    Disconnect { reason: String, code: u16 },
    /// Transport-level problem that did not belong to a single call
    Error { message: String },
    /// Reconnect attempt `attempt` scheduled
    Reconnecting { attempt: u32 },
    /// A reconnect attempt succeeded
    Reconnected,
    /// Any decoded inbound frame
    Message(Value),
    /// Server ping received
    Ping,
    /// Pong received
    Pong,
}

impl ClientEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ClientEvent::Connect => EventKind::Connect,
            ClientEvent::Disconnect { .. } => EventKind::Disconnect,
            ClientEvent::Error { .. } => EventKind::Error,
            ClientEvent::Reconnecting { .. } => EventKind::Reconnecting,
            ClientEvent::Reconnected => EventKind::Reconnected,
            ClientEvent::Message(_) => EventKind::Message,
            ClientEvent::Ping => EventKind::Ping,
            ClientEvent::Pong => EventKind::Pong,
        }
    }
}

/// Event kinds listeners subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Connect,
    Disconnect,
    Error,
    Reconnecting,
    Reconnected,
    Message,
    Ping,
    Pong,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Connect => "connect",
            EventKind::Disconnect => "disconnect",
            EventKind::Error => "error",
            EventKind::Reconnecting => "reconnecting",
            EventKind::Reconnected => "reconnected",
            EventKind::Message => "message",
            EventKind::Ping => "ping",
            EventKind::Pong => "pong",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle for removing a listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Listener callback
pub type EventHandler = Arc<dyn Fn(&ClientEvent) + Send + Sync>;

struct Listener {
    id: ListenerId,
    kind: EventKind,
    once: bool,
    handler: EventHandler,
}

/// Registry of event listeners
///
/// Cheap to clone; clones share listeners.
#[derive(Clone, Default)]
pub struct EventBus {
    listeners: Arc<Mutex<Vec<Listener>>>,
    next_id: Arc<AtomicU64>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for every event of `kind`
    pub fn on<F>(&self, kind: EventKind, handler: F) -> ListenerId
    where
        F: Fn(&ClientEvent) + Send + Sync + 'static,
    {
        self.register(kind, false, Arc::new(handler))
    }

    /// Register `handler` for the next event of `kind` only
    pub fn once<F>(&self, kind: EventKind, handler: F) -> ListenerId
    where
        F: Fn(&ClientEvent) + Send + Sync + 'static,
    {
        self.register(kind, true, Arc::new(handler))
    }

    /// Remove a listener; returns whether it was still registered
    pub fn off(&self, id: ListenerId) -> bool {
        let mut listeners = self.lock();
        let before = listeners.len();
        listeners.retain(|l| l.id != id);
        listeners.len() != before
    }

    /// Deliver `event` to its listeners in registration order
    pub fn emit(&self, event: &ClientEvent) {
        let kind = event.kind();
        let handlers: Vec<EventHandler> = {
            let mut listeners = self.lock();
            let matching = listeners
                .iter()
                .filter(|l| l.kind == kind)
                .map(|l| Arc::clone(&l.handler))
                .collect();
            listeners.retain(|l| !(l.once && l.kind == kind));
            matching
        };

        for handler in handlers {
            handler(event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.lock().len()
    }

    fn register(&self, kind: EventKind, once: bool, handler: EventHandler) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push(Listener {
            id,
            kind,
            once,
            handler,
        });
        id
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Listener>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
