//! Event surface: listener table coupled to snippet requirements.
//!
//! Registering a listener for an event type permanently requires the client
//! snippet of the same name. Removing the listener later does not retract the
//! requirement.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use tracing::{debug, warn};

pub use graft_common::events::{Event, EventListener, FnListener, ListenerId, ListenerOptions};

use crate::snippets::SnippetRegistry;

struct ListenerEntry {
    id: ListenerId,
    listener: Arc<dyn EventListener>,
    once: bool,
}

/// Publish/subscribe surface shared by every module of an engine.
pub struct EventSurface {
    snippets: Arc<SnippetRegistry>,
    listeners: Mutex<HashMap<String, Vec<ListenerEntry>>>,
}

impl EventSurface {
    pub fn new(snippets: Arc<SnippetRegistry>) -> Self {
        Self {
            snippets,
            listeners: Mutex::new(HashMap::new()),
        }
    }

    pub fn snippets(&self) -> &Arc<SnippetRegistry> {
        &self.snippets
    }

    /// Register `listener` for `kind` and require the `kind` snippet.
    ///
    /// Listeners for the same type run in registration order.
    pub fn add_event_listener(
        &self,
        kind: &str,
        listener: Arc<dyn EventListener>,
        options: ListenerOptions,
    ) -> ListenerId {
        if self.snippets.require(kind) {
            debug!(snippet = kind, "snippet required");
        }

        let id = ListenerId::next();
        debug!(event = kind, listener = listener.name(), %id, "event listener added");
        self.listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(kind.to_string())
            .or_default()
            .push(ListenerEntry {
                id,
                listener,
                once: options.once,
            });
        id
    }

    /// Remove a listener. Returns `false` if it was not registered for `kind`.
    pub fn remove_event_listener(&self, kind: &str, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
        let Some(entries) = listeners.get_mut(kind) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|e| e.id != id);
        entries.len() != before
    }

    pub fn listener_count(&self, kind: &str) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(kind)
            .map_or(0, Vec::len)
    }

    /// Invoke every listener for `event.kind` in registration order.
    ///
    /// Listener errors are logged and do not stop later listeners. `once`
    /// listeners are unregistered before they run. Returns how many listeners
    /// were invoked.
    pub async fn dispatch(&self, event: &Event) -> usize {
        let targets: Vec<Arc<dyn EventListener>> = {
            let mut listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
            let Some(entries) = listeners.get_mut(&event.kind) else {
                return 0;
            };
            let targets = entries.iter().map(|e| Arc::clone(&e.listener)).collect();
            entries.retain(|e| !e.once);
            targets
        };

        debug!(event = %event.kind, count = targets.len(), "dispatching event");

        for listener in &targets {
            if let Err(e) = listener.handle(event).await {
                warn!(listener = listener.name(), event = %event.kind, error = %e, "event listener failed");
            }
        }

        targets.len()
    }
}
