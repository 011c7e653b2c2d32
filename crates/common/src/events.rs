//! Core event types shared across crates.
//!
//! The listener table and its coupling to snippet requirements live in
//! `graft-plugins`; this module provides the event value and the listener
//! trait so modules can implement listeners without depending on the engine.

use std::{
    fmt,
    future::Future,
    pin::Pin,
    sync::atomic::{AtomicU64, Ordering},
};

use {
    anyhow::Result,
    async_trait::async_trait,
    serde::{Deserialize, Serialize},
    serde_json::Value,
};

// ── Event ───────────────────────────────────────────────────────────────────

/// An event fired on the event surface.
///
/// `kind` doubles as the name of the client snippet implementing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<Value>,
}

impl Event {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            payload: Value::Null,
            client: None,
        }
    }

    #[must_use]
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    #[must_use]
    pub fn with_client(mut self, client: Value) -> Self {
        self.client = Some(client);
        self
    }
}

// ── Listener identity and options ───────────────────────────────────────────

/// Opaque handle returned when a listener is registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Allocate a process-unique id.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// Registration options for a listener.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenerOptions {
    /// Remove the listener after its first invocation.
    pub once: bool,
}

impl ListenerOptions {
    pub fn once() -> Self {
        Self { once: true }
    }
}

// ── EventListener trait ─────────────────────────────────────────────────────

/// Callback invoked when an event of a subscribed type fires.
#[async_trait]
pub trait EventListener: Send + Sync {
    /// A human-readable name used in logs.
    fn name(&self) -> &str {
        "anonymous"
    }

    async fn handle(&self, event: &Event) -> Result<()>;
}

type BoxedHandler =
    Box<dyn Fn(Event) -> Pin<Box<dyn Future<Output = Result<()>> + Send>> + Send + Sync>;

/// Adapts an async closure into an [`EventListener`].
pub struct FnListener {
    listener_name: String,
    handler: BoxedHandler,
}

impl FnListener {
    pub fn new<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        Self {
            listener_name: name.into(),
            handler: Box::new(move |event| Box::pin(f(event))),
        }
    }
}

#[async_trait]
impl EventListener for FnListener {
    fn name(&self) -> &str {
        &self.listener_name
    }

    async fn handle(&self, event: &Event) -> Result<()> {
        (self.handler)(event.clone()).await
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[test]
    fn listener_ids_are_unique() {
        let a = ListenerId::next();
        let b = ListenerId::next();
        assert_ne!(a, b);
        assert!(b > a);
    }

    #[test]
    fn event_serializes_kind_as_type() {
        let event = Event::new("click").with_payload(serde_json::json!({"x": 1}));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "click");
        assert_eq!(json["payload"]["x"], 1);
        assert!(json.get("client").is_none());
    }

    #[test]
    fn event_deserializes_without_payload() {
        let event: Event = serde_json::from_str(r#"{"type":"scroll"}"#).unwrap();
        assert_eq!(event.kind, "scroll");
        assert_eq!(event.payload, Value::Null);
        assert!(event.client.is_none());
    }

    #[tokio::test]
    async fn fn_listener_receives_event() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let listener = FnListener::new("recorder", move |event: Event| {
            let sink = Arc::clone(&sink);
            async move {
                sink.lock().unwrap().push(event.kind);
                Ok(())
            }
        });

        assert_eq!(listener.name(), "recorder");
        listener.handle(&Event::new("pageview")).await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["pageview".to_string()]);
    }

    #[tokio::test]
    async fn fn_listener_propagates_errors() {
        let listener = FnListener::new("failer", |_event: Event| async {
            Err::<(), _>(anyhow::anyhow!("listener failed"))
        });
        let err = listener.handle(&Event::new("click")).await.unwrap_err();
        assert_eq!(err.to_string(), "listener failed");
    }
}
