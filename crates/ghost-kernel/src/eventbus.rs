//! Minimal synchronous event bus.
//!
//! Listeners are registered per event name and invoked in registration
//! order. A failing or panicking listener is logged and skipped; it never
//! prevents later listeners from running.

use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::warn;

type ListenerFn = dyn Fn(&Value) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
    + Send
    + Sync;

/// Name-keyed listener registry.
#[derive(Default)]
pub struct EventBus {
    listeners: RwLock<HashMap<String, Vec<Arc<ListenerFn>>>>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener for `event`. Listeners run in registration
    /// order when the event is emitted.
    pub fn on<F>(&self, event: impl Into<String>, listener: F)
    where
        F: Fn(&Value) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
            + Send
            + Sync
            + 'static,
    {
        self.listeners
            .write()
            .entry(event.into())
            .or_default()
            .push(Arc::new(listener));
    }

    /// Emits `event` with `payload`, invoking every registered listener.
    ///
    /// Returns the number of listeners invoked. Emitting an event nobody
    /// listens for is a no-op.
    pub fn emit(&self, event: &str, payload: &Value) -> usize {
        // Clone out of the lock so a listener may register more listeners.
        let handlers: Vec<Arc<ListenerFn>> = match self.listeners.read().get(event) {
            Some(list) => list.clone(),
            None => return 0,
        };

        let mut invoked = 0;
        for handler in &handlers {
            invoked += 1;
            match catch_unwind(AssertUnwindSafe(|| handler(payload))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(event, error = %e, "event listener failed");
                }
                Err(_) => {
                    warn!(event, "event listener panicked");
                }
            }
        }
        invoked
    }

    /// Number of listeners registered for `event`.
    #[must_use]
    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners.read().get(event).map_or(0, Vec::len)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let guard = self.listeners.read();
        f.debug_struct("EventBus")
            .field("events", &guard.len())
            .finish()
    }
}
