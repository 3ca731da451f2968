use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

pub type Listener = Arc<dyn Fn(&str, &Value) + Send + Sync>;

/// Named synchronous listeners. Listeners are registered when the application
/// is built; each request works on its own clone of the bus.
#[derive(Clone, Default)]
pub struct EventBus {
    listeners: HashMap<String, Vec<Listener>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach<F>(&mut self, event: impl Into<String>, listener: F)
    where
        F: Fn(&str, &Value) + Send + Sync + 'static,
    {
        self.listeners
            .entry(event.into())
            .or_default()
            .push(Arc::new(listener));
    }

    /// Run every listener for `event` in attach order; returns how many ran
    pub fn trigger(&self, event: &str, payload: &Value) -> usize {
        let listeners = match self.listeners.get(event) {
            Some(listeners) => listeners,
            None => return 0,
        };

        for listener in listeners {
            listener(event, payload);
        }

        debug!("Event '{}' reached {} listeners", event, listeners.len());
        listeners.len()
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners.get(event).map_or(0, Vec::len)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut events: Vec<_> = self.listeners.keys().collect();
        events.sort();
        f.debug_struct("EventBus").field("events", &events).finish()
    }
}
