//! Shared test helpers for integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use plexus::Runtime;
use plexus_cache::{CacheEvent, CacheSubscription};
use plexus_core::config::RuntimeConfig;

/// Builds a runtime from the default configuration.
pub fn runtime() -> Runtime {
    Runtime::new(&RuntimeConfig::default())
}

/// Builds a runtime from the default configuration adjusted by `adjust`.
pub fn runtime_with(adjust: impl FnOnce(&mut RuntimeConfig)) -> Runtime {
    let mut config = RuntimeConfig::default();
    adjust(&mut config);
    Runtime::new(&config)
}

/// Events seen by one cache subscription.
pub struct EventLog {
    /// Recorded events, oldest first.
    pub events: Arc<Mutex<Vec<CacheEvent>>>,
    /// The subscription feeding `events`.
    pub subscription: CacheSubscription,
}

impl EventLog {
    /// Subscribes to `key` on the runtime's cache.
    pub fn subscribe(runtime: &Runtime, key: &str) -> Self {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let subscription = runtime.cache.subscribe(key, move |event: &CacheEvent| {
            sink.lock().unwrap().push(event.clone());
        });
        Self {
            events,
            subscription,
        }
    }

    /// Returns the recorded events.
    pub fn events(&self) -> Vec<CacheEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Returns the recorded operation names.
    pub fn ops(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().iter().map(CacheEvent::op).collect()
    }
}
