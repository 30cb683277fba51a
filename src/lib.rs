//! Plexus plugin extensibility runtime.
//!
//! [`Runtime`] is the context object handed to plugins and framework code.
//! It owns one instance of each primitive so their lifecycles stay together:
//!
//! - `hooks` / `dispatcher`: named, ordered callback pipelines
//! - `cache`: object-path addressed values with expiry and subscriptions
//! - `pulse`: retryable, repeatable scheduled tasks

use std::sync::Arc;

use tracing::info;

use plexus_cache::MemoryCache;
use plexus_core::config::RuntimeConfig;
use plexus_plugin::{HookDispatcher, HookRegistry};
use plexus_worker::Pulse;

pub use plexus_cache;
pub use plexus_core;
pub use plexus_plugin;
pub use plexus_worker;

/// Shared runtime context.
#[derive(Debug, Clone)]
pub struct Runtime {
    /// Hook callbacks by hook name.
    pub hooks: Arc<HookRegistry>,
    /// Runs hooks against `hooks`.
    pub dispatcher: Arc<HookDispatcher>,
    /// In-memory cache.
    pub cache: MemoryCache,
    /// Task scheduler.
    pub pulse: Arc<Pulse>,
}

impl Runtime {
    /// Builds every primitive from `config`.
    pub fn new(config: &RuntimeConfig) -> Self {
        let hooks = Arc::new(HookRegistry::new(&config.hooks));
        let dispatcher = Arc::new(HookDispatcher::new(hooks.clone(), &config.hooks));
        let cache = MemoryCache::new(&config.cache);
        let pulse = Arc::new(Pulse::new(&config.pulse));

        info!(
            default_order = config.hooks.default_order,
            cache_ttl_ms = config.cache.default_ttl_ms,
            pulse_delay_ms = config.pulse.delay_ms,
            "Runtime initialized"
        );

        Self {
            hooks,
            dispatcher,
            cache,
            pulse,
        }
    }

    /// Stops every task and clears the cache, cancelling its timers.
    ///
    /// Callbacks already in flight are left to finish.
    pub fn shutdown(&self) {
        self.pulse.stop_all();
        self.cache.clear();
        info!("Runtime shut down");
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new(&RuntimeConfig::default())
    }
}
