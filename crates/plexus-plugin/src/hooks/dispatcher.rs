//! Hook dispatcher: runs a hook's callbacks in order against a shared context.
//!
//! Callbacks run strictly one after another, ascending by order, so each one
//! sees what the previous ones wrote to the context. The first callback to
//! fail stops the run and its error is returned to the caller; the context
//! built so far is discarded.
//!
//! - `run` awaits async callbacks and calls sync callbacks inline.
//! - `run_sync` calls only the sync callbacks and never suspends.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, error, warn};

use plexus_core::config::HookConfig;
use plexus_core::error::{AppError, ErrorKind};
use plexus_core::result::AppResult;

use super::definitions::HookContext;
use super::handler::HookCallback;
use super::registry::HookRegistry;

/// Runs hooks against the callbacks in a [`HookRegistry`].
#[derive(Debug, Clone)]
pub struct HookDispatcher {
    /// Hook registry.
    registry: Arc<HookRegistry>,
    /// Callbacks slower than this are reported.
    slow_callback: Duration,
}

impl HookDispatcher {
    /// Creates a new hook dispatcher.
    pub fn new(registry: Arc<HookRegistry>, config: &HookConfig) -> Self {
        Self {
            registry,
            slow_callback: Duration::from_millis(config.slow_callback_warn_ms),
        }
    }

    /// Runs every callback registered for `name` and resolves with the final context.
    ///
    /// Each callback receives `params` followed by the context.
    pub async fn run(&self, name: &str, params: Vec<Value>) -> AppResult<HookContext> {
        let callbacks = self.registry.callbacks(name);
        let mut context = HookContext::new();

        if callbacks.is_empty() {
            return Ok(context);
        }

        debug!(hook = %name, callback_count = callbacks.len(), "Running hook");

        for (id, callback) in callbacks {
            let started = Instant::now();
            let result = match &callback {
                HookCallback::Async(handler) => handler.handle(&params, &mut context).await,
                HookCallback::Sync(handler) => handler.handle(&params, &mut context),
            };
            self.check_duration(name, &id, started);
            result.map_err(|e| callback_failed(name, &id, e))?;
        }

        Ok(context)
    }

    /// Runs the synchronous callbacks registered for `name` in the caller's stack.
    ///
    /// Async callbacks are skipped.
    pub fn run_sync(&self, name: &str, params: Vec<Value>) -> AppResult<HookContext> {
        let callbacks = self.registry.callbacks(name);
        let mut context = HookContext::new();

        if callbacks.is_empty() {
            return Ok(context);
        }

        debug!(hook = %name, callback_count = callbacks.len(), "Running hook synchronously");

        for (id, callback) in callbacks {
            let HookCallback::Sync(handler) = callback else {
                debug!(hook = %name, id = %id, "Skipping async callback in synchronous run");
                continue;
            };
            let started = Instant::now();
            let result = handler.handle(&params, &mut context);
            self.check_duration(name, &id, started);
            result.map_err(|e| callback_failed(name, &id, e))?;
        }

        Ok(context)
    }

    /// Returns a reference to the hook registry.
    pub fn registry(&self) -> &Arc<HookRegistry> {
        &self.registry
    }

    fn check_duration(&self, name: &str, id: &str, started: Instant) {
        let elapsed = started.elapsed();
        if elapsed > self.slow_callback {
            warn!(
                hook = %name,
                id = %id,
                elapsed_ms = elapsed.as_millis() as u64,
                "Slow hook callback"
            );
        }
    }
}

fn callback_failed(name: &str, id: &str, err: AppError) -> AppError {
    error!(hook = %name, id = %id, error = %err, "Hook callback failed");
    let message = format!("Hook '{name}' callback '{id}' failed: {}", err.message);
    AppError::with_source(ErrorKind::Plugin, message, err)
}
