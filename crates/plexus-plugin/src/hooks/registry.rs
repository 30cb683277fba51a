//! Hook registry. Plugins register callbacks by hook name with ordering.
//!
//! Each hook name owns one [`Registry`] of callbacks, created on first
//! registration. Callback ids are unique across all hooks so a callback can
//! be unregistered by id alone.

use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use plexus_core::config::HookConfig;
use plexus_core::result::AppResult;

use super::definitions::{CallbackInfo, HookContext, HookOptions, HookSummary};
use super::handler::{AsyncFnHandler, HookCallback, HookHandler, SyncHookHandler};
use crate::registry::{Registry, RegistryError};

/// Registry of hook callbacks organized by hook name.
#[derive(Debug)]
pub struct HookRegistry {
    /// Hook name → ordered callbacks.
    hooks: DashMap<String, Registry<HookCallback>>,
    /// Callback id → hook name.
    owners: DashMap<String, String>,
    /// Order used when a registration does not give one.
    default_order: i32,
}

impl HookRegistry {
    /// Creates a new empty hook registry.
    pub fn new(config: &HookConfig) -> Self {
        Self {
            hooks: DashMap::new(),
            owners: DashMap::new(),
            default_order: config.default_order,
        }
    }

    /// Registers an async callback for `name`.
    ///
    /// The callback receives the run parameters and the context by value
    /// and returns the (possibly mutated) context. Returns the callback id.
    pub fn register<F, Fut>(
        &self,
        name: &str,
        callback: F,
        options: HookOptions,
    ) -> Result<String, RegistryError>
    where
        F: Fn(Vec<Value>, HookContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<HookContext>> + Send + 'static,
    {
        self.register_handler(name, Arc::new(AsyncFnHandler(callback)), options)
    }

    /// Registers an async [`HookHandler`] implementation for `name`.
    pub fn register_handler(
        &self,
        name: &str,
        handler: Arc<dyn HookHandler>,
        options: HookOptions,
    ) -> Result<String, RegistryError> {
        self.insert(name, HookCallback::Async(handler), options)
    }

    /// Registers a synchronous callback for `name`. Returns the callback id.
    pub fn register_sync<F>(
        &self,
        name: &str,
        callback: F,
        options: HookOptions,
    ) -> Result<String, RegistryError>
    where
        F: Fn(&[Value], &mut HookContext) -> AppResult<()> + Send + Sync + 'static,
    {
        self.register_sync_handler(name, Arc::new(callback), options)
    }

    /// Registers a [`SyncHookHandler`] implementation for `name`.
    pub fn register_sync_handler(
        &self,
        name: &str,
        handler: Arc<dyn SyncHookHandler>,
        options: HookOptions,
    ) -> Result<String, RegistryError> {
        self.insert(name, HookCallback::Sync(handler), options)
    }

    fn insert(
        &self,
        name: &str,
        callback: HookCallback,
        options: HookOptions,
    ) -> Result<String, RegistryError> {
        let id = options.id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let order = options.order.unwrap_or(self.default_order);
        let mode = callback.mode();

        // An id moving to another hook leaves its old registration behind.
        if let Some(previous) = self.owner_of(&id).filter(|owner| owner != name) {
            if let Some(mut registry) = self.hooks.get_mut(&previous) {
                registry.unregister(&id);
            }
        }

        self.hooks
            .entry(name.to_string())
            .or_insert_with(|| Registry::new(name))
            .register_with_order(Some(&id), order, callback)?;
        self.owners.insert(id.clone(), name.to_string());

        info!(hook = %name, id = %id, order, mode = ?mode, "Hook callback registered");
        Ok(id)
    }

    /// Unregisters a callback by id from whichever hook owns it.
    ///
    /// Returns whether the id belonged to a hook.
    pub fn unregister(&self, id: &str) -> bool {
        let Some((_, name)) = self.owners.remove(id) else {
            debug!(id = %id, "Unregister of unknown hook callback ignored");
            return false;
        };

        if let Some(mut registry) = self.hooks.get_mut(&name) {
            registry.unregister(id);
        }

        info!(hook = %name, id = %id, "Hook callback unregistered");
        true
    }

    /// Clears every callback registered for `name`. The hook itself remains.
    pub fn flush(&self, name: &str) {
        if let Some(mut registry) = self.hooks.get_mut(name) {
            registry.restart();
        }
        self.owners.retain(|_, owner| owner.as_str() != name);
        info!(hook = %name, "Hook flushed");
    }

    /// Protects a callback id on `name` from replacement and unregistration.
    pub fn protect(&self, name: &str, id: &str) {
        self.hooks
            .entry(name.to_string())
            .or_insert_with(|| Registry::new(name))
            .protect(id);
    }

    /// Lifts protection from a callback id on `name`.
    pub fn unprotect(&self, name: &str, id: &str) {
        if let Some(mut registry) = self.hooks.get_mut(name) {
            registry.unprotect(id);
        }
    }

    /// Returns the effective callbacks for `name` in execution order.
    ///
    /// This is a snapshot; registrations made while the callbacks run do not
    /// affect it.
    pub fn callbacks(&self, name: &str) -> Vec<(String, HookCallback)> {
        self.hooks
            .get(name)
            .map(|registry| {
                registry
                    .list()
                    .into_iter()
                    .map(|item| (item.id.clone(), item.data.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Returns whether any callbacks are registered for `name`.
    pub fn has_callbacks(&self, name: &str) -> bool {
        self.hooks
            .get(name)
            .map(|registry| !registry.is_empty())
            .unwrap_or(false)
    }

    /// Returns the hook name owning a callback id.
    pub fn owner_of(&self, id: &str) -> Option<String> {
        self.owners.get(id).map(|owner| owner.value().clone())
    }

    /// Lists every known hook and its callbacks, sorted by hook name.
    pub fn list(&self) -> Vec<HookSummary> {
        let mut summaries: Vec<HookSummary> = self
            .hooks
            .iter()
            .map(|entry| HookSummary {
                name: entry.key().clone(),
                callbacks: entry
                    .value()
                    .list()
                    .into_iter()
                    .map(|item| CallbackInfo {
                        id: item.id.clone(),
                        order: item.order,
                        mode: item.data.mode(),
                    })
                    .collect(),
            })
            .collect();
        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        summaries
    }
}

impl Default for HookRegistry {
    fn default() -> Self {
        Self::new(&HookConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::definitions::HookMode;
    use plexus_core::Priority;

    fn noop(_: &[Value], _: &mut HookContext) -> AppResult<()> {
        Ok(())
    }

    #[test]
    fn test_register_returns_given_or_generated_id() {
        let hooks = HookRegistry::default();
        let given = hooks
            .register_sync("init", noop, HookOptions::new().id("mine"))
            .unwrap();
        let generated = hooks.register_sync("init", noop, HookOptions::new()).unwrap();

        assert_eq!(given, "mine");
        assert_ne!(generated, given);
        assert_eq!(hooks.callbacks("init").len(), 2);
        assert_eq!(hooks.owner_of(&generated).as_deref(), Some("init"));
    }

    #[test]
    fn test_default_order_is_neutral() {
        let hooks = HookRegistry::default();
        hooks
            .register_sync("init", noop, HookOptions::new().id("late").order(Priority::Low))
            .unwrap();
        hooks
            .register_sync("init", noop, HookOptions::new().id("neutral"))
            .unwrap();

        let list = hooks.list();
        assert_eq!(list.len(), 1);
        let orders: Vec<(&str, i32)> = list[0]
            .callbacks
            .iter()
            .map(|cb| (cb.id.as_str(), cb.order))
            .collect();
        assert_eq!(orders, vec![("neutral", 0), ("late", 500)]);
    }

    #[test]
    fn test_unregister_by_id() {
        let hooks = HookRegistry::default();
        let id = hooks.register_sync("a", noop, HookOptions::new()).unwrap();
        hooks.register_sync("b", noop, HookOptions::new()).unwrap();

        assert!(hooks.unregister(&id));
        assert!(!hooks.unregister(&id));
        assert!(!hooks.has_callbacks("a"));
        assert!(hooks.has_callbacks("b"));
    }

    #[test]
    fn test_flush_keeps_hook_name() {
        let hooks = HookRegistry::default();
        let id = hooks.register_sync("a", noop, HookOptions::new()).unwrap();
        hooks.register_sync("a", noop, HookOptions::new()).unwrap();
        hooks.flush("a");

        assert!(!hooks.has_callbacks("a"));
        assert_eq!(hooks.owner_of(&id), None);
        let list = hooks.list();
        assert_eq!(list[0].name, "a");
        assert!(list[0].callbacks.is_empty());

        hooks.register_sync("a", noop, HookOptions::new().id(id)).unwrap();
        assert!(hooks.has_callbacks("a"));
    }

    #[test]
    fn test_protected_callback_cannot_be_replaced() {
        let hooks = HookRegistry::default();
        hooks
            .register_sync("a", noop, HookOptions::new().id("locked"))
            .unwrap();
        hooks.protect("a", "locked");

        let err = hooks
            .register_sync("a", noop, HookOptions::new().id("locked"))
            .unwrap_err();
        assert!(matches!(err, RegistryError::Protected { .. }));

        hooks.unprotect("a", "locked");
        assert!(hooks.register_sync("a", noop, HookOptions::new().id("locked")).is_ok());
    }

    #[test]
    fn test_list_reports_modes() {
        let hooks = HookRegistry::default();
        hooks
            .register(
                "a",
                |_params, ctx| async move { Ok(ctx) },
                HookOptions::new().id("async").order(1),
            )
            .unwrap();
        hooks
            .register_sync("a", noop, HookOptions::new().id("sync").order(2))
            .unwrap();

        let modes: Vec<HookMode> = hooks.list()[0].callbacks.iter().map(|cb| cb.mode).collect();
        assert_eq!(modes, vec![HookMode::Async, HookMode::Sync]);
    }

    #[test]
    fn test_moving_id_to_another_hook() {
        let hooks = HookRegistry::default();
        hooks.register_sync("a", noop, HookOptions::new().id("x")).unwrap();
        hooks.register_sync("b", noop, HookOptions::new().id("x")).unwrap();

        assert!(!hooks.has_callbacks("a"));
        assert_eq!(hooks.owner_of("x").as_deref(), Some("b"));
    }
}
