//! In-memory cache store with per-key expiry timers.
//!
//! The tree is an object keyed by root key. Each root key holds at most one
//! expiry timer; any write to the root key or one of its sub-paths cancels
//! the pending timer before (optionally) arming a new one. Timers are tokio
//! tasks tagged with a generation so a timer that loses a race with its own
//! cancellation never fires.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chrono::Utc;
use serde_json::{Map, Value};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use plexus_core::config::CacheConfig;
use plexus_core::{ObjectPath, Segment};

use crate::events::{CacheEvent, CacheSubscription};
use crate::merge::{MergeEntry, MergeOptions};

/// Called with the key and value of an entry when its timer fires.
pub type ExpireCallback = Arc<dyn Fn(&ObjectPath, &Value) + Send + Sync>;

type Listener = Arc<dyn Fn(&CacheEvent) + Send + Sync>;

/// Result of [`MemoryCache::del`].
#[derive(Debug, Clone, PartialEq)]
pub enum Deletion {
    /// A root key was deleted; whether it existed.
    Root(bool),
    /// A sub-path was deleted; what remains under its root key.
    Nested(Option<Value>),
}

struct Timer {
    generation: u64,
    key: ObjectPath,
    value: Value,
    on_expire: Option<ExpireCallback>,
    handle: Option<JoinHandle<()>>,
}

impl Timer {
    fn cancel(self) {
        if let Some(handle) = self.handle {
            handle.abort();
        }
    }
}

#[derive(Default)]
pub(crate) struct CacheState {
    tree: Map<String, Value>,
    timers: HashMap<String, Timer>,
    listeners: BTreeMap<u64, (ObjectPath, Listener)>,
    next_listener: u64,
    next_generation: u64,
}

impl CacheState {
    fn remove_path(&mut self, key: &ObjectPath) -> Option<Value> {
        let (first, rest) = key.segments().split_first()?;
        let root = first.as_key();
        if rest.is_empty() {
            return self.tree.remove(&root);
        }
        let slot = self.tree.get_mut(&root)?;
        ObjectPath::from(rest.to_vec()).remove(slot)
    }

    fn cancel_timer(&mut self, root: &str) {
        if let Some(timer) = self.timers.remove(root) {
            timer.cancel();
        }
    }

    fn listeners_for(&self, key: &ObjectPath) -> Vec<Listener> {
        self.listeners
            .values()
            .filter(|(path, _)| path.overlaps(key))
            .map(|(_, listener)| listener.clone())
            .collect()
    }

    fn all_listeners(&self) -> Vec<Listener> {
        self.listeners
            .values()
            .map(|(_, listener)| listener.clone())
            .collect()
    }

    pub(crate) fn remove_listener(&mut self, id: u64) -> bool {
        self.listeners.remove(&id).is_some()
    }
}

pub(crate) fn lock(state: &Mutex<CacheState>) -> MutexGuard<'_, CacheState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn notify(listeners: &[Listener], event: &CacheEvent) {
    for listener in listeners {
        listener(event);
    }
}

fn count_nodes(value: &Value) -> usize {
    1 + match value {
        Value::Object(map) => map.values().map(count_nodes).sum(),
        Value::Array(items) => items.iter().map(count_nodes).sum(),
        _ => 0,
    }
}

/// Object-path addressed in-memory cache.
///
/// Cloning is cheap; clones share the same tree, timers and subscribers.
/// Listeners and expiry callbacks are always invoked after the internal lock
/// is released, so they may call back into the cache.
#[derive(Clone)]
pub struct MemoryCache {
    inner: Arc<Mutex<CacheState>>,
    default_ttl: Duration,
}

impl MemoryCache {
    /// Creates an empty cache.
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(CacheState::default())),
            default_ttl: config.default_ttl(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        lock(&self.inner)
    }

    /// Writes `value` at `key` without expiry. Returns the value now stored
    /// under the root key.
    pub fn set(&self, key: impl Into<ObjectPath>, value: impl Into<Value>) -> Value {
        self.store(key.into(), value.into(), None, None)
    }

    /// Writes `value` at `key` and removes it again after `timeout`.
    pub fn set_with_timeout(
        &self,
        key: impl Into<ObjectPath>,
        value: impl Into<Value>,
        timeout: Duration,
    ) -> Value {
        self.store(key.into(), value.into(), Some(timeout), None)
    }

    /// Like [`MemoryCache::set_with_timeout`], calling `on_expire(key, value)`
    /// when the timer fires.
    pub fn set_with_callback<F>(
        &self,
        key: impl Into<ObjectPath>,
        value: impl Into<Value>,
        timeout: Duration,
        on_expire: F,
    ) -> Value
    where
        F: Fn(&ObjectPath, &Value) + Send + Sync + 'static,
    {
        let on_expire: ExpireCallback = Arc::new(on_expire);
        self.store(key.into(), value.into(), Some(timeout), Some(on_expire))
    }

    /// Writes `value` at `key` with the configured default TTL.
    pub fn set_default(&self, key: impl Into<ObjectPath>, value: impl Into<Value>) -> Value {
        self.store(key.into(), value.into(), Some(self.default_ttl), None)
    }

    fn store(
        &self,
        key: ObjectPath,
        value: Value,
        timeout: Option<Duration>,
        on_expire: Option<ExpireCallback>,
    ) -> Value {
        let Some(root) = key.root_key() else {
            warn!("Ignoring cache write to the empty key");
            return Value::Null;
        };

        let (stored, listeners) = {
            let mut state = self.lock();
            state.cancel_timer(&root);

            let slot = state.tree.entry(root.clone()).or_insert(Value::Null);
            key.tail().set(slot, value.clone());
            let stored = slot.clone();

            if let Some(timeout) = timeout {
                self.arm(&mut state, root, key.clone(), value.clone(), timeout, on_expire);
            }
            (stored, state.listeners_for(&key))
        };

        debug!(key = %key, expires = timeout.is_some(), "Cache entry set");
        notify(&listeners, &CacheEvent::Set { key, value });
        stored
    }

    fn arm(
        &self,
        state: &mut CacheState,
        root: String,
        key: ObjectPath,
        value: Value,
        timeout: Duration,
        on_expire: Option<ExpireCallback>,
    ) {
        let generation = state.next_generation;
        state.next_generation += 1;

        let handle = match Handle::try_current() {
            Ok(runtime) => {
                let cache = Arc::downgrade(&self.inner);
                let timer_root = root.clone();
                Some(runtime.spawn(async move {
                    tokio::time::sleep(timeout).await;
                    expire(cache, timer_root, generation);
                }))
            }
            Err(_) => {
                warn!(key = %key, "No tokio runtime available; cache entry will not expire");
                None
            }
        };

        state.timers.insert(
            root,
            Timer {
                generation,
                key,
                value,
                on_expire,
                handle,
            },
        );
    }

    /// Reads the value at `key`. The empty key returns the whole tree.
    pub fn get(&self, key: impl Into<ObjectPath>) -> Option<Value> {
        let key = key.into();
        let state = self.lock();
        let Some((first, rest)) = key.segments().split_first() else {
            return Some(Value::Object(state.tree.clone()));
        };
        let root = state.tree.get(&first.as_key())?;
        ObjectPath::from(rest.to_vec()).get(root).cloned()
    }

    /// Reads the value at `key`, falling back to `default`.
    pub fn get_or(&self, key: impl Into<ObjectPath>, default: impl Into<Value>) -> Value {
        self.get(key).unwrap_or_else(|| default.into())
    }

    /// Returns a copy of the whole tree.
    pub fn snapshot(&self) -> Value {
        Value::Object(self.lock().tree.clone())
    }

    /// Whether a value exists at `key`.
    pub fn contains(&self, key: impl Into<ObjectPath>) -> bool {
        self.get(key).is_some()
    }

    /// Removes the value at `key`.
    ///
    /// Deleting a root key cancels its timer. Deleting a sub-path cancels the
    /// root's timer only when the timer was armed at or below that sub-path.
    pub fn del(&self, key: impl Into<ObjectPath>) -> Deletion {
        let key = key.into();
        let Some(root) = key.root_key() else {
            return Deletion::Root(false);
        };

        let (deletion, listeners) = {
            let mut state = self.lock();
            let removed = state.remove_path(&key).is_some();

            let covers_timer = state
                .timers
                .get(&root)
                .is_some_and(|timer| timer.key.starts_with(&key));
            if covers_timer {
                state.cancel_timer(&root);
            }

            let deletion = if key.len() == 1 {
                Deletion::Root(removed)
            } else {
                Deletion::Nested(state.tree.get(&root).cloned())
            };
            let listeners = if removed {
                state.listeners_for(&key)
            } else {
                Vec::new()
            };
            (deletion, listeners)
        };

        debug!(key = %key, notified = listeners.len(), "Cache entry deleted");
        notify(&listeners, &CacheEvent::Del { key });
        deletion
    }

    /// Removes every entry and cancels every timer. Expiry callbacks do not run.
    pub fn clear(&self) {
        let listeners = {
            let mut state = self.lock();
            for (_, timer) in state.timers.drain() {
                timer.cancel();
            }
            state.tree.clear();
            state.all_listeners()
        };

        debug!("Cache cleared");
        notify(&listeners, &CacheEvent::Clear);
    }

    /// Merges root-level entries into the cache. Returns the resulting size.
    ///
    /// Colliding keys are overwritten unless `options.skip_duplicates` is set.
    /// An entry whose expiry has already passed removes any existing value
    /// under its key without running either expiry callback.
    pub fn merge<I, K>(&self, values: I, options: MergeOptions) -> usize
    where
        I: IntoIterator<Item = (K, MergeEntry)>,
        K: Into<String>,
    {
        let now = Utc::now();

        let (size, merged, listeners) = {
            let mut state = self.lock();
            let mut merged = Map::new();

            for (key, entry) in values {
                let key = key.into();
                if options.skip_duplicates && state.tree.contains_key(&key) {
                    continue;
                }

                state.cancel_timer(&key);
                let timeout = match entry.expire {
                    Some(at) if at <= now => {
                        state.tree.remove(&key);
                        debug!(key = %key, "Merged cache entry already expired");
                        continue;
                    }
                    Some(at) => (at - now).to_std().ok(),
                    None => None,
                };

                state.tree.insert(key.clone(), entry.value.clone());
                if let Some(timeout) = timeout {
                    let path = ObjectPath::from(vec![Segment::Key(key.clone())]);
                    self.arm(
                        &mut state,
                        key.clone(),
                        path,
                        entry.value.clone(),
                        timeout,
                        entry.on_expire,
                    );
                }
                merged.insert(key, entry.value);
            }

            (state.tree.len(), merged, state.all_listeners())
        };

        debug!(merged = merged.len(), size, "Cache merged");
        notify(&listeners, &CacheEvent::Merge { obj: merged });
        size
    }

    /// Merges plain values without expiry. See [`MemoryCache::merge`].
    pub fn merge_values(&self, values: Map<String, Value>, options: MergeOptions) -> usize {
        self.merge(
            values.into_iter().map(|(key, value)| (key, MergeEntry::from(value))),
            options,
        )
    }

    /// Root keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        self.lock().tree.keys().cloned().collect()
    }

    /// Number of root keys.
    pub fn size(&self) -> usize {
        self.lock().tree.len()
    }

    /// Number of stored nodes at every depth of every root key.
    pub fn memsize(&self) -> usize {
        self.lock().tree.values().map(count_nodes).sum()
    }

    /// Calls `callback` for every operation that may affect `key`: writes,
    /// deletions and expiries on `key`, its ancestors or its descendants, and
    /// every clear and merge. The empty key observes everything.
    pub fn subscribe<F>(&self, key: impl Into<ObjectPath>, callback: F) -> CacheSubscription
    where
        F: Fn(&CacheEvent) + Send + Sync + 'static,
    {
        let key = key.into();
        let mut state = self.lock();
        let id = state.next_listener;
        state.next_listener += 1;
        debug!(key = %key, subscription = id, "Cache subscription added");
        let listener: Listener = Arc::new(callback);
        state.listeners.insert(id, (key, listener));
        CacheSubscription::new(Arc::downgrade(&self.inner), id)
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}

impl fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("MemoryCache")
            .field("size", &state.tree.len())
            .field("timers", &state.timers.len())
            .field("subscribers", &state.listeners.len())
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}

fn expire(cache: Weak<Mutex<CacheState>>, root: String, generation: u64) {
    let Some(inner) = cache.upgrade() else {
        return;
    };

    let (timer, listeners) = {
        let mut state = lock(&inner);
        let current = state.timers.get(&root).map(|timer| timer.generation);
        if current != Some(generation) {
            return;
        }
        let Some(timer) = state.timers.remove(&root) else {
            return;
        };
        state.remove_path(&timer.key);
        let listeners = state.listeners_for(&timer.key);
        (timer, listeners)
    };

    debug!(key = %timer.key, "Cache entry expired");
    if let Some(on_expire) = &timer.on_expire {
        on_expire(&timer.key, &timer.value);
    }
    notify(&listeners, &CacheEvent::Expire { key: timer.key });
}
