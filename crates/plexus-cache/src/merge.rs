//! Entries and options for bulk cache imports.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;

use plexus_core::ObjectPath;

use crate::memory::store::ExpireCallback;

/// One value to merge into the cache under a root key.
#[derive(Clone)]
pub struct MergeEntry {
    /// Value to store.
    pub value: Value,
    /// Absolute expiry time. The entry never expires when `None`.
    pub expire: Option<DateTime<Utc>>,
    /// Called with the key and value when the entry expires on its timer.
    pub on_expire: Option<ExpireCallback>,
}

impl MergeEntry {
    /// Creates an entry that never expires.
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            expire: None,
            on_expire: None,
        }
    }

    /// Sets the absolute expiry time.
    pub fn expire_at(mut self, at: DateTime<Utc>) -> Self {
        self.expire = Some(at);
        self
    }

    /// Sets the expiry callback.
    pub fn on_expire<F>(mut self, callback: F) -> Self
    where
        F: Fn(&ObjectPath, &Value) + Send + Sync + 'static,
    {
        let callback: ExpireCallback = Arc::new(callback);
        self.on_expire = Some(callback);
        self
    }
}

impl From<Value> for MergeEntry {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}

impl fmt::Debug for MergeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MergeEntry")
            .field("value", &self.value)
            .field("expire", &self.expire)
            .field("on_expire", &self.on_expire.is_some())
            .finish()
    }
}

/// Options for [`MemoryCache::merge`](crate::MemoryCache::merge).
#[derive(Debug, Clone, Copy, Default)]
pub struct MergeOptions {
    /// Keep existing entries instead of overwriting them.
    pub skip_duplicates: bool,
}

impl MergeOptions {
    /// Options that keep existing entries on collision.
    pub fn skip_duplicates() -> Self {
        Self {
            skip_duplicates: true,
        }
    }
}
