//! Change notifications delivered to cache subscribers.

use std::fmt;
use std::sync::{Mutex, Weak};

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use plexus_core::ObjectPath;

use crate::memory::store::{lock, CacheState};

/// A change that may affect a subscribed path.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum CacheEvent {
    /// A value was written at `key`.
    Set {
        /// Path as given to `set`.
        key: ObjectPath,
        /// Value as given to `set`.
        value: Value,
    },
    /// The value at `key` was removed.
    Del {
        /// Path as given to `del`.
        key: ObjectPath,
    },
    /// Every entry was removed.
    Clear,
    /// Entries were bulk-imported.
    Merge {
        /// Root key to value for every entry actually written.
        obj: Map<String, Value>,
    },
    /// The timer armed for `key` fired and the value was removed.
    Expire {
        /// Path the timer was armed for.
        key: ObjectPath,
    },
}

impl CacheEvent {
    /// The operation name, as serialized in the `op` field.
    pub fn op(&self) -> &'static str {
        match self {
            Self::Set { .. } => "set",
            Self::Del { .. } => "del",
            Self::Clear => "clear",
            Self::Merge { .. } => "merge",
            Self::Expire { .. } => "expire",
        }
    }

    /// The path the event concerns. `None` for tree-wide events.
    pub fn key(&self) -> Option<&ObjectPath> {
        match self {
            Self::Set { key, .. } | Self::Del { key } | Self::Expire { key } => Some(key),
            Self::Clear | Self::Merge { .. } => None,
        }
    }
}

/// Handle for one subscription. Dropping it leaves the listener in place.
pub struct CacheSubscription {
    state: Weak<Mutex<CacheState>>,
    id: u64,
}

impl CacheSubscription {
    pub(crate) fn new(state: Weak<Mutex<CacheState>>, id: u64) -> Self {
        Self { state, id }
    }

    /// Opaque subscription id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Removes the listener. Returns whether it was still registered.
    pub fn unsubscribe(self) -> bool {
        let Some(state) = self.state.upgrade() else {
            return false;
        };
        let removed = lock(&state).remove_listener(self.id);
        debug!(subscription = self.id, removed, "Cache subscription released");
        removed
    }
}

impl fmt::Debug for CacheSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheSubscription")
            .field("id", &self.id)
            .finish()
    }
}
