//! Generic ordered registry with soft delete and overwrite protection.
//!
//! Items are keyed by id. Registering an existing id replaces its payload
//! in place unless the id is protected. Unregistering only tombstones the
//! id: the stored item stays put and the effective [`Registry::list`] is
//! recomputed on every read. Tombstones are sticky for the lifetime of the
//! registry, so an id can be vetoed before its owner ever registers it.
//! [`Registry::restart`] is the only way to clear them.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use plexus_core::error::AppError;

/// Order given to items registered without one.
pub const DEFAULT_ORDER: i32 = 100;

/// Errors returned (never raised) by registry mutations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// The id is protected and already registered.
    #[error("{registry} unable to replace protected item {id}")]
    Protected {
        /// Registry name.
        registry: String,
        /// Offending id.
        id: String,
    },
}

impl From<RegistryError> for AppError {
    fn from(err: RegistryError) -> Self {
        AppError::conflict(err.to_string())
    }
}

/// One registered item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegistryItem<T> {
    /// Unique id.
    pub id: String,
    /// Sort key, ascending.
    pub order: i32,
    /// Arbitrary payload.
    pub data: T,
}

#[derive(Debug, Clone)]
struct Slot<T> {
    /// Registration sequence; breaks ties between equal orders.
    seq: u64,
    item: RegistryItem<T>,
}

/// An ordered, protectable, softly-deletable collection of id-keyed items.
#[derive(Debug, Clone)]
pub struct Registry<T> {
    name: String,
    items: HashMap<String, Slot<T>>,
    protected: BTreeSet<String>,
    unregistered: BTreeSet<String>,
    next_seq: u64,
}

impl<T> Registry<T> {
    /// Creates an empty registry. The name only appears in errors and logs.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            items: HashMap::new(),
            protected: BTreeSet::new(),
            unregistered: BTreeSet::new(),
            next_seq: 0,
        }
    }

    /// Returns the registry name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registers `data` under `id` with the default order.
    ///
    /// See [`Registry::register_with_order`].
    pub fn register(&mut self, id: Option<&str>, data: T) -> Result<&mut Self, RegistryError> {
        self.register_with_order(id, DEFAULT_ORDER, data)
    }

    /// Registers `data` under `id`, generating a fresh id when `None`.
    ///
    /// Re-registering an id replaces its order and payload but keeps its
    /// original registration position among equal orders. Fails without
    /// changing anything when the id is protected and already registered.
    pub fn register_with_order(
        &mut self,
        id: Option<&str>,
        order: i32,
        data: T,
    ) -> Result<&mut Self, RegistryError> {
        let id = id
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        if self.is_protected(&id) && self.is_registered(&id) {
            warn!(registry = %self.name, id = %id, "Refusing to replace protected item");
            return Err(RegistryError::Protected {
                registry: self.name.clone(),
                id,
            });
        }

        let item = RegistryItem {
            id: id.clone(),
            order,
            data,
        };

        match self.items.get_mut(&id) {
            Some(slot) => slot.item = item,
            None => {
                let seq = self.next_seq;
                self.next_seq += 1;
                self.items.insert(id.clone(), Slot { seq, item });
            }
        }

        debug!(registry = %self.name, id = %id, order, "Registry item registered");
        Ok(self)
    }

    /// Tombstones `id` unless it is protected. Unknown ids are fine.
    pub fn unregister(&mut self, id: &str) -> &mut Self {
        if self.is_protected(id) {
            debug!(registry = %self.name, id = %id, "Ignoring unregister of protected item");
            return self;
        }
        if self.unregistered.insert(id.to_string()) {
            debug!(registry = %self.name, id = %id, "Registry item unregistered");
        }
        self
    }

    /// Tombstones every id in `ids`. See [`Registry::unregister`].
    pub fn unregister_many<I, S>(&mut self, ids: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for id in ids {
            self.unregister(id.as_ref());
        }
        self
    }

    /// Prevents `id` from being replaced or unregistered.
    pub fn protect(&mut self, id: &str) -> &mut Self {
        self.protected.insert(id.to_string());
        self
    }

    /// Lifts protection from `id`.
    pub fn unprotect(&mut self, id: &str) -> &mut Self {
        self.protected.remove(id);
        self
    }

    /// Whether `id` has ever been registered, tombstoned or not.
    pub fn is_registered(&self, id: &str) -> bool {
        self.items.contains_key(id)
    }

    /// Whether `id` is protected.
    pub fn is_protected(&self, id: &str) -> bool {
        self.protected.contains(id)
    }

    /// Whether `id` has been tombstoned.
    pub fn is_unregistered(&self, id: &str) -> bool {
        self.unregistered.contains(id)
    }

    /// The effective list: live items sorted by ascending order, ties in
    /// registration order.
    pub fn list(&self) -> Vec<&RegistryItem<T>> {
        let mut live: Vec<&Slot<T>> = self
            .items
            .values()
            .filter(|slot| !self.unregistered.contains(&slot.item.id))
            .collect();
        live.sort_by_key(|slot| (slot.item.order, slot.seq));
        live.into_iter().map(|slot| &slot.item).collect()
    }

    /// Returns a live item by id.
    pub fn get(&self, id: &str) -> Option<&RegistryItem<T>> {
        if self.is_unregistered(id) {
            return None;
        }
        self.items.get(id).map(|slot| &slot.item)
    }

    /// Number of live items.
    pub fn len(&self) -> usize {
        self.items
            .keys()
            .filter(|id| !self.unregistered.contains(*id))
            .count()
    }

    /// Whether there are no live items.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Protected ids, sorted.
    pub fn protected(&self) -> impl Iterator<Item = &str> {
        self.protected.iter().map(String::as_str)
    }

    /// Every id ever registered, live or tombstoned, in registration order.
    pub fn registered(&self) -> Vec<&str> {
        let mut slots: Vec<&Slot<T>> = self.items.values().collect();
        slots.sort_by_key(|slot| slot.seq);
        slots.into_iter().map(|slot| slot.item.id.as_str()).collect()
    }

    /// Tombstoned ids, sorted.
    pub fn unregistered(&self) -> impl Iterator<Item = &str> {
        self.unregistered.iter().map(String::as_str)
    }

    /// Drops every item, tombstone, and protection.
    pub fn restart(&mut self) -> &mut Self {
        self.items.clear();
        self.protected.clear();
        self.unregistered.clear();
        debug!(registry = %self.name, "Registry restarted");
        self
    }
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self::new("Registry")
    }
}
