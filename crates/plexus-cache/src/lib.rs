//! # plexus-cache
//!
//! In-process cache for Plexus. Values live in a single JSON tree whose
//! top-level members are the root keys; every operation addresses the tree
//! with an [`ObjectPath`](plexus_core::ObjectPath).
//!
//! - **expiry**: one cancellable timer per root key, run on the tokio runtime
//! - **subscriptions**: listeners scoped to a path, told about every change
//!   that may touch it
//! - **merge**: bulk import of entries carrying absolute expiry times

pub mod events;
pub mod memory;
pub mod merge;

pub use events::{CacheEvent, CacheSubscription};
pub use memory::store::{Deletion, ExpireCallback, MemoryCache};
pub use merge::{MergeEntry, MergeOptions};
