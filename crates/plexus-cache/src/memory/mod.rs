//! In-memory cache store.

pub mod store;
