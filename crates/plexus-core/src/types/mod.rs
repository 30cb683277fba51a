//! Shared primitive types used across Plexus crates.

pub mod path;
pub mod priority;

pub use path::{ObjectPath, Segment};
pub use priority::Priority;
