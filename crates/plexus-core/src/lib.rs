//! # plexus-core
//!
//! Core crate for the Plexus extensibility runtime. Contains the
//! configuration schema, the object-path addressing utility shared by
//! every path-addressed store, execution priorities, and the unified
//! error system.
//!
//! This crate has **no** internal dependencies on other Plexus crates.

pub mod config;
pub mod error;
pub mod result;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
pub use types::path::{ObjectPath, Segment};
pub use types::priority::Priority;
