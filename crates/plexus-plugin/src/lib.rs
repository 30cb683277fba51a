//! # plexus-plugin
//!
//! Extension points for Plexus plugins. Provides:
//!
//! - A generic ordered registry with soft delete and overwrite protection
//! - Named hooks backed by one registry per hook name
//! - A dispatcher that runs a hook's callbacks sequentially, threading a
//!   shared context through them

pub mod hooks;
pub mod prelude;
pub mod registry;

pub use hooks::definitions::{HookContext, HookMode, HookOptions, HookSummary};
pub use hooks::dispatcher::HookDispatcher;
pub use hooks::registry::HookRegistry;
pub use registry::{DEFAULT_ORDER, Registry, RegistryError, RegistryItem};
