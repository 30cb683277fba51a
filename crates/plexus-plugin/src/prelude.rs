//! Prelude for convenient imports.

pub use async_trait::async_trait;

pub use plexus_core::{AppError, AppResult, ObjectPath, Priority};

pub use crate::hooks::definitions::{HookContext, HookMode, HookOptions};
pub use crate::hooks::dispatcher::HookDispatcher;
pub use crate::hooks::handler::{HookHandler, SyncHookHandler};
pub use crate::hooks::registry::HookRegistry;
pub use crate::registry::{Registry, RegistryError};
