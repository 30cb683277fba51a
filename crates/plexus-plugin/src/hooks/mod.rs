//! Hook system: registry, dispatcher, callbacks and context.

pub mod definitions;
pub mod dispatcher;
pub mod handler;
pub mod registry;

pub use definitions::{CallbackInfo, HookContext, HookMode, HookOptions, HookSummary};
pub use dispatcher::HookDispatcher;
pub use handler::{HookCallback, HookHandler, SyncHookHandler};
pub use registry::HookRegistry;
