//! Hook callback traits and closure adapters.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use plexus_core::result::AppResult;

use super::definitions::{HookContext, HookMode};

/// An asynchronous hook callback.
///
/// Receives the parameters given to `run` followed by the shared context.
#[async_trait]
pub trait HookHandler: Send + Sync {
    /// Handles one hook invocation.
    async fn handle(&self, params: &[Value], context: &mut HookContext) -> AppResult<()>;
}

/// A synchronous hook callback.
pub trait SyncHookHandler: Send + Sync {
    /// Handles one hook invocation.
    fn handle(&self, params: &[Value], context: &mut HookContext) -> AppResult<()>;
}

impl<F> SyncHookHandler for F
where
    F: Fn(&[Value], &mut HookContext) -> AppResult<()> + Send + Sync,
{
    fn handle(&self, params: &[Value], context: &mut HookContext) -> AppResult<()> {
        (self)(params, context)
    }
}

/// Adapts an async closure that takes the context by value and hands it back.
pub(crate) struct AsyncFnHandler<F>(pub(crate) F);

#[async_trait]
impl<F, Fut> HookHandler for AsyncFnHandler<F>
where
    F: Fn(Vec<Value>, HookContext) -> Fut + Send + Sync,
    Fut: Future<Output = AppResult<HookContext>> + Send + 'static,
{
    async fn handle(&self, params: &[Value], context: &mut HookContext) -> AppResult<()> {
        let owned = std::mem::take(context);
        *context = (self.0)(params.to_vec(), owned).await?;
        Ok(())
    }
}

/// A registered callback of either mode.
#[derive(Clone)]
pub enum HookCallback {
    /// Awaited by `run`.
    Async(Arc<dyn HookHandler>),
    /// Called inline.
    Sync(Arc<dyn SyncHookHandler>),
}

impl HookCallback {
    /// Returns the invocation mode.
    pub fn mode(&self) -> HookMode {
        match self {
            Self::Async(_) => HookMode::Async,
            Self::Sync(_) => HookMode::Sync,
        }
    }
}

impl fmt::Debug for HookCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("HookCallback").field(&self.mode()).finish()
    }
}
