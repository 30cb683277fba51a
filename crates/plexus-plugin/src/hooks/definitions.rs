//! Hook context, registration options, and listing types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use plexus_core::types::path::ObjectPath;

/// Shared mutable state threaded through every callback of one hook run.
///
/// Starts empty. Callbacks read what earlier callbacks wrote, addressing
/// nested fields with object paths.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HookContext(Map<String, Value>);

impl HookContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets the value at `path`.
    pub fn get(&self, path: impl Into<ObjectPath>) -> Option<&Value> {
        let path = path.into();
        let (first, rest) = path.segments().split_first()?;
        let root = self.0.get(&first.as_key())?;
        ObjectPath::from(rest.to_vec()).get(root)
    }

    /// Gets an i64 value.
    pub fn get_i64(&self, path: impl Into<ObjectPath>) -> Option<i64> {
        self.get(path).and_then(Value::as_i64)
    }

    /// Gets a string value.
    pub fn get_str(&self, path: impl Into<ObjectPath>) -> Option<&str> {
        self.get(path).and_then(Value::as_str)
    }

    /// Gets a bool value.
    pub fn get_bool(&self, path: impl Into<ObjectPath>) -> Option<bool> {
        self.get(path).and_then(Value::as_bool)
    }

    /// Writes `value` at `path`, creating intermediate objects.
    pub fn set(&mut self, path: impl Into<ObjectPath>, value: impl Into<Value>) -> &mut Self {
        let path = path.into();
        let Some((first, rest)) = path.segments().split_first() else {
            return self;
        };
        let root = self.0.entry(first.as_key()).or_insert(Value::Null);
        ObjectPath::from(rest.to_vec()).set(root, value.into());
        self
    }

    /// Removes and returns the value at `path`.
    pub fn remove(&mut self, path: impl Into<ObjectPath>) -> Option<Value> {
        let path = path.into();
        let (first, rest) = path.segments().split_first()?;
        if rest.is_empty() {
            return self.0.remove(&first.as_key());
        }
        let root = self.0.get_mut(&first.as_key())?;
        ObjectPath::from(rest.to_vec()).remove(root)
    }

    /// Whether a value exists at `path`.
    pub fn contains(&self, path: impl Into<ObjectPath>) -> bool {
        self.get(path).is_some()
    }

    /// Number of top-level fields.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the context holds nothing.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrows the underlying map.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Converts into a JSON object value.
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for HookContext {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// How a callback is invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookMode {
    /// Awaited by `run`; skipped by `run_sync`.
    Async,
    /// Called inline by both `run` and `run_sync`.
    Sync,
}

/// Optional settings for a hook registration.
#[derive(Debug, Clone, Default)]
pub struct HookOptions {
    /// Execution order; the configured default when `None`.
    pub order: Option<i32>,
    /// Callback id; a fresh uuid when `None`.
    pub id: Option<String>,
}

impl HookOptions {
    /// Creates default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the execution order.
    pub fn order(mut self, order: impl Into<i32>) -> Self {
        self.order = Some(order.into());
        self
    }

    /// Sets the callback id.
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Metadata for one registered callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackInfo {
    /// Callback id.
    pub id: String,
    /// Execution order.
    pub order: i32,
    /// Invocation mode.
    pub mode: HookMode,
}

/// A hook name and its effective callbacks in execution order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookSummary {
    /// Hook name.
    pub name: String,
    /// Callbacks in execution order.
    pub callbacks: Vec<CallbackInfo>,
}
