//! Hook dispatcher configuration.

use serde::{Deserialize, Serialize};

use crate::types::priority::Priority;

/// Settings applied by the hook registry and dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookConfig {
    /// Order assigned to callbacks registered without an explicit order.
    #[serde(default = "default_order")]
    pub default_order: i32,
    /// A callback running longer than this (milliseconds) is reported with a warning.
    #[serde(default = "default_slow_callback_warn")]
    pub slow_callback_warn_ms: u64,
}

impl Default for HookConfig {
    fn default() -> Self {
        Self {
            default_order: default_order(),
            slow_callback_warn_ms: default_slow_callback_warn(),
        }
    }
}

fn default_order() -> i32 {
    Priority::Neutral.value()
}

fn default_slow_callback_warn() -> u64 {
    1000
}
