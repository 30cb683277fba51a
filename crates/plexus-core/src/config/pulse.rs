//! Pulse scheduler configuration.

use serde::{Deserialize, Serialize};

/// Defaults applied to tasks registered without explicit options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PulseConfig {
    /// Delay in milliseconds between runs.
    #[serde(default = "default_delay")]
    pub delay_ms: u64,
    /// Failed attempts allowed before a task fails. `-1` retries forever.
    #[serde(default = "default_unbounded")]
    pub attempts: i64,
    /// Successful runs before a task completes. `-1` never completes.
    #[serde(default = "default_unbounded")]
    pub repeat: i64,
    /// Whether tasks start as soon as they are registered.
    #[serde(default = "default_true")]
    pub autostart: bool,
}

impl Default for PulseConfig {
    fn default() -> Self {
        Self {
            delay_ms: default_delay(),
            attempts: default_unbounded(),
            repeat: default_unbounded(),
            autostart: default_true(),
        }
    }
}

fn default_delay() -> u64 {
    1000
}

fn default_unbounded() -> i64 {
    -1
}

fn default_true() -> bool {
    true
}
