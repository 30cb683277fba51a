//! Cache configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// In-memory cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// TTL in milliseconds applied by `set_default`.
    #[serde(default = "default_ttl")]
    pub default_ttl_ms: u64,
}

impl CacheConfig {
    /// The default TTL as a [`Duration`].
    pub fn default_ttl(&self) -> Duration {
        Duration::from_millis(self.default_ttl_ms)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_ms: default_ttl(),
        }
    }
}

fn default_ttl() -> u64 {
    300_000
}
