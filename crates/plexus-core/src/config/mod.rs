//! Runtime configuration.
//!
//! One sub-module per section. Every field has a serde default, so a missing
//! file or section falls back to the values the runtime ships with.

pub mod cache;
pub mod hooks;
pub mod logging;
pub mod pulse;

use serde::{Deserialize, Serialize};

pub use self::cache::CacheConfig;
pub use self::hooks::HookConfig;
pub use self::logging::{LogFormat, LoggingConfig};
pub use self::pulse::PulseConfig;

use crate::error::AppError;

/// Settings for every primitive owned by a runtime.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Hook dispatcher settings.
    #[serde(default)]
    pub hooks: HookConfig,
    /// In-memory cache settings.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Pulse scheduler defaults.
    #[serde(default)]
    pub pulse: PulseConfig,
}

impl RuntimeConfig {
    /// Loads `config/default`, then `config/{env}`, then `PLEXUS__*`
    /// environment variables, later sources winning.
    pub fn load(env: &str) -> Result<Self, AppError> {
        Self::load_from("config", env)
    }

    /// Same as [`RuntimeConfig::load`] with a custom directory.
    pub fn load_from(dir: &str, env: &str) -> Result<Self, AppError> {
        tracing::debug!(dir, env, "Loading configuration");
        let config = config::Config::builder()
            .add_source(config::File::with_name(&format!("{dir}/default")).required(false))
            .add_source(config::File::with_name(&format!("{dir}/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("PLEXUS")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }
}
