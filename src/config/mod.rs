//! Settings of the dispatch plugin.
//!
//! Sources are merged in this order, later ones win:
//! 1. Defaults from code
//! 2. File named by `CONFIG_PATH`
//! 3. Environment variables with the `DISPATCH__` prefix
mod holdback;
mod log;
mod plugin;
mod status;

pub use holdback::*;
pub use log::*;
pub use plugin::*;
pub use status::*;


use std::env;
use std::fmt::Debug;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Result;

pub(crate) const ENV_PREFIX: &str = "DISPATCH";

#[derive(Serialize, Deserialize, Clone, Default)]
pub struct DispatchConfig {
    /// Plugin identity and startup rules
    #[serde(default)]
    pub plugin: PluginConfig,
    /// Status message session
    #[serde(default)]
    pub status: StatusClientConfig,
    /// Holdback queue creation
    #[serde(default)]
    pub holdback: HoldbackConfig,
    #[serde(default)]
    pub log: LogConfig,
}

impl Debug for DispatchConfig {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("DispatchConfig")
            .field("plugin", &self.plugin.type_version())
            .field("status", &self.status)
            .field("holdback", &self.holdback)
            .finish()
    }
}

impl DispatchConfig {
    /// Loads defaults, the `CONFIG_PATH` file and `DISPATCH__` variables.
    ///
    /// Does not validate, call [`DispatchConfig::validate`] once all
    /// overrides are applied.
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var("CONFIG_PATH") {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .ignore_empty(true)
                .try_parsing(true),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Merges `path` over the current values, environment variables still win.
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .ignore_empty(true)
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    pub fn validate(self) -> Result<Self> {
        self.plugin.validate()?;
        self.status.validate()?;
        self.holdback.validate()?;
        self.log.validate()?;
        Ok(self)
    }
}
