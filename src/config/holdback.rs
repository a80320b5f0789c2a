use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::HOLDBACK_STORAGE_PREFIX;
use crate::Error;
use crate::Result;

/// Per-connection holdback queues
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HoldbackConfig {
    /// `"type,version"` of the holdback queue plugin.
    /// Default: inherit type and version of the live queue
    #[serde(default)]
    pub queue_plugin: Option<String>,

    /// Relating part of holdback storage ids
    /// Default: "PriorizedDispatchPlugin"
    #[serde(default = "default_storage_prefix")]
    pub storage_prefix: String,
}

impl Default for HoldbackConfig {
    fn default() -> Self {
        Self {
            queue_plugin: None,
            storage_prefix: default_storage_prefix(),
        }
    }
}

impl HoldbackConfig {
    pub fn validate(&self) -> Result<()> {
        if self.storage_prefix.trim().is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "holdback.storage_prefix must not be empty".into(),
            )));
        }
        if let Some(plugin) = &self.queue_plugin {
            let valid = plugin
                .split_once(',')
                .map(|(t, v)| !t.trim().is_empty() && !v.trim().is_empty())
                .unwrap_or(false);
            if !valid {
                return Err(Error::Config(ConfigError::Message(format!(
                    "holdback.queue_plugin '{plugin}' must look like 'type,version'"
                ))));
            }
        }
        Ok(())
    }
}

fn default_storage_prefix() -> String {
    HOLDBACK_STORAGE_PREFIX.to_string()
}
