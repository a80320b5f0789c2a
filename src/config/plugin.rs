use std::path::PathBuf;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::specific_config_property_key;
use crate::constants::PLUGIN_TYPE;
use crate::constants::PLUGIN_VERSION;
use crate::Error;
use crate::Result;

/// Identity of the dispatch plugin and its initial rules
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PluginConfig {
    /// Plugin type, part of the specific property key
    /// Default: "Priority"
    #[serde(default = "default_plugin_type")]
    pub plugin_type: String,

    /// Default: "1.0"
    #[serde(default = "default_plugin_version")]
    pub version: String,

    /// Inline rule document applied at startup
    #[serde(default)]
    pub rules: Option<String>,

    /// File holding the rule document applied at startup
    #[serde(default)]
    pub rules_path: Option<PathBuf>,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            plugin_type: default_plugin_type(),
            version: default_plugin_version(),
            rules: None,
            rules_path: None,
        }
    }
}

impl PluginConfig {
    pub fn validate(&self) -> Result<()> {
        if self.plugin_type.trim().is_empty() || self.version.trim().is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "plugin_type and version must not be empty".into(),
            )));
        }

        if self.rules.is_some() && self.rules_path.is_some() {
            return Err(Error::Config(ConfigError::Message(
                "Configure either plugin.rules or plugin.rules_path, not both".into(),
            )));
        }

        if let Some(path) = &self.rules_path {
            if !path.is_file() {
                return Err(Error::Config(ConfigError::Message(format!(
                    "Rule document {} does not exist",
                    path.display()
                ))));
            }
        }
        Ok(())
    }

    /// `"<type>,<version>"`
    pub fn type_version(&self) -> String {
        format!("{},{}", self.plugin_type, self.version)
    }

    /// Property key that overrides the generic one once seen
    pub fn specific_config_key(&self) -> String {
        specific_config_property_key(&self.plugin_type, &self.version)
    }

    /// Startup rule document, `None` if none is configured
    pub fn load_rules(&self) -> Result<Option<String>> {
        if let Some(rules) = &self.rules {
            return Ok(Some(rules.clone()));
        }
        match &self.rules_path {
            Some(path) => std::fs::read_to_string(path).map(Some).map_err(|e| {
                Error::Config(ConfigError::Message(format!(
                    "Failed to read rule document {}: {}",
                    path.display(),
                    e
                )))
            }),
            None => Ok(None),
        }
    }
}

fn default_plugin_type() -> String {
    PLUGIN_TYPE.to_string()
}
fn default_plugin_version() -> String {
    PLUGIN_VERSION.to_string()
}
