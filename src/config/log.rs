use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use crate::Error;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LogConfig {
    /// Directory of `dispatch.log`, stderr if unset
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// `EnvFilter` directive used when `RUST_LOG` is not set
    /// Default: "info"
    #[serde(default = "default_filter")]
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_dir: None,
            filter: default_filter(),
        }
    }
}

impl LogConfig {
    pub fn validate(&self) -> Result<()> {
        EnvFilter::try_new(&self.filter).map_err(|e| {
            Error::Config(config::ConfigError::Message(format!(
                "log.filter '{}' is invalid: {}",
                self.filter, e
            )))
        })?;
        Ok(())
    }
}

fn default_filter() -> String {
    "info".to_string()
}
