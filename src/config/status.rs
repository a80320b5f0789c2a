use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::DEFAULT_CALLBACK_SECRET;
use crate::constants::DEFAULT_LOGIN_NAME;
use crate::constants::DEFAULT_MAX_SESSIONS;
use crate::Error;
use crate::Result;

/// Session used to subscribe to status messages and to notify senders
#[derive(Serialize, Deserialize, Clone)]
pub struct StatusClientConfig {
    /// Login name of the status session, also the sender of notifications
    /// Default: "_PriorizedDispatchPlugin"
    #[serde(default = "default_login_name")]
    pub login_name: String,

    /// Secret expected on every status callback
    #[serde(default = "default_callback_secret")]
    pub callback_secret: String,

    /// Listeners allowed to hold status subscriptions at once
    /// Default: 10
    #[serde(default = "default_max_sessions")]
    pub max_sessions: u32,
}

impl std::fmt::Debug for StatusClientConfig {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("StatusClientConfig")
            .field("login_name", &self.login_name)
            .field("max_sessions", &self.max_sessions)
            .finish_non_exhaustive()
    }
}

impl Default for StatusClientConfig {
    fn default() -> Self {
        Self {
            login_name: default_login_name(),
            callback_secret: default_callback_secret(),
            max_sessions: default_max_sessions(),
        }
    }
}

impl StatusClientConfig {
    pub fn validate(&self) -> Result<()> {
        if self.login_name.trim().is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "status.login_name must not be empty".into(),
            )));
        }
        if self.max_sessions == 0 {
            return Err(Error::Config(ConfigError::Message(
                "status.max_sessions must be greater than 0".into(),
            )));
        }
        Ok(())
    }
}

fn default_login_name() -> String {
    DEFAULT_LOGIN_NAME.to_string()
}
fn default_callback_secret() -> String {
    DEFAULT_CALLBACK_SECRET.to_string()
}
fn default_max_sessions() -> u32 {
    DEFAULT_MAX_SESSIONS
}
