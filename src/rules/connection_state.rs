use std::fmt;
use std::str::FromStr;

use crate::RuleError;

/// Health of the outbound transport of one dispatch manager.
///
/// Transitions are driven by the connection state machine outside of this
/// crate; the dispatch engine only records them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    #[default]
    Undef,
    Alive,
    Polling,
    Dead,
}

impl ConnectionState {
    /// Undefined and alive connections may carry a send action
    pub fn can_send(self) -> bool {
        matches!(self, ConnectionState::Undef | ConnectionState::Alive)
    }

    /// Spelling used in the `connectionState` attribute
    pub fn as_rule_str(self) -> &'static str {
        match self {
            ConnectionState::Undef => "undef",
            ConnectionState::Alive => "alive",
            ConnectionState::Polling => "polling",
            ConnectionState::Dead => "dead",
        }
    }
}

impl FromStr for ConnectionState {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "undef" => Ok(ConnectionState::Undef),
            "alive" => Ok(ConnectionState::Alive),
            "polling" => Ok(ConnectionState::Polling),
            "dead" => Ok(ConnectionState::Dead),
            _ => Err(RuleError::InvalidConnectionState(s.to_string())),
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let s = match self {
            ConnectionState::Undef => "UNDEF",
            ConnectionState::Alive => "ALIVE",
            ConnectionState::Polling => "POLLING",
            ConnectionState::Dead => "DEAD",
        };
        f.write_str(s)
    }
}
