//! Dispatch Control Plane Error Hierarchy
//!
//! Errors are split by the layer that raises them: rule documents and rule
//! insertion ([`RuleError`]), the external queue seam ([`QueueError`]) and the
//! status pub/sub seam ([`StatusChannelError`]). Expected misses, such as a
//! status content without a matching rule, are not errors and are reported
//! through typed results instead.

use config::ConfigError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Settings loading or validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Broken dispatch rules, never partially applied
    #[error(transparent)]
    Rule(#[from] RuleError),

    /// Live or holdback queue operation failures
    #[error(transparent)]
    Queue(#[from] QueueError),

    /// Status subscription or sender notification failures
    #[error(transparent)]
    Status(#[from] StatusChannelError),

    #[error("Dispatch manager '{0}' is not registered")]
    UnknownManager(String),

    #[error("Dispatch plugin is shut down")]
    Shutdown,

    /// Unrecoverable failures requiring process termination
    #[error("Fatal error: {0}")]
    Fatal(String),
}

/// Configuration errors of the declarative rule language.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleError {
    #[error("Dispatch action is empty")]
    EmptyAction,

    #[error("Unknown dispatch action token '{token}' in '{input}'")]
    UnknownActionToken { token: String, input: String },

    /// More than one of send, queue and destroy
    #[error("Dispatch action '{input}' combines exclusive dispositions")]
    ConflictingActions { input: String },

    #[error("Invalid priority range '{range}'")]
    InvalidPriorityRange { range: String },

    #[error("Priority {0} is outside of 0-9")]
    InvalidPriority(i64),

    #[error("Unknown connection state '{0}'")]
    InvalidConnectionState(String),

    #[error("Connection state {state} can't send, action '{action}' is not allowed")]
    SendOnInactiveConnection { state: String, action: String },

    #[error("<onStatus> needs an 'oid' or a 'connectionState' attribute")]
    MissingStatusIdentity,

    #[error("<onStatus oid='{oid}'> needs a 'content' or a 'connectionState' attribute")]
    MissingStatusContent { oid: String },

    #[error("Rule document has no <msgDispatch> root element")]
    MissingRoot,

    #[error("Unexpected element <{0}> in rule document")]
    UnexpectedElement(String),

    #[error("Malformed rule document: {0}")]
    Xml(String),
}

impl From<quick_xml::Error> for RuleError {
    fn from(e: quick_xml::Error) -> Self {
        RuleError::Xml(e.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for RuleError {
    fn from(e: quick_xml::events::attributes::AttrError) -> Self {
        RuleError::Xml(e.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    /// Bounded queue refused the put
    #[error("Queue '{storage_id}' overflow, max entries {max_entries} reached")]
    Overflow { storage_id: String, max_entries: usize },

    #[error("Queue '{0}' is destroyed")]
    Destroyed(String),

    #[error("No queue plugin available for '{0}'")]
    UnknownPlugin(String),

    #[error("Queue '{storage_id}' failure: {reason}")]
    Backend { storage_id: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StatusChannelError {
    #[error("Subscribe to status topic '{oid}' failed: {reason}")]
    SubscribeFailed { oid: String, reason: String },

    #[error("Unsubscribe of '{subscription_id}' failed: {reason}")]
    UnsubscribeFailed { subscription_id: String, reason: String },

    #[error("Sender notification to '{receiver}' failed: {reason}")]
    PublishFailed { receiver: String, reason: String },

    #[error("Listener '{listener_id}' exceeds the limit of {max_sessions} status sessions")]
    SessionLimit { listener_id: String, max_sessions: usize },

    #[error("Status broker is disconnected")]
    Disconnected,
}
