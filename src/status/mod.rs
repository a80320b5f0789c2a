//! Status channel
//!
//! Status messages (e.g. a bandwidth indicator published on
//! `_bandwidth.status`) arrive from the broker's pub/sub layer and are
//! forwarded as [`DispatchEvent::StatusChanged`] to every listener interested
//! in the topic. The same channel publishes point-to-point notifications back
//! to the senders of reclassified messages.
//!
//! [`DispatchEvent::StatusChanged`]: crate::DispatchEvent::StatusChanged

mod status_client;
pub use status_client::*;


#[cfg(test)]
use mockall::automock;

use crate::Result;

/// Point-to-point notification about a message the dispatcher did not send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderNotification {
    /// Topic of the reclassified message, reused for the notification
    pub key_oid: String,
    /// Original sender of the message
    pub receiver: String,
    /// Our own login name, lets the engine recognise its own traffic
    pub sender: String,
    /// Action token taken, e.g. `queue|notifySender`
    pub state: String,
    pub state_info: String,
    pub subscribable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateState {
    Ok,
    Erased,
    Other(String),
}

/// Inbound status message as delivered by the broker callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub cb_session_id: String,
    pub oid: String,
    pub content: Vec<u8>,
    pub state: UpdateState,
    pub internal: bool,
}

impl StatusUpdate {
    pub fn new(
        cb_session_id: impl Into<String>,
        oid: impl Into<String>,
        content: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            cb_session_id: cb_session_id.into(),
            oid: oid.into(),
            content: content.into(),
            state: UpdateState::Ok,
            internal: false,
        }
    }

    pub fn content_str(&self) -> String {
        String::from_utf8_lossy(&self.content).into_owned()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateReturn {
    Ok,
    /// Unknown callback session id
    AccessDenied,
}

/// The broker's pub/sub client used for status topics and notifications
#[cfg_attr(test, automock)]
pub trait StatusBroker: Send + Sync {
    /// Returns the subscription id
    fn subscribe(
        &self,
        oid: &str,
    ) -> Result<String>;

    fn unsubscribe(
        &self,
        subscription_id: &str,
    ) -> Result<()>;

    fn publish(
        &self,
        notification: SenderNotification,
    ) -> Result<()>;

    /// Drops the broker session, subscriptions end with it
    fn disconnect(&self);
}
