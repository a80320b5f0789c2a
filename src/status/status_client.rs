use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::SenderNotification;
use super::StatusBroker;
use super::StatusUpdate;
use super::UpdateReturn;
use super::UpdateState;
use crate::DispatchEvent;
use crate::MsgQueueEntry;
use crate::Result;
use crate::StatusChannelError;
use crate::StatusClientConfig;

pub type StatusEventSender = mpsc::UnboundedSender<DispatchEvent>;

/// Status topic subscriptions shared by all dispatch plugins of a process.
///
/// Keeps two indexes: the broker subscriptions owned by each listener, used
/// to unsubscribe on reconfiguration, and the listeners of each topic, used
/// to route inbound status messages.
pub struct StatusClient {
    broker: Arc<dyn StatusBroker>,
    login_name: String,
    callback_secret: String,
    max_sessions: usize,

    /// listener id -> broker subscription ids
    subscriptions_by_listener: DashMap<String, Vec<String>>,

    /// status oid -> (listener id -> event channel)
    oid_listeners: DashMap<String, HashMap<String, StatusEventSender>>,

    shut_down: AtomicBool,
}

impl std::fmt::Debug for StatusClient {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("StatusClient")
            .field("login_name", &self.login_name)
            .field("subscriptions_by_listener", &self.subscriptions_by_listener)
            .field("oids", &self.subscribed_oids())
            .finish_non_exhaustive()
    }
}

impl StatusClient {
    pub fn new(
        broker: Arc<dyn StatusBroker>,
        config: &StatusClientConfig,
    ) -> Self {
        info!("Status client '{}' ready to subscribe to status messages", config.login_name);
        Self {
            broker,
            login_name: config.login_name.clone(),
            callback_secret: config.callback_secret.clone(),
            max_sessions: config.max_sessions as usize,
            subscriptions_by_listener: DashMap::new(),
            oid_listeners: DashMap::new(),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Our identity on the broker, notifications are sent with this sender
    pub fn login_name(&self) -> &str {
        &self.login_name
    }

    /// Subscribes `listener_id` to status topic `oid`.
    ///
    /// A second call for the same listener and topic is a no-op. At most
    /// `max_sessions` listeners hold subscriptions at the same time.
    pub fn subscribe_to_status_message(
        &self,
        oid: &str,
        listener_id: &str,
        sender: StatusEventSender,
    ) -> Result<()> {
        if self.shut_down.load(Ordering::Acquire) {
            return Err(StatusChannelError::Disconnected.into());
        }

        let already = self
            .oid_listeners
            .get(oid)
            .map(|listeners| listeners.contains_key(listener_id))
            .unwrap_or(false);
        if already {
            debug!("Listener '{}' has subscribed to '{}' already", listener_id, oid);
            return Ok(());
        }

        let new_listener = !self.subscriptions_by_listener.contains_key(listener_id);
        if new_listener && self.subscriptions_by_listener.len() >= self.max_sessions {
            warn!(
                "Listener '{}' refused, {} of {} status sessions in use",
                listener_id,
                self.subscriptions_by_listener.len(),
                self.max_sessions
            );
            return Err(StatusChannelError::SessionLimit {
                listener_id: listener_id.to_string(),
                max_sessions: self.max_sessions,
            }
            .into());
        }

        let subscription_id = self.broker.subscribe(oid)?;
        debug!(
            "Listener '{}' subscribed to status message '{}' as '{}'",
            listener_id, oid, subscription_id
        );

        self.subscriptions_by_listener
            .entry(listener_id.to_string())
            .or_default()
            .push(subscription_id);
        self.oid_listeners
            .entry(oid.to_string())
            .or_default()
            .insert(listener_id.to_string(), sender);
        Ok(())
    }

    /// Drops every status subscription of `listener_id`. Broker failures are
    /// logged, the local bookkeeping is always cleaned up.
    pub fn unsubscribe_status_messages(
        &self,
        listener_id: &str,
    ) {
        for mut listeners in self.oid_listeners.iter_mut() {
            listeners.remove(listener_id);
        }
        self.oid_listeners.retain(|_, listeners| !listeners.is_empty());

        let subscriptions = self
            .subscriptions_by_listener
            .remove(listener_id)
            .map(|(_, subscriptions)| subscriptions)
            .unwrap_or_default();

        for subscription_id in subscriptions {
            if let Err(e) = self.broker.unsubscribe(&subscription_id) {
                warn!("Unsubscribe of '{}' failed: {}", subscription_id, e);
            }
        }
    }

    /// Callback for inbound status messages
    pub fn update(
        &self,
        update: StatusUpdate,
    ) -> UpdateReturn {
        if update.cb_session_id != self.callback_secret {
            warn!(
                "The given cbSessionId={} is unknown, we don't trust this callback of a status message with oid={}",
                update.cb_session_id, update.oid
            );
            return UpdateReturn::AccessDenied;
        }

        if update.internal || update.state == UpdateState::Erased {
            return UpdateReturn::Ok;
        }

        let content = update.content_str();
        if let UpdateState::Other(state) = &update.state {
            warn!(
                "Receiving unexpected asynchronous status message '{}' state={} with content='{}'",
                update.oid, state, content
            );
            return UpdateReturn::Ok;
        }

        info!("Receiving asynchronous status message '{}' with content='{}'", update.oid, content);

        match self.oid_listeners.get(&update.oid) {
            Some(listeners) => {
                for (listener_id, sender) in listeners.iter() {
                    if sender
                        .send(DispatchEvent::StatusChanged(Some(content.clone())))
                        .is_err()
                    {
                        warn!("Status listener '{}' is gone, dropping '{}'", listener_id, content);
                    }
                }
            }
            None => {
                warn!(
                    "Receiving asynchronous status message '{}' with content='{}' but nobody is interested in it",
                    update.oid, content
                );
            }
        }
        UpdateReturn::Ok
    }

    /// Tells the publisher of `entry` what happened to it. The notification
    /// reuses the message topic and carries our login name as sender.
    pub fn send_ptp_message(
        &self,
        entry: &MsgQueueEntry,
        plugin_name: &str,
        action: &str,
        current_status: Option<&str>,
    ) -> Result<()> {
        let status = current_status.unwrap_or("null");
        debug!(
            "Sending PtP notification about special message treatment in plugin, dispatcher state={} receiver '{}' ...",
            status,
            entry.sender()
        );
        let notification = SenderNotification {
            key_oid: entry.key_oid().to_string(),
            receiver: entry.sender().to_string(),
            sender: self.login_name.clone(),
            state: action.to_string(),
            state_info: format!(
                "Notification about special message treatment in plugin {plugin_name}, dispatcher state={status}"
            ),
            subscribable: false,
        };
        self.broker.publish(notification)
    }

    /// Unsubscribes `listener_id`; the broker session is closed when the last
    /// listener is gone.
    pub fn shutdown_listener(
        &self,
        listener_id: &str,
    ) {
        self.unsubscribe_status_messages(listener_id);
        if self.subscriptions_by_listener.is_empty() && self.oid_listeners.is_empty() {
            self.shutdown();
        }
    }

    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        self.subscriptions_by_listener.clear();
        self.oid_listeners.clear();
        self.broker.disconnect();
        info!("Status client '{}' stopped, resources released", self.login_name);
    }

    pub fn is_shutdown(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Topics with at least one listener, sorted
    pub fn subscribed_oids(&self) -> Vec<String> {
        let mut oids: Vec<String> = self.oid_listeners.iter().map(|e| e.key().clone()).collect();
        oids.sort();
        oids
    }

    pub fn subscription_count(
        &self,
        listener_id: &str,
    ) -> usize {
        self.subscriptions_by_listener
            .get(listener_id)
            .map(|subscriptions| subscriptions.len())
            .unwrap_or(0)
    }
}
