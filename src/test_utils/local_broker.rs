use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use nanoid::nanoid;
use parking_lot::Mutex;

use crate::Result;
use crate::SenderNotification;
use crate::StatusBroker;
use crate::StatusChannelError;

/// In-process broker recording subscriptions and published notifications
#[derive(Default)]
pub struct LocalStatusBroker {
    /// subscription id -> oid
    subscriptions: Mutex<HashMap<String, String>>,
    published: Mutex<Vec<SenderNotification>>,
    refused_oids: Mutex<HashSet<String>>,
    disconnected: AtomicBool,
}

impl LocalStatusBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscriptions to `oid` fail from now on
    pub fn refuse(
        &self,
        oid: &str,
    ) {
        self.refused_oids.lock().insert(oid.to_string());
    }

    /// Active subscriptions, sorted by oid
    pub fn subscribed_oids(&self) -> Vec<String> {
        let mut oids: Vec<String> = self.subscriptions.lock().values().cloned().collect();
        oids.sort();
        oids
    }

    pub fn published(&self) -> Vec<SenderNotification> {
        self.published.lock().clone()
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::Acquire)
    }
}

impl StatusBroker for LocalStatusBroker {
    fn subscribe(
        &self,
        oid: &str,
    ) -> Result<String> {
        if self.refused_oids.lock().contains(oid) {
            return Err(StatusChannelError::SubscribeFailed {
                oid: oid.to_string(),
                reason: "refused by test broker".to_string(),
            }
            .into());
        }
        let subscription_id = format!("__subId:{}", nanoid!());
        self.subscriptions
            .lock()
            .insert(subscription_id.clone(), oid.to_string());
        Ok(subscription_id)
    }

    fn unsubscribe(
        &self,
        subscription_id: &str,
    ) -> Result<()> {
        self.subscriptions.lock().remove(subscription_id);
        Ok(())
    }

    fn publish(
        &self,
        notification: SenderNotification,
    ) -> Result<()> {
        self.published.lock().push(notification);
        Ok(())
    }

    fn disconnect(&self) {
        self.subscriptions.lock().clear();
        self.disconnected.store(true, Ordering::Release);
    }
}
