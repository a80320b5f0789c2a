//! Queue seam
//!
//! The dispatch engine never owns storage. It drives the live delivery queue
//! of each connection and the holdback queues it creates through
//! [`DeliveryQueue`], and gets new holdback queues from a [`QueueFactory`].

mod mem_queue;
pub use mem_queue::*;


use std::fmt;
use std::sync::Arc;

#[cfg(test)]
use mockall::automock;

use crate::Priority;
use crate::Result;

/// One message waiting for delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MsgQueueEntry {
    unique_id: u64,
    priority: Priority,
    key_oid: String,
    sender: String,
    internal: bool,
    persistent: bool,
}

impl MsgQueueEntry {
    pub fn new(
        unique_id: u64,
        priority: Priority,
        key_oid: impl Into<String>,
        sender: impl Into<String>,
    ) -> Self {
        Self {
            unique_id,
            priority,
            key_oid: key_oid.into(),
            sender: sender.into(),
            internal: false,
            persistent: false,
        }
    }

    /// Broker internal traffic, e.g. `__sys__` topics
    pub fn with_internal(
        mut self,
        internal: bool,
    ) -> Self {
        self.internal = internal;
        self
    }

    pub fn with_persistent(
        mut self,
        persistent: bool,
    ) -> Self {
        self.persistent = persistent;
        self
    }

    pub fn unique_id(&self) -> u64 {
        self.unique_id
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn key_oid(&self) -> &str {
        &self.key_oid
    }

    /// Login name of the publisher
    pub fn sender(&self) -> &str {
        &self.sender
    }

    pub fn is_internal(&self) -> bool {
        self.internal
    }

    pub fn is_persistent(&self) -> bool {
        self.persistent
    }

    pub fn log_id(&self) -> String {
        format!("{}/{}", self.key_oid, self.unique_id)
    }
}

/// Identity of a queue in the storage subsystem
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageId {
    pub node: String,
    pub relating: String,
    pub postfix: String,
}

impl StorageId {
    pub fn new(
        node: impl Into<String>,
        relating: impl Into<String>,
        postfix: impl Into<String>,
    ) -> Self {
        Self {
            node: node.into(),
            relating: relating.into(),
            postfix: postfix.into(),
        }
    }

    /// Same node and postfix, different owner
    pub fn with_relating(
        &self,
        relating: impl Into<String>,
    ) -> Self {
        Self {
            node: self.node.clone(),
            relating: relating.into(),
            postfix: self.postfix.clone(),
        }
    }
}

impl fmt::Display for StorageId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}:{}/{}", self.relating, self.node, self.postfix)
    }
}

/// Settings a holdback queue inherits from its live queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueProperties {
    pub queue_type: String,
    pub version: String,
    /// 0 is unbounded
    pub max_entries: usize,
}

impl QueueProperties {
    pub fn type_version(&self) -> String {
        format!("{},{}", self.queue_type, self.version)
    }
}

/// Delivery queue operations the dispatch engine depends on.
///
/// Implementations bring their own synchronisation. `put` may block to apply
/// backpressure.
#[cfg_attr(test, automock)]
pub trait DeliveryQueue: Send + Sync {
    fn storage_id(&self) -> StorageId;

    fn properties(&self) -> QueueProperties;

    /// Next batch in delivery order, all entries sharing the highest priority
    /// currently stored. Does not remove anything.
    fn peek_ready(&self) -> Result<Vec<MsgQueueEntry>>;

    /// Removes exactly this entry, `false` if it was not stored
    fn remove_exact(
        &self,
        entry: &MsgQueueEntry,
    ) -> Result<bool>;

    fn put(
        &self,
        entries: &[MsgQueueEntry],
        persistent: bool,
    ) -> Result<()>;

    fn size(&self) -> usize;

    fn destroy(&self) -> Result<()>;

    /// Removes everything that is left, returns the number of removed entries
    fn clear(&self) -> Result<usize> {
        let mut removed = 0;
        loop {
            let batch = self.peek_ready()?;
            if batch.is_empty() {
                return Ok(removed);
            }
            let mut progress = 0;
            for entry in &batch {
                if self.remove_exact(entry)? {
                    progress += 1;
                }
            }
            if progress == 0 {
                return Ok(removed);
            }
            removed += progress;
        }
    }
}

#[cfg_attr(test, automock)]
pub trait QueueFactory: Send + Sync {
    /// `type_version` is `"<type>,<version>"`
    fn create_queue(
        &self,
        type_version: &str,
        storage_id: StorageId,
        properties: QueueProperties,
    ) -> Result<Arc<dyn DeliveryQueue>>;
}
