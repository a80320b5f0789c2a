use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;
use tracing::trace;

use super::DeliveryQueue;
use super::MsgQueueEntry;
use super::QueueFactory;
use super::QueueProperties;
use super::StorageId;
use crate::Priority;
use crate::QueueError;
use crate::Result;

pub const MEM_QUEUE_TYPE: &str = "RAM";
pub const MEM_QUEUE_VERSION: &str = "1.0";

type EntryKey = (Reverse<Priority>, u64);

/// Bounded in-memory queue ordered by priority (highest first), then by
/// unique id. A full queue rejects puts with [`QueueError::Overflow`] instead
/// of blocking.
#[derive(Debug)]
pub struct MemQueue {
    storage_id: StorageId,
    properties: QueueProperties,
    inner: Mutex<MemQueueState>,
}

#[derive(Debug, Default)]
struct MemQueueState {
    entries: BTreeMap<EntryKey, MsgQueueEntry>,
    destroyed: bool,
}

fn key_of(entry: &MsgQueueEntry) -> EntryKey {
    (Reverse(entry.priority()), entry.unique_id())
}

impl MemQueue {
    pub fn new(
        storage_id: StorageId,
        max_entries: usize,
    ) -> Self {
        Self::with_properties(
            storage_id,
            QueueProperties {
                queue_type: MEM_QUEUE_TYPE.to_string(),
                version: MEM_QUEUE_VERSION.to_string(),
                max_entries,
            },
        )
    }

    pub fn with_properties(
        storage_id: StorageId,
        properties: QueueProperties,
    ) -> Self {
        Self {
            storage_id,
            properties,
            inner: Mutex::new(MemQueueState::default()),
        }
    }

    /// Snapshot in delivery order
    pub fn entries(&self) -> Vec<MsgQueueEntry> {
        self.inner.lock().entries.values().cloned().collect()
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.lock().destroyed
    }

    fn check_alive(
        &self,
        state: &MemQueueState,
    ) -> Result<()> {
        if state.destroyed {
            return Err(QueueError::Destroyed(self.storage_id.to_string()).into());
        }
        Ok(())
    }
}

impl DeliveryQueue for MemQueue {
    fn storage_id(&self) -> StorageId {
        self.storage_id.clone()
    }

    fn properties(&self) -> QueueProperties {
        self.properties.clone()
    }

    fn peek_ready(&self) -> Result<Vec<MsgQueueEntry>> {
        let state = self.inner.lock();
        self.check_alive(&state)?;

        let Some(first) = state.entries.values().next() else {
            return Ok(Vec::new());
        };
        let priority = first.priority();
        Ok(state
            .entries
            .values()
            .take_while(|entry| entry.priority() == priority)
            .cloned()
            .collect())
    }

    fn remove_exact(
        &self,
        entry: &MsgQueueEntry,
    ) -> Result<bool> {
        let mut state = self.inner.lock();
        self.check_alive(&state)?;
        Ok(state.entries.remove(&key_of(entry)).is_some())
    }

    fn put(
        &self,
        entries: &[MsgQueueEntry],
        persistent: bool,
    ) -> Result<()> {
        let mut state = self.inner.lock();
        self.check_alive(&state)?;

        let max_entries = self.properties.max_entries;
        if max_entries > 0 {
            let added = entries
                .iter()
                .filter(|entry| !state.entries.contains_key(&key_of(entry)))
                .count();
            if state.entries.len() + added > max_entries {
                debug!(
                    "Queue '{}' refuses {} entries, holding {} of {}",
                    self.storage_id,
                    entries.len(),
                    state.entries.len(),
                    max_entries
                );
                return Err(QueueError::Overflow {
                    storage_id: self.storage_id.to_string(),
                    max_entries,
                }
                .into());
            }
        }

        for entry in entries {
            state.entries.insert(key_of(entry), entry.clone());
        }
        trace!(
            "Queue '{}' stored {} entries (persistent={}), size is now {}",
            self.storage_id,
            entries.len(),
            persistent,
            state.entries.len()
        );
        Ok(())
    }

    fn size(&self) -> usize {
        self.inner.lock().entries.len()
    }

    fn destroy(&self) -> Result<()> {
        let mut state = self.inner.lock();
        state.entries.clear();
        state.destroyed = true;
        debug!("Queue '{}' destroyed", self.storage_id);
        Ok(())
    }
}

/// Creates [`MemQueue`]s for every requested type
#[derive(Debug, Default)]
pub struct MemQueueFactory;

impl QueueFactory for MemQueueFactory {
    fn create_queue(
        &self,
        type_version: &str,
        storage_id: StorageId,
        properties: QueueProperties,
    ) -> Result<Arc<dyn DeliveryQueue>> {
        let (queue_type, version) = type_version
            .split_once(',')
            .map(|(t, v)| (t.trim(), v.trim()))
            .unwrap_or((type_version.trim(), ""));
        if queue_type.is_empty() {
            return Err(QueueError::UnknownPlugin(type_version.to_string()).into());
        }

        let properties = QueueProperties {
            queue_type: queue_type.to_string(),
            version: if version.is_empty() {
                properties.version
            } else {
                version.to_string()
            },
            max_entries: properties.max_entries,
        };
        Ok(Arc::new(MemQueue::with_properties(storage_id, properties)))
    }
}
