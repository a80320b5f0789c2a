use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::ConnectionState;
use crate::DeliveryQueue;
use crate::DispatchManager;
use crate::MemQueue;
use crate::MsgErrorInfo;
use crate::MsgQueueEntry;
use crate::StorageId;

/// Connection backed by a [`MemQueue`], records every callback
pub struct TestDispatchManager {
    id: String,
    queue: Arc<MemQueue>,
    state: Mutex<ConnectionState>,
    errors: Mutex<Vec<MsgErrorInfo>>,
    notified: AtomicUsize,
}

impl TestDispatchManager {
    pub fn new(
        id: &str,
        state: ConnectionState,
    ) -> Arc<Self> {
        Self::with_capacity(id, state, 0)
    }

    pub fn with_capacity(
        id: &str,
        state: ConnectionState,
        max_entries: usize,
    ) -> Arc<Self> {
        let storage_id = StorageId::new("node-1", "callback", id);
        Arc::new(Self {
            id: id.to_string(),
            queue: Arc::new(MemQueue::new(storage_id, max_entries)),
            state: Mutex::new(state),
            errors: Mutex::new(Vec::new()),
            notified: AtomicUsize::new(0),
        })
    }

    pub fn mem_queue(&self) -> &Arc<MemQueue> {
        &self.queue
    }

    /// Puts `entries` into the live queue
    pub fn enqueue(
        &self,
        entries: &[MsgQueueEntry],
    ) {
        self.queue.put(entries, false).expect("live queue put");
    }

    pub fn set_state(
        &self,
        state: ConnectionState,
    ) {
        *self.state.lock() = state;
    }

    /// Entries handed to the error handler so far
    pub fn dead_letters(&self) -> Vec<MsgQueueEntry> {
        self.errors
            .lock()
            .iter()
            .flat_map(|info| info.entries.clone())
            .collect()
    }

    pub fn error_count(&self) -> usize {
        self.errors.lock().len()
    }

    pub fn notify_count(&self) -> usize {
        self.notified.load(Ordering::Acquire)
    }
}

impl DispatchManager for TestDispatchManager {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn queue(&self) -> Arc<dyn DeliveryQueue> {
        self.queue.clone()
    }

    fn connection_state(&self) -> ConnectionState {
        *self.state.lock()
    }

    fn handle_error(
        &self,
        info: MsgErrorInfo,
    ) {
        self.errors.lock().push(info);
    }

    fn notify_about_new_entry(&self) {
        self.notified.fetch_add(1, Ordering::AcqRel);
    }
}
