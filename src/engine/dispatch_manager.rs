use std::fmt;
use std::sync::Arc;

#[cfg(test)]
use mockall::automock;

use crate::ConnectionState;
use crate::DeliveryQueue;
use crate::Error;
use crate::MsgQueueEntry;

/// Messages the engine could not place, handed to the manager's error handler
#[derive(Debug)]
pub struct MsgErrorInfo {
    pub manager_id: String,
    pub entries: Vec<MsgQueueEntry>,
    pub error: Error,
}

impl MsgErrorInfo {
    pub fn new(
        manager_id: impl Into<String>,
        entries: Vec<MsgQueueEntry>,
        error: Error,
    ) -> Self {
        Self {
            manager_id: manager_id.into(),
            entries,
            error,
        }
    }
}

impl fmt::Display for MsgErrorInfo {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(
            f,
            "{} entries of '{}' failed: {}",
            self.entries.len(),
            self.manager_id,
            self.error
        )
    }
}

/// One outbound connection: its live queue, its transport state and its
/// error handler.
///
/// Callbacks are invoked after the engine lock is released, so an
/// implementation may call back into the engine.
#[cfg_attr(test, automock)]
pub trait DispatchManager: Send + Sync {
    fn id(&self) -> String;

    /// The live delivery queue
    fn queue(&self) -> Arc<dyn DeliveryQueue>;

    fn connection_state(&self) -> ConnectionState;

    /// Final disposition of entries, e.g. dead lettering
    fn handle_error(
        &self,
        info: MsgErrorInfo,
    );

    /// Wakes the delivery worker, the live queue has new entries
    fn notify_about_new_entry(&self);
}
