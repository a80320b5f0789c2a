use crate::MsgQueueEntry;
use crate::Priority;

/// Hands out queue entries with ascending unique ids
pub struct MsgEntryBuilder {
    next_id: u64,
    key_oid: String,
    sender: String,
}

impl MsgEntryBuilder {
    pub fn new(
        start_id: u64,
        key_oid: &str,
        sender: &str,
    ) -> Self {
        Self {
            next_id: start_id,
            key_oid: key_oid.to_string(),
            sender: sender.to_string(),
        }
    }

    pub fn priority(
        mut self,
        priority: u8,
    ) -> (Self, MsgQueueEntry) {
        let entry = MsgQueueEntry::new(self.next_id, prio(priority), self.key_oid.as_str(), self.sender.as_str());
        self.next_id += 1;
        (self, entry)
    }

    pub fn batch(
        mut self,
        priorities: &[u8],
    ) -> (Self, Vec<MsgQueueEntry>) {
        let mut entries = Vec::with_capacity(priorities.len());
        for priority in priorities {
            let (builder, entry) = self.priority(*priority);
            self = builder;
            entries.push(entry);
        }
        (self, entries)
    }
}

pub fn prio(value: u8) -> Priority {
    Priority::new(value).expect("priority out of range")
}
