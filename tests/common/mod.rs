use std::collections::HashMap;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use parking_lot::Mutex;
use prio_dispatch::ConnectionState;
use prio_dispatch::DeliveryQueue;
use prio_dispatch::DispatchConfig;
use prio_dispatch::DispatchEvent;
use prio_dispatch::DispatchManager;
use prio_dispatch::MemQueue;
use prio_dispatch::MemQueueFactory;
use prio_dispatch::MsgErrorInfo;
use prio_dispatch::MsgQueueEntry;
use prio_dispatch::PriorizedDeliveryPlugin;
use prio_dispatch::Priority;
use prio_dispatch::Result;
use prio_dispatch::SenderNotification;
use prio_dispatch::StatusBroker;
use prio_dispatch::StatusClient;
use prio_dispatch::StorageId;
use tokio::sync::mpsc;

pub const BANDWIDTH_OID: &str = "_bandwidth.status";

pub const BANDWIDTH_RULES: &str = r#"
<msgDispatch defaultStatus="64k" defaultAction="send">
  <onStatus oid="_bandwidth.status" content="64k" defaultAction="send">
    <action do="queue" ifPriority="0-6"/>
  </onStatus>
  <onStatus oid="_bandwidth.status" content="2M" defaultAction="send"/>
  <onStatus connectionState="polling" defaultAction="queue">
    <action do="destroy|notifySender" ifPriority="0"/>
  </onStatus>
</msgDispatch>
"#;

/// Broker that keeps subscriptions by id and records notifications
#[derive(Default)]
pub struct RecordingBroker {
    next_id: AtomicUsize,
    subscriptions: Mutex<HashMap<String, String>>,
    pub published: Mutex<Vec<SenderNotification>>,
}

impl RecordingBroker {
    pub fn oids(&self) -> Vec<String> {
        let mut oids: Vec<String> = self.subscriptions.lock().values().cloned().collect();
        oids.sort();
        oids
    }
}

impl StatusBroker for RecordingBroker {
    fn subscribe(
        &self,
        oid: &str,
    ) -> Result<String> {
        let id = format!("sub-{}", self.next_id.fetch_add(1, Ordering::AcqRel));
        self.subscriptions.lock().insert(id.clone(), oid.to_string());
        Ok(id)
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
    }
}

/// Callback connection with an in-memory live queue
pub struct Connection {
    pub id: String,
    pub queue: Arc<MemQueue>,
    pub dead_letters: Mutex<Vec<MsgQueueEntry>>,
    pub wakeups: AtomicUsize,
}

impl Connection {
    pub fn new(id: &str) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            queue: Arc::new(MemQueue::new(StorageId::new("node-1", "callback", id), 0)),
            dead_letters: Mutex::new(Vec::new()),
            wakeups: AtomicUsize::new(0),
        })
    }

    pub fn publish(
        &self,
        entries: &[MsgQueueEntry],
    ) {
        self.queue.put(entries, false).unwrap();
    }

    /// Worker loop step: decide on the ready batch and remove what was sent
    pub fn deliver(
        &self,
        plugin: &PriorizedDeliveryPlugin,
    ) -> Vec<u64> {
        let sent = plugin.handle_next_messages(&self.id).unwrap();
        for entry in &sent {
            self.queue.remove_exact(entry).unwrap();
        }
        sent.iter().map(|e| e.unique_id()).collect()
    }

    /// Delivers until the live queue is drained
    pub fn deliver_all(
        &self,
        plugin: &PriorizedDeliveryPlugin,
    ) -> Vec<u64> {
        let mut delivered = Vec::new();
        while self.queue.size() > 0 {
            delivered.extend(self.deliver(plugin));
        }
        delivered
    }
}

impl DispatchManager for Connection {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn queue(&self) -> Arc<dyn DeliveryQueue> {
        self.queue.clone()
    }

    fn connection_state(&self) -> ConnectionState {
        ConnectionState::Alive
    }

    fn handle_error(
        &self,
        info: MsgErrorInfo,
    ) {
        self.dead_letters.lock().extend(info.entries);
    }

    fn notify_about_new_entry(&self) {
        self.wakeups.fetch_add(1, Ordering::AcqRel);
    }
}

pub struct Harness {
    pub plugin: Arc<PriorizedDeliveryPlugin>,
    pub events_rx: mpsc::UnboundedReceiver<DispatchEvent>,
    pub broker: Arc<RecordingBroker>,
    pub status_client: Arc<StatusClient>,
    pub config: DispatchConfig,
}

pub fn harness(rules: &str) -> Harness {
    let mut config = DispatchConfig::default();
    config.plugin.rules = Some(rules.to_string());
    let config = config.validate().unwrap();

    let broker = Arc::new(RecordingBroker::default());
    let status_client = Arc::new(StatusClient::new(broker.clone(), &config.status));
    let (plugin, events_rx) =
        PriorizedDeliveryPlugin::new(&config, status_client.clone(), Arc::new(MemQueueFactory)).unwrap();
    Harness {
        plugin,
        events_rx,
        broker,
        status_client,
        config,
    }
}

pub fn msg(
    id: u64,
    priority: u8,
) -> MsgQueueEntry {
    MsgQueueEntry::new(id, Priority::new(priority).unwrap(), "radar.track", "publisher-1")
}
