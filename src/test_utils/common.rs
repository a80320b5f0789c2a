use std::sync::Arc;

use tokio::sync::mpsc;

use super::LocalStatusBroker;
use crate::DispatchConfig;
use crate::DispatchEvent;
use crate::MemQueueFactory;
use crate::PriorizedDeliveryPlugin;
use crate::StatusClient;

pub struct TestContext {
    pub plugin: Arc<PriorizedDeliveryPlugin>,
    pub events_rx: mpsc::UnboundedReceiver<DispatchEvent>,
    pub broker: Arc<LocalStatusBroker>,
    pub status_client: Arc<StatusClient>,
}

pub fn test_config(rules: &str) -> DispatchConfig {
    let mut config = DispatchConfig::default();
    config.plugin.rules = Some(rules.to_string());
    config
}

/// Plugin with `rules`, a [`LocalStatusBroker`] and in-memory holdback queues
pub fn setup_plugin(rules: &str) -> TestContext {
    let config = test_config(rules);
    let broker = Arc::new(LocalStatusBroker::new());
    let status_client = Arc::new(StatusClient::new(broker.clone(), &config.status));
    let (plugin, events_rx) =
        PriorizedDeliveryPlugin::new(&config, status_client.clone(), Arc::new(MemQueueFactory))
            .expect("plugin setup");
    TestContext {
        plugin,
        events_rx,
        broker,
        status_client,
    }
}

/// Bandwidth rules: slow link holds back everything below priority 7
pub const BANDWIDTH_RULES: &str = r#"
<msgDispatch defaultStatus="64k" defaultAction="send">
  <onStatus oid="_bandwidth.status" content="64k" defaultAction="send">
    <action do="queue" ifPriority="0-6"/>
  </onStatus>
  <onStatus oid="_bandwidth.status" content="2M" defaultAction="send"/>
</msgDispatch>
"#;
