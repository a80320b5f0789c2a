use std::time::Duration;

use prio_dispatch::constants::CONFIG_PROPERTY_KEY;
use prio_dispatch::DeliveryQueue;
use prio_dispatch::DispatchEvent;
use prio_dispatch::PropertyChangeEvent;
use prio_dispatch::StatusUpdate;
use prio_dispatch::UpdateReturn;
use tokio::sync::watch;

use crate::common::harness;
use crate::common::msg;
use crate::common::Connection;
use crate::common::BANDWIDTH_OID;
use crate::common::BANDWIDTH_RULES;

async fn wait_until(mut ready: impl FnMut() -> bool) {
    for _ in 0..400 {
        if ready() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn status_messages_and_reloads_flow_through_the_event_loop() {
    let h = harness(BANDWIDTH_RULES);
    let conn = Connection::new("client-joe-1");
    h.plugin.add_dispatch_manager(conn.clone()).unwrap();
    conn.publish(&[msg(1, 2)]);
    assert!(conn.deliver_all(&h.plugin).is_empty());

    let (shutdown_tx, shutdown_rx) = watch::channel(());
    let handle = tokio::spawn(h.plugin.clone().run(h.events_rx, shutdown_rx));

    let secret = h.config.status.callback_secret.clone();
    assert_eq!(
        h.status_client.update(StatusUpdate::new(secret.clone(), BANDWIDTH_OID, "2M")),
        UpdateReturn::Ok
    );
    wait_until(|| h.plugin.current_status().as_deref() == Some("2M")).await;
    assert_eq!(h.plugin.holdback_size("client-joe-1"), Some(0));
    assert_eq!(conn.queue.size(), 1);

    assert_eq!(
        h.status_client.update(StatusUpdate::new("forged", BANDWIDTH_OID, "64k")),
        UpdateReturn::AccessDenied
    );

    h.plugin
        .event_sender()
        .send(DispatchEvent::PropertyChanged(PropertyChangeEvent::new(
            CONFIG_PROPERTY_KEY,
            r#"<msgDispatch defaultAction="destroy"/>"#,
        )))
        .unwrap();
    wait_until(|| h.broker.oids().is_empty()).await;
    assert!(h.broker.oids().is_empty());
    assert!(conn.deliver_all(&h.plugin).is_empty());
    assert_eq!(conn.queue.size(), 0);

    shutdown_tx.send(()).unwrap();
    handle.await.unwrap();
    assert!(h.plugin.is_shutdown());
}
