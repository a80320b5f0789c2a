use prio_dispatch::ConnectionState;
use prio_dispatch::DeliveryQueue;

use crate::common::harness;
use crate::common::msg;
use crate::common::Connection;
use crate::common::BANDWIDTH_RULES;

#[test]
fn polling_connection_queues_and_drops_lowest_priority() {
    let h = harness(BANDWIDTH_RULES);
    let conn = Connection::new("client-joe-1");
    h.plugin.add_dispatch_manager(conn.clone()).unwrap();
    h.plugin.on_status_changed(Some("2M".to_string()));

    h.plugin.to_polling("client-joe-1").unwrap();
    assert_eq!(h.plugin.connection_state("client-joe-1"), Some(ConnectionState::Polling));

    conn.publish(&[msg(1, 4), msg(2, 0)]);
    assert!(conn.deliver_all(&h.plugin).is_empty());
    assert_eq!(h.plugin.holdback_size("client-joe-1"), Some(1));

    let published = h.broker.published.lock().clone();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].receiver, "publisher-1");
    assert_eq!(published[0].state, "destroy|notifySender");
    assert!(published[0].state_info.contains("dispatcher state=2M"));

    h.plugin.to_alive("client-joe-1").unwrap();
    assert_eq!(h.plugin.holdback_size("client-joe-1"), Some(0));
    assert_eq!(conn.deliver_all(&h.plugin), vec![1]);
}

#[test]
fn dead_connection_sends_nothing_and_recovers() {
    let h = harness(BANDWIDTH_RULES);
    let conn = Connection::new("client-joe-1");
    h.plugin.add_dispatch_manager(conn.clone()).unwrap();
    h.plugin.on_status_changed(Some("2M".to_string()));

    h.plugin.to_dead("client-joe-1").unwrap();
    conn.publish(&[msg(1, 9), msg(2, 5)]);
    assert!(conn.deliver_all(&h.plugin).is_empty());
    assert_eq!(conn.queue.size(), 0);
    assert_eq!(h.plugin.holdback_size("client-joe-1"), Some(2));

    h.plugin.to_alive("client-joe-1").unwrap();
    assert_eq!(conn.deliver_all(&h.plugin), vec![1, 2]);
}

#[test]
fn removed_connection_is_forgotten() {
    let h = harness(BANDWIDTH_RULES);
    let conn = Connection::new("client-joe-1");
    h.plugin.add_dispatch_manager(conn.clone()).unwrap();

    h.plugin.remove_dispatch_manager("client-joe-1").unwrap();

    assert_eq!(h.plugin.manager_count(), 0);
    assert!(h.plugin.to_alive("client-joe-1").is_err());
}
