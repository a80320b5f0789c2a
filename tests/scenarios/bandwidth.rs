use std::sync::atomic::Ordering;

use prio_dispatch::ConnectionState;
use prio_dispatch::DeliveryQueue;
use prio_dispatch::Priority;
use prio_dispatch::StatusMatch;

use crate::common::harness;
use crate::common::msg;
use crate::common::Connection;
use crate::common::BANDWIDTH_OID;
use crate::common::BANDWIDTH_RULES;

#[test]
fn low_bandwidth_holds_back_until_the_link_recovers() {
    let h = harness(BANDWIDTH_RULES);
    let conn = Connection::new("client-joe-1");
    h.plugin.add_dispatch_manager(conn.clone()).unwrap();
    assert_eq!(h.broker.oids(), vec![BANDWIDTH_OID.to_string()]);

    conn.publish(&[msg(1, 8), msg(2, 3), msg(3, 5), msg(4, 9)]);
    assert_eq!(conn.deliver_all(&h.plugin), vec![4, 1]);
    assert_eq!(h.plugin.holdback_size("client-joe-1"), Some(2));

    h.plugin.on_status_changed(Some("2M".to_string()));
    assert_eq!(conn.wakeups.load(Ordering::Acquire), 1);
    assert_eq!(conn.deliver_all(&h.plugin), vec![3, 2]);

    h.plugin.on_status_changed(Some("64k".to_string()));
    conn.publish(&[msg(5, 1)]);
    assert!(conn.deliver_all(&h.plugin).is_empty());
    assert_eq!(h.plugin.holdback_size("client-joe-1"), Some(1));
    assert!(conn.dead_letters.lock().is_empty());
}

#[test]
fn unknown_status_falls_back_to_default_status() {
    let h = harness(BANDWIDTH_RULES);
    let conn = Connection::new("client-joe-1");
    h.plugin.add_dispatch_manager(conn.clone()).unwrap();

    h.plugin.on_status_changed(Some("9600".to_string()));
    conn.publish(&[msg(1, 2)]);

    assert!(conn.deliver_all(&h.plugin).is_empty());
    assert_eq!(h.plugin.holdback_size("client-joe-1"), Some(1));
    let (_, found) = h.plugin.active_parser().resolve(Some("9600"));
    assert_eq!(found, StatusMatch::DefaultStatus);
}

#[test]
fn serialized_rules_reload_to_the_same_decisions() {
    let h = harness(BANDWIDTH_RULES);
    let before = h.plugin.active_parser();

    h.plugin.reconfigure(&before.to_xml()).unwrap();

    let after = h.plugin.active_parser();
    for status in [None, Some("64k"), Some("2M"), Some("unknown")] {
        let (old, _) = before.resolve(status);
        let (new, _) = after.resolve(status);
        for priority in Priority::all() {
            assert_eq!(old.resolve(priority), new.resolve(priority), "{status:?} {priority}");
        }
    }
    let old_polling = before.resolve_by_connection_state(ConnectionState::Polling).unwrap();
    let new_polling = after.resolve_by_connection_state(ConnectionState::Polling).unwrap();
    for priority in Priority::all() {
        assert_eq!(old_polling.resolve(priority), new_polling.resolve(priority));
    }
    assert_eq!(h.broker.oids(), vec![BANDWIDTH_OID.to_string()]);
}

#[test]
fn connections_are_flushed_independently() {
    let h = harness(BANDWIDTH_RULES);
    let joe = Connection::new("client-joe-1");
    let jack = Connection::new("client-jack-1");
    h.plugin.add_dispatch_manager(joe.clone()).unwrap();
    h.plugin.add_dispatch_manager(jack.clone()).unwrap();

    joe.publish(&[msg(1, 2)]);
    jack.publish(&[msg(1, 9)]);
    assert!(joe.deliver_all(&h.plugin).is_empty());
    assert_eq!(jack.deliver_all(&h.plugin), vec![1]);

    h.plugin.on_status_changed(Some("2M".to_string()));

    assert_eq!(joe.queue.size(), 1);
    assert_eq!(joe.wakeups.load(Ordering::Acquire), 1);
    assert_eq!(jack.wakeups.load(Ordering::Acquire), 0);
}
