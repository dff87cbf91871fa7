//! Behavior of the inbound operations on a single node.

use std::collections::HashMap;

use proptest::prelude::*;

use flowstate::core::{canonical_entry_bytes, decode_entry, CborEncoder, EntryKey};
use flowstate::store::Origin;
use flowstate::sync::FLOW_STATE_RECOVERY_OBJECT_NAME;
use flowstate::{Address, FlowStateEntry, FlowStateGroup, ObjectClass, PortId, WriteMessage};
use flowstate_testkit::fixtures::TestFixture;
use flowstate_testkit::generators::small_entry;

fn link(from: u64, port: u64, to: u64) -> FlowStateEntry {
    FlowStateEntry::new(Address(from), PortId(port), Address(to), PortId(1))
}

// ─────────────────────────────────────────────────────────────────────────────
// Local flow events
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn deallocation_reports_whether_the_flow_existed() {
    let fixture = TestFixture::new(Address(1));
    fixture
        .node
        .flow_allocated(Address(1), PortId(1), Address(2), PortId(1));

    assert!(fixture.node.flow_deallocated(PortId(1)));
    assert!(!fixture.node.flow_deallocated(PortId(2)));
}

#[test]
fn deallocation_leaves_a_tombstone_with_a_newer_version() {
    let fixture = TestFixture::new(Address(1));
    fixture.allocate(PortId(1), Address(2));
    fixture.node.flow_deallocated(PortId(1));

    let stored = fixture
        .node
        .database()
        .get(&EntryKey::new(Address(1), PortId(1)))
        .unwrap();
    assert!(stored.entry.is_withdrawn());
    assert_eq!(stored.entry.sequence_number, 2);
    assert!(stored.modified);
}

// ─────────────────────────────────────────────────────────────────────────────
// Enrollment
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn enrollment_on_empty_database_sends_nothing() {
    let fixture = TestFixture::new(Address(1));

    assert!(
        !fixture
            .node
            .enrollment_to_neighbor(Address(2), true, PortId(1))
            .await
    );
    assert!(fixture.messenger.is_empty());
}

#[tokio::test]
async fn enrollment_sends_the_allocated_entry() {
    let fixture = TestFixture::new(Address(1));
    fixture
        .node
        .flow_allocated(Address(1), PortId(1), Address(2), PortId(1));

    assert!(
        fixture
            .node
            .enrollment_to_neighbor(Address(2), true, PortId(1))
            .await
    );

    let sent = fixture.messenger.sent_to(PortId(1));
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].object_name, FLOW_STATE_RECOVERY_OBJECT_NAME);

    let groups = fixture.messenger.groups_to(PortId(1));
    assert_eq!(groups[0].len(), 1);
    let entry = &groups[0].entries()[0];
    assert_eq!(entry.address, Address(1));
    assert_eq!(entry.port_id, PortId(1));
    assert_eq!(entry.neighbor_address, Address(2));
    assert_eq!(entry.neighbor_port_id, PortId(1));
}

#[tokio::test]
async fn enrollment_failure_is_false() {
    let fixture = TestFixture::new(Address(1));
    fixture.allocate(PortId(1), Address(2));
    fixture.messenger.fail_port(PortId(1));

    assert!(
        !fixture
            .node
            .enrollment_to_neighbor(Address(2), true, PortId(1))
            .await
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Flooding
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn propagation_on_empty_database_sends_nothing() {
    let fixture = TestFixture::new(Address(1));

    assert!(!fixture.node.propagate_fsdb().await);
    assert!(fixture.messenger.is_empty());
}

#[tokio::test]
async fn propagation_sends_exactly_the_new_entry() {
    let fixture = TestFixture::new(Address(1));
    fixture
        .node
        .flow_allocated(Address(1), PortId(1), Address(2), PortId(1));

    assert!(fixture.node.propagate_fsdb().await);

    let groups = fixture.messenger.groups_to(PortId(1));
    assert_eq!(groups.len(), 1);
    assert_eq!(
        groups[0].entries(),
        &[FlowStateEntry::new(Address(1), PortId(1), Address(2), PortId(1))]
    );
}

#[tokio::test]
async fn propagation_is_edge_triggered() {
    let fixture = TestFixture::new(Address(1));
    fixture.allocate(PortId(1), Address(2));

    assert!(fixture.node.propagate_fsdb().await);
    let after_first = fixture.messenger.len();

    assert!(!fixture.node.propagate_fsdb().await);
    assert_eq!(fixture.messenger.len(), after_first);
}

#[tokio::test]
async fn propagation_withholds_entries_from_their_source() {
    let fixture = TestFixture::new(Address(1));
    fixture.allocate(PortId(1), Address(2));
    fixture.allocate(PortId(2), Address(3));
    fixture.node.propagate_fsdb().await;
    fixture.messenger.take();

    let learned = link(2, 4, 5);
    let write = TestFixture::group_write(vec![learned.clone()]).unwrap();
    assert!(fixture.node.write_message_received(&write, PortId(1)));

    assert!(fixture.node.propagate_fsdb().await);
    assert!(fixture.messenger.sent_to(PortId(1)).is_empty());
    assert_eq!(fixture.messenger.groups_to(PortId(2))[0].entries(), &[learned]);
}

#[tokio::test]
async fn failed_send_is_retried_next_round() {
    let fixture = TestFixture::new(Address(1));
    fixture.allocate(PortId(1), Address(2));
    fixture.messenger.fail_port(PortId(1));

    let report = fixture.node.propagate().await;
    assert!(report.propagated);
    assert_eq!(report.failed_ports, vec![PortId(1)]);
    assert!(fixture.messenger.is_empty());

    fixture.messenger.restore_port(PortId(1));
    assert!(fixture.node.propagate_fsdb().await);
    assert_eq!(fixture.messenger.groups_to(PortId(1)).len(), 1);
    assert!(!fixture.node.propagate_fsdb().await);
}

#[tokio::test]
async fn withdrawing_the_only_flow_keeps_the_tombstone_pending() {
    let fixture = TestFixture::new(Address(1));
    fixture.allocate(PortId(1), Address(2));
    assert!(fixture.node.propagate_fsdb().await);

    assert!(fixture.node.flow_deallocated(PortId(1)));
    assert!(!fixture.node.propagate_fsdb().await);

    let key = EntryKey::new(Address(1), PortId(1));
    let stored = fixture.node.database().get(&key).unwrap();
    assert!(stored.entry.is_withdrawn());
    assert!(stored.modified);

    fixture.allocate(PortId(2), Address(3));
    assert!(fixture.node.propagate_fsdb().await);
    let flooded: Vec<FlowStateEntry> = fixture
        .messenger
        .groups_to(PortId(2))
        .into_iter()
        .flat_map(FlowStateGroup::into_entries)
        .collect();
    assert!(flooded.iter().any(|e| e.key() == key && e.is_withdrawn()));
    assert!(!fixture.node.database().get(&key).unwrap().modified);
}

#[tokio::test]
async fn full_resync_repeats_the_snapshot() {
    let fixture = TestFixture::new(Address(1));
    fixture.allocate(PortId(1), Address(2));
    fixture.node.propagate_fsdb().await;
    fixture.messenger.take();

    let report = fixture.node.full_resync().await;
    assert!(report.propagated);
    assert_eq!(fixture.messenger.groups_to(PortId(1))[0].len(), 1);
    assert!(!fixture.node.propagate_fsdb().await);
}

// ─────────────────────────────────────────────────────────────────────────────
// Remote writes
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn group_write_is_merged() {
    let fixture = TestFixture::new(Address(1));
    let entry = link(2, 1, 3);
    let write = TestFixture::group_write(vec![entry.clone()]).unwrap();

    assert!(fixture.node.write_message_received(&write, PortId(1)));

    let stored = fixture.node.database().get(&entry.key()).unwrap();
    assert_eq!(stored.entry, entry);
    assert_eq!(stored.origin, Origin::Remote(PortId(1)));
    assert!(fixture.node.recompute_pending());
}

#[test]
fn single_entry_write_is_rejected() {
    let fixture = TestFixture::new(Address(1));
    let write = WriteMessage::entry(&CborEncoder, &link(2, 1, 3)).unwrap();

    assert!(!fixture.node.write_message_received(&write, PortId(1)));
    assert!(fixture.node.database().is_empty());
    assert!(!fixture.node.recompute_pending());
}

#[test]
fn undecodable_write_is_rejected() {
    let fixture = TestFixture::new(Address(1));
    let write = WriteMessage::new(ObjectClass::FlowStateGroup, "/x", vec![0xffu8, 0x00]);

    assert!(!fixture.node.write_message_received(&write, PortId(1)));
    assert!(fixture.node.database().is_empty());
}

#[test]
fn stale_write_is_processed_without_recompute() {
    let fixture = TestFixture::new(Address(1));
    let write = TestFixture::group_write(vec![link(2, 1, 3).with_sequence_number(4)]).unwrap();
    fixture.node.write_message_received(&write, PortId(1));
    fixture.node.flush_recompute();

    let older = TestFixture::group_write(vec![link(2, 1, 9).with_sequence_number(3)]).unwrap();
    assert!(fixture.node.write_message_received(&older, PortId(1)));
    assert!(!fixture.node.recompute_pending());

    let stored = fixture
        .node
        .database()
        .get(&EntryKey::new(Address(2), PortId(1)))
        .unwrap();
    assert_eq!(stored.entry.neighbor_address, Address(3));
}

#[test]
fn own_entry_survives_a_newer_remote_copy() {
    let fixture = TestFixture::new(Address(1));
    fixture.allocate(PortId(1), Address(2));

    let bogus = link(1, 1, 9).with_sequence_number(7);
    let write = TestFixture::group_write(vec![bogus]).unwrap();
    assert!(fixture.node.write_message_received(&write, PortId(1)));

    let stored = fixture
        .node
        .database()
        .get(&EntryKey::new(Address(1), PortId(1)))
        .unwrap();
    assert_eq!(stored.entry.neighbor_address, Address(2));
    assert_eq!(stored.entry.sequence_number, 8);
    assert_eq!(stored.origin, Origin::Local);
    assert!(stored.modified);
}

#[tokio::test]
async fn stale_copy_of_own_flow_is_flushed_not_routed() {
    let fixture = TestFixture::new(Address(1));
    let write = TestFixture::group_write(vec![link(1, 9, 3).with_sequence_number(4)]).unwrap();
    assert!(fixture.node.write_message_received(&write, PortId(1)));
    fixture.allocate(PortId(1), Address(2));

    let table = fixture.node.recompute();
    assert_eq!(table.get(Address(2)), Some(PortId(1)));
    assert!(!table.contains(Address(3)));

    assert!(fixture.node.propagate_fsdb().await);
    let flushed = fixture
        .messenger
        .groups_to(PortId(1))
        .into_iter()
        .flat_map(FlowStateGroup::into_entries)
        .find(|e| e.key() == EntryKey::new(Address(1), PortId(9)))
        .unwrap();
    assert!(flushed.is_withdrawn());
    assert_eq!(flushed.sequence_number, 5);
}

#[test]
fn entry_round_trip_keeps_every_field() {
    let entry = FlowStateEntry {
        age: 9,
        ..link(7, 3, 8).with_state(false).with_sequence_number(12)
    };
    let bytes = canonical_entry_bytes(&entry).unwrap();
    assert_eq!(decode_entry(&bytes).unwrap(), entry);
}

// ─────────────────────────────────────────────────────────────────────────────
// Routing
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn recompute_reuses_next_hop_along_chain() {
    let fixture = TestFixture::new(Address(1));
    fixture.allocate(PortId(1), Address(2));
    let write = TestFixture::group_write(vec![link(2, 1, 3)]).unwrap();
    fixture.node.write_message_received(&write, PortId(1));

    let table = fixture.node.recompute();
    assert_eq!(table.get(Address(2)), Some(PortId(1)));
    assert_eq!(table.get(Address(3)), Some(PortId(1)));
    assert_eq!(fixture.rib.latest(), Some(table));
}

#[test]
fn burst_of_writes_yields_one_recompute() {
    let fixture = TestFixture::new(Address(1));
    fixture.allocate(PortId(1), Address(2));
    for port in 1..=5 {
        let write = TestFixture::group_write(vec![link(2, port, 10 + port)]).unwrap();
        fixture.node.write_message_received(&write, PortId(1));
    }

    assert!(fixture.node.flush_recompute().is_some());
    assert!(fixture.node.flush_recompute().is_none());
    assert_eq!(fixture.rib.install_count(), 1);
    assert_eq!(fixture.rib.latest().unwrap().len(), 6);
}

#[test]
fn withdrawn_link_drops_routes() {
    let fixture = TestFixture::new(Address(1));
    fixture.allocate(PortId(1), Address(2));
    let write = TestFixture::group_write(vec![link(2, 1, 3)]).unwrap();
    fixture.node.write_message_received(&write, PortId(1));
    fixture.node.recompute();

    fixture.node.flow_deallocated(PortId(1));
    let table = fixture.node.flush_recompute().unwrap();
    assert!(table.is_empty());
}

// ─────────────────────────────────────────────────────────────────────────────
// Sequence numbers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Op {
    Allocate(u64, u64),
    Deallocate(u64),
    Remote(FlowStateEntry),
    Age,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1u64..4, 2u64..5).prop_map(|(p, n)| Op::Allocate(p, n)),
        (1u64..5).prop_map(Op::Deallocate),
        small_entry().prop_map(Op::Remote),
        Just(Op::Age),
    ]
}

proptest! {
    #[test]
    fn sequence_numbers_never_decrease(ops in prop::collection::vec(op(), 1..40)) {
        let fixture = TestFixture::new(Address(1));
        let mut seen: HashMap<EntryKey, u64> = HashMap::new();

        for op in ops {
            match op {
                Op::Allocate(port, neighbor) => fixture.allocate(PortId(port), Address(neighbor)),
                Op::Deallocate(port) => {
                    fixture.node.flow_deallocated(PortId(port));
                }
                Op::Remote(entry) => {
                    let write = TestFixture::group_write(vec![entry]).unwrap();
                    prop_assert!(fixture.node.write_message_received(&write, PortId(1)));
                }
                Op::Age => {
                    // A purged key starts over when it is next created.
                    for key in fixture.node.age_step().purged {
                        seen.remove(&key);
                    }
                }
            }

            for entry in fixture.node.database().snapshot() {
                let previous = seen.insert(entry.key(), entry.sequence_number);
                if let Some(previous) = previous {
                    prop_assert!(entry.sequence_number >= previous);
                }
            }
        }
    }
}
