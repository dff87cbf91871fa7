//! Proptest generators for property-based testing.

use proptest::prelude::*;

use flowstate_core::{Address, FlowStateEntry, FlowStateGroup, PortId};

/// Generate an address from a small space, so entries collide often.
pub fn address() -> impl Strategy<Value = Address> {
    (1u64..=16).prop_map(Address)
}

/// Generate a port id from a small space.
pub fn port_id() -> impl Strategy<Value = PortId> {
    (1u64..=8).prop_map(PortId)
}

/// Generate a valid sequence number (1-indexed).
pub fn sequence_number() -> impl Strategy<Value = u64> {
    1u64..=1_000
}

/// Generate any entry, wide integers included.
pub fn entry() -> impl Strategy<Value = FlowStateEntry> {
    (
        any::<u64>(),
        any::<u64>(),
        any::<u64>(),
        any::<u64>(),
        any::<bool>(),
        any::<u64>(),
        any::<u64>(),
    )
        .prop_map(|(a, p, na, np, state, seq, age)| FlowStateEntry {
            address: Address(a),
            port_id: PortId(p),
            neighbor_address: Address(na),
            neighbor_port_id: PortId(np),
            state,
            sequence_number: seq,
            age,
        })
}

/// Generate an entry over the small address and port spaces.
pub fn small_entry() -> impl Strategy<Value = FlowStateEntry> {
    any::<EntryParams>().prop_map(|params| params.entry())
}

/// Generate a group of up to `max_len` entries.
pub fn group(max_len: usize) -> impl Strategy<Value = FlowStateGroup> {
    prop::collection::vec(entry(), 0..=max_len).prop_map(FlowStateGroup::new)
}

/// Generate directed links `(from, port, to)` between a few nodes.
pub fn topology(max_links: usize) -> impl Strategy<Value = Vec<(Address, PortId, Address)>> {
    prop::collection::vec((address(), port_id(), address()), 0..=max_links)
}

/// Parameters for generating an entry over the small spaces.
#[derive(Debug, Clone)]
pub struct EntryParams {
    pub address: Address,
    pub port_id: PortId,
    pub neighbor_address: Address,
    pub neighbor_port_id: PortId,
    pub state: bool,
    pub sequence_number: u64,
}

impl EntryParams {
    /// The entry these parameters describe, at age zero.
    pub fn entry(&self) -> FlowStateEntry {
        FlowStateEntry::new(
            self.address,
            self.port_id,
            self.neighbor_address,
            self.neighbor_port_id,
        )
        .with_state(self.state)
        .with_sequence_number(self.sequence_number)
    }
}

impl Arbitrary for EntryParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            address(),
            port_id(),
            address(),
            port_id(),
            any::<bool>(),
            sequence_number(),
        )
            .prop_map(|(address, port_id, neighbor_address, neighbor_port_id, state, seq)| {
                EntryParams {
                    address,
                    port_id,
                    neighbor_address,
                    neighbor_port_id,
                    state,
                    sequence_number: seq,
                }
            })
            .boxed()
    }
}
