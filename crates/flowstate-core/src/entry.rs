//! Flow state entries: the atomic unit of the link-state database.
//!
//! An entry states "node `address` has flow `port_id` to node
//! `neighbor_address`, arriving there on `neighbor_port_id`". Freshness is
//! carried only by the explicit `sequence_number` and `age` fields.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{Address, PortId};

/// The identity of an entry within a database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntryKey {
    /// Address of the node that originated the entry.
    pub address: Address,
    /// Port id local to that node.
    pub port_id: PortId,
}

impl EntryKey {
    /// Create a new key.
    pub const fn new(address: Address, port_id: PortId) -> Self {
        Self { address, port_id }
    }
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.address, self.port_id)
    }
}

/// One directed link fact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowStateEntry {
    /// Address of the originating node.
    pub address: Address,
    /// Flow identifier on the originating node.
    pub port_id: PortId,
    /// Address of the remote endpoint.
    pub neighbor_address: Address,
    /// Flow identifier on the remote endpoint.
    pub neighbor_port_id: PortId,
    /// `true` while the flow is up, `false` once withdrawn.
    pub state: bool,
    /// Version of this fact, bumped by the originator on every change.
    pub sequence_number: u64,
    /// Aging steps elapsed since the entry was last created or accepted.
    pub age: u64,
}

impl FlowStateEntry {
    /// Create a fresh active entry at sequence number 1.
    pub fn new(
        address: Address,
        port_id: PortId,
        neighbor_address: Address,
        neighbor_port_id: PortId,
    ) -> Self {
        Self {
            address,
            port_id,
            neighbor_address,
            neighbor_port_id,
            state: true,
            sequence_number: 1,
            age: 0,
        }
    }

    /// Builder-style setter for the sequence number.
    pub fn with_sequence_number(mut self, sequence_number: u64) -> Self {
        self.sequence_number = sequence_number;
        self
    }

    /// Builder-style setter for the state flag.
    pub fn with_state(mut self, state: bool) -> Self {
        self.state = state;
        self
    }

    /// The database key of this entry.
    pub fn key(&self) -> EntryKey {
        EntryKey::new(self.address, self.port_id)
    }

    /// Whether the flow is currently up.
    pub fn is_active(&self) -> bool {
        self.state
    }

    /// Whether this entry is a withdrawal tombstone.
    pub fn is_withdrawn(&self) -> bool {
        !self.state
    }

    /// Object name used when this entry is written on its own.
    pub fn object_name(&self) -> String {
        self.key().to_string()
    }

    /// Whether the entry points at the given remote endpoint.
    pub fn same_endpoint(&self, neighbor_address: Address, neighbor_port_id: PortId) -> bool {
        self.neighbor_address == neighbor_address && self.neighbor_port_id == neighbor_port_id
    }
}

/// An unordered batch of entries.
///
/// Groups exist only on the wire and in flight; they are never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowStateGroup {
    entries: Vec<FlowStateEntry>,
}

impl FlowStateGroup {
    /// Create a group from entries.
    pub fn new(entries: Vec<FlowStateEntry>) -> Self {
        Self { entries }
    }

    /// The entries in this group.
    pub fn entries(&self) -> &[FlowStateEntry] {
        &self.entries
    }

    /// Consume the group, yielding its entries.
    pub fn into_entries(self) -> Vec<FlowStateEntry> {
        self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the group has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate the entries.
    pub fn iter(&self) -> std::slice::Iter<'_, FlowStateEntry> {
        self.entries.iter()
    }

    /// Split into groups of at most `max` entries each.
    ///
    /// A `max` of zero is treated as one.
    pub fn chunks(&self, max: usize) -> Vec<FlowStateGroup> {
        self.entries
            .chunks(max.max(1))
            .map(|chunk| FlowStateGroup::new(chunk.to_vec()))
            .collect()
    }
}

impl FromIterator<FlowStateEntry> for FlowStateGroup {
    fn from_iter<I: IntoIterator<Item = FlowStateEntry>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl IntoIterator for FlowStateGroup {
    type Item = FlowStateEntry;
    type IntoIter = std::vec::IntoIter<FlowStateEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a FlowStateGroup {
    type Item = &'a FlowStateEntry;
    type IntoIter = std::slice::Iter<'a, FlowStateEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
