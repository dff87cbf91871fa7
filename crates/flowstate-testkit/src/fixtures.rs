//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use flowstate::{ForwardingConfig, PduForwarding};
use flowstate_core::{decode_group, Address, CborEncoder, FlowStateEntry, FlowStateGroup, PortId};
use flowstate_routing::{ForwardingTable, MemoryRib, Rib};
use flowstate_sync::{
    MemoryMessenger, MemoryNetwork, Messenger, SyncError, WriteMessage,
    FLOW_STATE_GROUP_OBJECT_NAME,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ─────────────────────────────────────────────────────────────────────────────
// Recording collaborators
// ─────────────────────────────────────────────────────────────────────────────

/// A write captured by [`RecordingMessenger`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentWrite {
    pub port: PortId,
    pub message: WriteMessage,
}

/// Messenger that records every write instead of delivering it.
///
/// Ports marked with [`fail_port`](Self::fail_port) refuse sends.
#[derive(Debug, Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<SentWrite>>,
    failing: Mutex<HashSet<PortId>>,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sends through `port` fail until restored.
    pub fn fail_port(&self, port: PortId) {
        lock(&self.failing).insert(port);
    }

    pub fn restore_port(&self, port: PortId) {
        lock(&self.failing).remove(&port);
    }

    /// Everything sent so far.
    pub fn sent(&self) -> Vec<SentWrite> {
        lock(&self.sent).clone()
    }

    /// Writes sent through `port`.
    pub fn sent_to(&self, port: PortId) -> Vec<WriteMessage> {
        lock(&self.sent)
            .iter()
            .filter(|w| w.port == port)
            .map(|w| w.message.clone())
            .collect()
    }

    /// Decoded groups sent through `port`; undecodable writes are skipped.
    pub fn groups_to(&self, port: PortId) -> Vec<FlowStateGroup> {
        self.sent_to(port)
            .iter()
            .filter_map(|m| decode_group(&m.value).ok())
            .collect()
    }

    /// Drain the record.
    pub fn take(&self) -> Vec<SentWrite> {
        std::mem::take(&mut *lock(&self.sent))
    }

    pub fn len(&self) -> usize {
        lock(&self.sent).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.sent).is_empty()
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send(&self, port: PortId, message: WriteMessage) -> flowstate_sync::Result<()> {
        if lock(&self.failing).contains(&port) {
            return Err(SyncError::TransportError(format!("port {port} failing")));
        }
        lock(&self.sent).push(SentWrite { port, message });
        Ok(())
    }
}

/// RIB that keeps every installed table.
#[derive(Debug, Default)]
pub struct RecordingRib {
    installs: Mutex<Vec<ForwardingTable>>,
}

impl RecordingRib {
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recently installed table.
    pub fn latest(&self) -> Option<ForwardingTable> {
        lock(&self.installs).last().cloned()
    }

    /// All installed tables, oldest first.
    pub fn installs(&self) -> Vec<ForwardingTable> {
        lock(&self.installs).clone()
    }

    pub fn install_count(&self) -> usize {
        lock(&self.installs).len()
    }
}

impl Rib for RecordingRib {
    fn install(&self, table: ForwardingTable) {
        lock(&self.installs).push(table);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Single node
// ─────────────────────────────────────────────────────────────────────────────

/// One node wired to recording collaborators.
pub struct TestFixture {
    pub node: PduForwarding<Arc<RecordingMessenger>, Arc<RecordingRib>>,
    pub messenger: Arc<RecordingMessenger>,
    pub rib: Arc<RecordingRib>,
}

impl TestFixture {
    /// Create a node at `address` with default configuration.
    pub fn new(address: Address) -> Self {
        Self::with_config(ForwardingConfig::new(address))
    }

    pub fn with_config(config: ForwardingConfig) -> Self {
        let messenger = Arc::new(RecordingMessenger::new());
        let rib = Arc::new(RecordingRib::new());
        let node = PduForwarding::new(config, Arc::clone(&messenger), Arc::clone(&rib));
        Self {
            node,
            messenger,
            rib,
        }
    }

    pub fn address(&self) -> Address {
        self.node.local_address()
    }

    /// Allocate a flow from this node on `port` to `neighbor`, arriving on
    /// the neighbor's port 1.
    pub fn allocate(&self, port: PortId, neighbor: Address) {
        self.node.flow_allocated(self.address(), port, neighbor, PortId(1));
    }

    /// Build a flooding write carrying `entries`.
    pub fn group_write(entries: Vec<FlowStateEntry>) -> flowstate_core::Result<WriteMessage> {
        WriteMessage::group(
            &CborEncoder,
            FLOW_STATE_GROUP_OBJECT_NAME,
            &FlowStateGroup::new(entries),
        )
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Mesh
// ─────────────────────────────────────────────────────────────────────────────

/// Node type used by [`Mesh`].
pub type MeshNode = PduForwarding<MemoryMessenger, MemoryRib>;

/// Several nodes joined by the in-memory network.
///
/// Nothing runs in the background: tests drive flooding and delivery
/// explicitly, round by round.
pub struct Mesh {
    network: Arc<MemoryNetwork>,
    nodes: BTreeMap<Address, MeshNode>,
    links: BTreeMap<(Address, PortId), (Address, PortId)>,
}

impl Mesh {
    /// Create one node per address.
    pub async fn new<I>(addresses: I) -> Self
    where
        I: IntoIterator<Item = Address>,
    {
        let network = MemoryNetwork::new();
        let mut nodes = BTreeMap::new();
        for address in addresses {
            let messenger = network.create_messenger(address).await;
            let node = PduForwarding::new(ForwardingConfig::new(address), messenger, MemoryRib::new());
            nodes.insert(address, node);
        }
        Self {
            network,
            nodes,
            links: BTreeMap::new(),
        }
    }

    pub fn node(&self, address: Address) -> Option<&MeshNode> {
        self.nodes.get(&address)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &MeshNode> {
        self.nodes.values()
    }

    /// Bring up a flow between `a` on `port_a` and `b` on `port_b`, then
    /// enroll each side with the other.
    pub async fn link(&mut self, a: Address, port_a: PortId, b: Address, port_b: PortId) {
        self.network.connect(a, port_a, b, port_b).await;
        self.links.insert((a, port_a), (b, port_b));
        self.links.insert((b, port_b), (a, port_a));

        if let Some(node) = self.nodes.get(&a) {
            node.flow_allocated(a, port_a, b, port_b);
        }
        if let Some(node) = self.nodes.get(&b) {
            node.flow_allocated(b, port_b, a, port_a);
        }
        if let Some(node) = self.nodes.get(&a) {
            node.enrollment_to_neighbor(b, true, port_a).await;
        }
        if let Some(node) = self.nodes.get(&b) {
            node.enrollment_to_neighbor(a, true, port_b).await;
        }
    }

    /// Tear down the flow behind `a`/`port_a` on both ends.
    pub async fn unlink(&mut self, a: Address, port_a: PortId) {
        let Some((b, port_b)) = self.links.remove(&(a, port_a)) else {
            return;
        };
        self.links.remove(&(b, port_b));
        self.network.disconnect(a, port_a).await;

        if let Some(node) = self.nodes.get(&a) {
            node.flow_deallocated(port_a);
        }
        if let Some(node) = self.nodes.get(&b) {
            node.flow_deallocated(port_b);
        }
    }

    /// Hand every pending write to its receiver. Returns how many there were.
    pub async fn deliver(&self) -> usize {
        let mut delivered = 0;
        for node in self.nodes.values() {
            while let Some(delivery) = node.messenger().try_recv().await {
                node.write_message_received(&delivery.message, delivery.port);
                delivered += 1;
            }
        }
        delivered
    }

    /// One flooding round on every node, followed by delivery.
    ///
    /// Returns whether any node had something to flood.
    pub async fn flood_round(&self) -> bool {
        let mut flooded = false;
        for node in self.nodes.values() {
            flooded |= node.propagate_fsdb().await;
        }
        self.deliver().await;
        flooded
    }

    /// Deliver and flood until quiet or `max_rounds` is reached.
    ///
    /// Returns the number of rounds that flooded something.
    pub async fn converge(&self, max_rounds: usize) -> usize {
        self.deliver().await;
        let mut rounds = 0;
        while rounds < max_rounds && self.flood_round().await {
            rounds += 1;
        }
        rounds
    }

    /// Recompute every node's table. Returns them by node address.
    pub fn recompute_all(&self) -> BTreeMap<Address, ForwardingTable> {
        self.nodes
            .iter()
            .map(|(address, node)| (*address, node.recompute()))
            .collect()
    }

    /// Whether every node holds the same entries.
    pub fn databases_agree(&self) -> bool {
        let mut snapshots = self.nodes.values().map(|n| strip_age(n.database().snapshot()));
        match snapshots.next() {
            Some(first) => snapshots.all(|s| s == first),
            None => true,
        }
    }
}

/// Age is local bookkeeping; two nodes agree when everything else matches.
fn strip_age(entries: Vec<FlowStateEntry>) -> Vec<FlowStateEntry> {
    entries
        .into_iter()
        .map(|mut e| {
            e.age = 0;
            e
        })
        .collect()
}
