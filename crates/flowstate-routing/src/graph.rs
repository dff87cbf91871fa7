//! The forwarding graph: a transient view of the active entries.

use std::collections::{BTreeMap, BTreeSet};

use flowstate_core::{Address, FlowStateEntry, PortId};

/// A directed link out of `from`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Edge {
    pub from: Address,
    pub to: Address,
    /// Port on `from` the link leaves through.
    pub port_id: PortId,
}

/// Adjacency view rebuilt on every recompute.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForwardingGraph {
    adjacency: BTreeMap<Address, Vec<Edge>>,
    vertices: BTreeSet<Address>,
}

impl ForwardingGraph {
    /// Build from entries; withdrawn entries are skipped.
    pub fn from_entries<'a, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = &'a FlowStateEntry>,
    {
        let mut graph = Self::default();
        for entry in entries.into_iter().filter(|e| e.is_active()) {
            graph.add_edge(Edge {
                from: entry.address,
                to: entry.neighbor_address,
                port_id: entry.port_id,
            });
        }
        graph
    }

    /// Add one edge. Self-loops are ignored.
    pub fn add_edge(&mut self, edge: Edge) {
        if edge.from == edge.to {
            return;
        }
        self.vertices.insert(edge.from);
        self.vertices.insert(edge.to);
        let out = self.adjacency.entry(edge.from).or_default();
        if !out.contains(&edge) {
            out.push(edge);
            out.sort();
        }
    }

    /// Outgoing edges of `node`, ordered by (to, port id).
    pub fn edges_from(&self, node: Address) -> &[Edge] {
        self.adjacency.get(&node).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Distinct addresses appearing in any edge.
    pub fn vertices(&self) -> impl Iterator<Item = Address> + '_ {
        self.vertices.iter().copied()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }
}
