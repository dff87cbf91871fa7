//! Shortest-path next-hop computation.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};

use tracing::debug;

use flowstate_core::{Address, FlowStateEntry, PortId};
use flowstate_store::FlowStateDatabase;

use crate::graph::ForwardingGraph;
use crate::metric::{Metric, UniformMetric};
use crate::rib::Rib;
use crate::table::ForwardingTable;

/// Path label: total cost, then first hop (neighbor address, local port).
///
/// Ordering labels lexicographically makes Dijkstra settle each
/// destination on the cheapest path and, among equal-cost paths, on the one
/// with the lowest first hop. Extending a path keeps its first hop, so the
/// order is preserved along the way.
type Label = (u64, Address, PortId);

/// Derives forwarding tables from the database.
#[derive(Debug, Clone, Default)]
pub struct ForwardingComputation<M = UniformMetric> {
    metric: M,
}

impl<M: Metric> ForwardingComputation<M> {
    /// Create a computation pricing edges with `metric`.
    pub fn new(metric: M) -> Self {
        Self { metric }
    }

    /// Compute the table for `local` over `entries`.
    ///
    /// Destinations that cannot be reached are absent, and so is `local`.
    pub fn compute<'a, I>(&self, local: Address, entries: I) -> ForwardingTable
    where
        I: IntoIterator<Item = &'a FlowStateEntry>,
    {
        let graph = ForwardingGraph::from_entries(entries);
        self.compute_graph(local, &graph)
    }

    /// Dijkstra from `local` over an already built graph.
    pub fn compute_graph(&self, local: Address, graph: &ForwardingGraph) -> ForwardingTable {
        let mut settled: BTreeMap<Address, Label> = BTreeMap::new();
        let mut best: BTreeMap<Address, Label> = BTreeMap::new();
        let mut heap: BinaryHeap<Reverse<(Label, Address)>> = BinaryHeap::new();

        for edge in graph.edges_from(local) {
            let label = (u64::from(self.metric.cost(edge).get()), edge.to, edge.port_id);
            relax(&mut best, &mut heap, edge.to, label);
        }

        while let Some(Reverse((label, node))) = heap.pop() {
            if node == local || settled.contains_key(&node) {
                continue;
            }
            if best.get(&node) != Some(&label) {
                continue;
            }
            settled.insert(node, label);

            let (cost, hop, port) = label;
            for edge in graph.edges_from(node) {
                if edge.to == local || settled.contains_key(&edge.to) {
                    continue;
                }
                let next = cost.saturating_add(u64::from(self.metric.cost(edge).get()));
                relax(&mut best, &mut heap, edge.to, (next, hop, port));
            }
        }

        settled
            .into_iter()
            .map(|(destination, (_, _, port))| (destination, port))
            .collect()
    }

    /// Compute from the database's active entries and install the result.
    ///
    /// The entries are read in one critical section, so the table never
    /// reflects a half-applied merge.
    pub fn recompute<R: Rib + ?Sized>(
        &self,
        local: Address,
        database: &FlowStateDatabase,
        rib: &R,
    ) -> ForwardingTable {
        let entries = database.active_entries();
        let table = self.compute(local, &entries);
        debug!(
            local = %local,
            edges = entries.len(),
            routes = table.len(),
            "installing forwarding table"
        );
        rib.install(table.clone());
        table
    }
}

fn relax(
    best: &mut BTreeMap<Address, Label>,
    heap: &mut BinaryHeap<Reverse<(Label, Address)>>,
    node: Address,
    label: Label,
) {
    let improved = match best.get(&node) {
        Some(current) => label < *current,
        None => true,
    };
    if improved {
        best.insert(node, label);
        heap.push(Reverse((label, node)));
    }
}
