//! # Flowstate Routing
//!
//! Forwarding table computation over the link-state database.
//!
//! ## Overview
//!
//! Every active entry is a directed edge from its originating node to its
//! neighbor, leaving through the entry's local port. A recompute builds a
//! [`ForwardingGraph`] from those edges, runs Dijkstra from the local
//! address and installs the resulting [`ForwardingTable`] into a [`Rib`]
//! as one wholesale replacement.
//!
//! ## Design Notes
//!
//! - **Deterministic**: equal-cost paths are ordered by first-hop neighbor
//!   address, then first-hop port id, so unchanged input yields the same table
//! - **No stale routes**: the table holds only destinations reachable in the
//!   current graph
//! - **Pluggable weights**: [`Metric`] prices each edge; [`UniformMetric`]
//!   counts hops

pub mod compute;
pub mod graph;
pub mod metric;
pub mod rib;
pub mod table;

pub use compute::ForwardingComputation;
pub use graph::{Edge, ForwardingGraph};
pub use metric::{Metric, UniformMetric};
pub use rib::{MemoryRib, Rib};
pub use table::ForwardingTable;
