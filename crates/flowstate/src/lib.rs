//! # Flowstate
//!
//! Link-state PDU forwarding for one node of a recursive network layer.
//!
//! ## Overview
//!
//! Each node keeps a database of flow state entries, one per flow any node
//! has to a neighbor, and gossips changes to its own neighbors:
//!
//! - **Entries**: one directed link fact, versioned by a sequence number
//! - **Flooding**: changed entries go to every neighbor except their source
//! - **Enrollment**: a new neighbor receives the full database at once
//! - **Aging**: withdrawn entries linger as tombstones, then get purged
//! - **Routing**: Dijkstra over the active entries yields the next-hop table
//!
//! ## Usage
//!
//! ```rust,no_run
//! use flowstate::{ForwardingConfig, PduForwarding};
//! use flowstate::core::{Address, PortId};
//! use flowstate::routing::MemoryRib;
//! use flowstate::sync::MemoryNetwork;
//!
//! async fn example() {
//!     let network = MemoryNetwork::new();
//!     let messenger = network.create_messenger(Address(1)).await;
//!
//!     let node = PduForwarding::new(ForwardingConfig::new(Address(1)), messenger, MemoryRib::new());
//!     let _tasks = node.spawn_background();
//!
//!     // A flow to node 2 came up on local port 1.
//!     node.flow_allocated(Address(1), PortId(1), Address(2), PortId(1));
//!     node.enrollment_to_neighbor(Address(2), true, PortId(1)).await;
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `flowstate::core` - Entries, groups and the CBOR encoding
//! - `flowstate::store` - The flow state database
//! - `flowstate::sync` - Flooding, enrollment and merging
//! - `flowstate::routing` - Forwarding graph, Dijkstra and the RIB

pub mod error;
pub mod forwarding;
pub mod scheduler;

pub use flowstate_core as core;
pub use flowstate_routing as routing;
pub use flowstate_store as store;
pub use flowstate_sync as sync;

pub use error::{ForwardingError, Result};
pub use forwarding::{BackgroundTasks, ForwardingConfig, PduForwarding};
pub use scheduler::RecomputeScheduler;

pub use flowstate_core::{Address, FlowStateEntry, FlowStateGroup, ObjectClass, PortId};
pub use flowstate_routing::{ForwardingTable, Rib};
pub use flowstate_sync::{Messenger, WriteMessage};
