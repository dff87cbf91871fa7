//! # Flowstate Sync
//!
//! Link-state gossip between neighboring nodes.
//!
//! ## Overview
//!
//! Two read paths turn database state into outbound writes, and one write
//! path folds neighbor writes back in:
//!
//! - [`PropagationEngine`] floods the dirty set to every neighbor on each
//!   round, withholding an entry from the neighbor it was learned from.
//! - [`EnrollmentHandler`] hands a newly joined neighbor the full snapshot
//!   as a recovery write.
//! - [`UpdateMerger`] decodes group writes and merges them by sequence
//!   number.
//!
//! ## Key Properties
//!
//! - **Edge-triggered**: an entry is flooded once per change, not per round
//! - **Idempotent**: duplicate or reordered writes converge to the same state
//! - **Lock-free sends**: the send set is captured before any I/O happens
//!
//! ## Message Flow
//!
//! ```text
//! Node A                               Node B
//!   |  flow allocated on port 1          |
//!   |--- recovery group (snapshot) ----->|  enrollment
//!   |<-- recovery group (snapshot) ------|
//!   |                                    |
//!   |--- group (dirty entries) --------->|  flood round
//!   |                                    |  merge, re-flood to others
//! ```

pub mod enrollment;
pub mod error;
pub mod merger;
pub mod messages;
pub mod propagation;
pub mod transport;

pub use enrollment::EnrollmentHandler;
pub use error::{Result, SyncError};
pub use merger::UpdateMerger;
pub use messages::{
    object_name_for, WriteMessage, FLOW_STATE_GROUP_OBJECT_NAME, FLOW_STATE_OBJECT_NAME_PREFIX,
    FLOW_STATE_RECOVERY_OBJECT_NAME,
};
pub use propagation::{partition_by_neighbor, PropagationEngine, PropagationReport, SyncConfig};
pub use transport::{memory::Delivery, memory::MemoryMessenger, memory::MemoryNetwork, Messenger};
