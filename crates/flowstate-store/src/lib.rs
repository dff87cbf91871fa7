//! # Flowstate Store
//!
//! The flow state database: the authoritative, lock-guarded store of
//! link-state entries held by one node.
//!
//! ## Overview
//!
//! Two mutation paths write to the database: local flow events
//! ([`FlowStateDatabase::add_or_update_local`],
//! [`FlowStateDatabase::withdraw_local`]) and remote updates
//! ([`FlowStateDatabase::merge_remote`]). Two read paths turn its state
//! into outbound messages: the dirty set for incremental flooding and the
//! snapshot for full synchronization.
//!
//! ## Design Notes
//!
//! - **Sequence-numbered merge**: a remote entry replaces the stored copy only
//!   when its sequence number is strictly greater
//! - **Tombstones**: withdrawn entries are kept until aged out so neighbors
//!   learn of the withdrawal
//! - **Split horizon**: the port an entry was learned from is recorded as its
//!   [`Origin`]
//! - **No persistence**: a restarted node starts empty and re-enrolls

pub mod database;

pub use database::{
    AgingReport, DatabaseConfig, FloodCapture, FlowStateDatabase, MergeOutcome, MergeSummary,
    ModifiedEntry, Origin, StoredEntry,
};
