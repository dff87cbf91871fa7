//! Incremental flooding of changed entries.
//!
//! A flood round captures the dirty set and the neighbor list under the
//! database lock, releases it, and only then sends. Flooding is
//! edge-triggered: an entry leaves the dirty set once it has been handed
//! to every neighbor it was due for, and nothing is resent until it
//! changes again.

use std::collections::{BTreeMap, HashSet};

use tracing::{debug, warn};

use flowstate_core::{EntryKey, Encoder, FlowStateEntry, FlowStateGroup, PortId};
use flowstate_store::FlowStateDatabase;

use crate::error::Result;
use crate::messages::{WriteMessage, FLOW_STATE_GROUP_OBJECT_NAME, FLOW_STATE_RECOVERY_OBJECT_NAME};
use crate::transport::Messenger;

/// Configuration for outbound flow state writes.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Maximum entries in one group write; larger sets are split.
    pub max_entries_per_group: usize,
    /// Object name of incremental flooding writes.
    pub object_name: String,
    /// Object name of full-state recovery writes.
    pub recovery_object_name: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_entries_per_group: 100,
            object_name: FLOW_STATE_GROUP_OBJECT_NAME.to_string(),
            recovery_object_name: FLOW_STATE_RECOVERY_OBJECT_NAME.to_string(),
        }
    }
}

/// Result of a flood or resync round.
#[derive(Debug, Default)]
pub struct PropagationReport {
    /// Whether at least one write was due to some neighbor this round,
    /// whether or not its send succeeded.
    pub propagated: bool,
    /// Number of writes handed to the messenger successfully.
    pub messages_sent: usize,
    /// Number of entries sent, counted once per neighbor.
    pub entries_sent: usize,
    /// Entries whose dirty flag was cleared.
    pub entries_cleared: usize,
    /// Neighbors whose send failed.
    pub failed_ports: Vec<PortId>,
}

/// Decides what changed and floods it to neighbors.
#[derive(Debug, Clone, Default)]
pub struct PropagationEngine {
    config: SyncConfig,
}

impl PropagationEngine {
    /// Create an engine.
    pub fn new(config: SyncConfig) -> Self {
        Self { config }
    }

    /// The outbound configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Flood the dirty set.
    ///
    /// Each neighbor receives every dirty entry except those it supplied
    /// itself (split horizon). Only entries that reached at least one
    /// neighbor, and failed for none, leave the dirty set. An entry with no
    /// neighbor to go to stays dirty until one appears.
    pub async fn propagate<M, E>(
        &self,
        database: &FlowStateDatabase,
        messenger: &M,
        encoder: &E,
    ) -> PropagationReport
    where
        M: Messenger + ?Sized,
        E: Encoder + ?Sized,
    {
        let capture = database.capture_flood();
        let mut report = PropagationReport::default();

        if capture.modified.is_empty() {
            return report;
        }

        let mut sent: HashSet<EntryKey> = HashSet::new();
        let mut failed: HashSet<EntryKey> = HashSet::new();

        for (port, subset) in partition_by_neighbor(&capture.modified, &capture.neighbors) {
            if subset.is_empty() {
                continue;
            }
            report.propagated = true;

            let group = FlowStateGroup::new(subset);
            match send_group(&self.config, &self.config.object_name, messenger, encoder, port, &group)
                .await
            {
                Ok(writes) => {
                    report.messages_sent += writes;
                    report.entries_sent += group.len();
                    sent.extend(group.iter().map(FlowStateEntry::key));
                }
                Err(e) => {
                    warn!(port = %port, error = %e, "flow state flood failed");
                    report.failed_ports.push(port);
                    failed.extend(group.iter().map(FlowStateEntry::key));
                }
            }
        }

        let delivered: Vec<&FlowStateEntry> = capture
            .modified
            .iter()
            .map(|m| &m.entry)
            .filter(|e| sent.contains(&e.key()) && !failed.contains(&e.key()))
            .collect();
        report.entries_cleared = database.clear_modified(delivered);

        debug!(
            neighbors = capture.neighbors.len(),
            dirty = capture.modified.len(),
            sent = report.entries_sent,
            cleared = report.entries_cleared,
            "flow state flood round"
        );
        report
    }

    /// Send the whole database to every neighbor.
    ///
    /// Dirty flags are left alone.
    pub async fn full_resync<M, E>(
        &self,
        database: &FlowStateDatabase,
        messenger: &M,
        encoder: &E,
    ) -> PropagationReport
    where
        M: Messenger + ?Sized,
        E: Encoder + ?Sized,
    {
        let neighbors = database.neighbor_ports();
        let snapshot = database.snapshot();
        let mut report = PropagationReport::default();

        if snapshot.is_empty() {
            return report;
        }
        report.propagated = true;

        let group = FlowStateGroup::new(snapshot);
        for port in neighbors {
            match send_group(&self.config, &self.config.object_name, messenger, encoder, port, &group)
                .await
            {
                Ok(sent) => {
                    report.messages_sent += sent;
                    report.entries_sent += group.len();
                }
                Err(e) => {
                    warn!(port = %port, error = %e, "flow state resync failed");
                    report.failed_ports.push(port);
                }
            }
        }
        report
    }
}

/// Encode `group` in chunks and send each chunk through `port`.
///
/// Returns the number of writes sent. Stops at the first failure.
pub(crate) async fn send_group<M, E>(
    config: &SyncConfig,
    object_name: &str,
    messenger: &M,
    encoder: &E,
    port: PortId,
    group: &FlowStateGroup,
) -> Result<usize>
where
    M: Messenger + ?Sized,
    E: Encoder + ?Sized,
{
    let mut sent = 0;
    for chunk in group.chunks(config.max_entries_per_group) {
        let message = WriteMessage::group(encoder, object_name, &chunk)?;
        messenger.send(port, message).await?;
        sent += 1;
    }
    Ok(sent)
}

/// Split the dirty set per neighbor, leaving out each entry's origin port.
pub fn partition_by_neighbor(
    modified: &[flowstate_store::ModifiedEntry],
    neighbors: &[PortId],
) -> BTreeMap<PortId, Vec<FlowStateEntry>> {
    neighbors
        .iter()
        .map(|port| {
            let subset = modified
                .iter()
                .filter(|m| m.origin.excluded_port() != Some(*port))
                .map(|m| m.entry.clone())
                .collect();
            (*port, subset)
        })
        .collect()
}
