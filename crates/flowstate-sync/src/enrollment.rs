//! Full-state transfer to a newly joined neighbor.

use tracing::{debug, info};

use flowstate_core::{Address, Encoder, FlowStateGroup, PortId};
use flowstate_store::FlowStateDatabase;

use crate::error::Result;
use crate::propagation::{send_group, SyncConfig};
use crate::transport::Messenger;

/// Hands a neighbor the whole database in one recovery write.
///
/// The neighbor has no prior state, so split horizon does not apply and
/// tombstones are included: the newcomer must learn of withdrawals too.
#[derive(Debug, Clone, Default)]
pub struct EnrollmentHandler {
    config: SyncConfig,
}

impl EnrollmentHandler {
    /// Create a handler.
    pub fn new(config: SyncConfig) -> Self {
        Self { config }
    }

    /// Send the snapshot to the neighbor behind `port`.
    ///
    /// Returns `Ok(false)` without sending when the database is empty.
    /// A snapshot larger than the group cap goes out as several recovery
    /// writes.
    pub async fn enrollment_to_neighbor<M, E>(
        &self,
        database: &FlowStateDatabase,
        messenger: &M,
        encoder: &E,
        neighbor: Address,
        is_new_member: bool,
        port: PortId,
    ) -> Result<bool>
    where
        M: Messenger + ?Sized,
        E: Encoder + ?Sized,
    {
        let snapshot = database.snapshot();
        if snapshot.is_empty() {
            debug!(neighbor = %neighbor, port = %port, "nothing to enroll");
            return Ok(false);
        }

        let group = FlowStateGroup::new(snapshot);
        let sent = send_group(
            &self.config,
            &self.config.recovery_object_name,
            messenger,
            encoder,
            port,
            &group,
        )
        .await?;

        info!(
            neighbor = %neighbor,
            port = %port,
            is_new_member,
            entries = group.len(),
            writes = sent,
            "sent flow state snapshot"
        );
        Ok(true)
    }
}
