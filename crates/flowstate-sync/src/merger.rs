//! Validation and merging of remote updates.

use tracing::{debug, warn};

use flowstate_core::{DecodedObject, Encoder, ObjectClass, PortId};
use flowstate_store::{FlowStateDatabase, MergeSummary};

use crate::error::{Result, SyncError};
use crate::messages::WriteMessage;

/// Merges writes received from neighbors into the database.
///
/// Only group writes are synchronization input. An isolated entry carries
/// no batch context, so a single-entry write is refused before decoding.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateMerger;

impl UpdateMerger {
    /// Create a merger.
    pub fn new() -> Self {
        Self
    }

    /// Decode and merge one write that arrived on `from`.
    ///
    /// The returned summary says whether the database changed; stale or
    /// duplicate entries inside an accepted group are not errors.
    pub fn merge_write<E: Encoder + ?Sized>(
        &self,
        database: &FlowStateDatabase,
        encoder: &E,
        message: &WriteMessage,
        from: PortId,
    ) -> Result<MergeSummary> {
        let class = message.class()?;
        if class != ObjectClass::FlowStateGroup {
            warn!(
                object_class = %message.object_class,
                object_name = %message.object_name,
                port = %from,
                "refusing non-group flow state write"
            );
            return Err(SyncError::InvalidMessage(format!(
                "expected {}, got {}",
                ObjectClass::FlowStateGroup,
                class
            )));
        }

        let group = match encoder.decode(&message.value, class)? {
            DecodedObject::Group(group) => group,
            DecodedObject::Entry(_) => {
                return Err(SyncError::InvalidMessage(
                    "group write decoded to a single entry".into(),
                ))
            }
        };

        let received = group.len();
        let summary = database.merge_all(group, from);
        debug!(
            port = %from,
            received,
            accepted = summary.accepted,
            stale = summary.stale,
            "merged flow state group"
        );
        Ok(summary)
    }
}
