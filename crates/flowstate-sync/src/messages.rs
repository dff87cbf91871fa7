//! Sync protocol message types.
//!
//! Flooding and recovery both travel as a management write of one object:
//! an object class naming the decode path, an object name, and the
//! encoded value.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use flowstate_core::{CoreError, EntryKey, Encoder, FlowStateEntry, FlowStateGroup, ObjectClass};

/// Object name of incremental flooding writes.
pub const FLOW_STATE_GROUP_OBJECT_NAME: &str = "/dif/management/routing/flowstateobjectgroup";

/// Object name of full-state recovery writes.
pub const FLOW_STATE_RECOVERY_OBJECT_NAME: &str =
    "/dif/management/routing/flowstateobjectgroup/recovery";

/// Prefix of single-entry object names.
pub const FLOW_STATE_OBJECT_NAME_PREFIX: &str = "/dif/management/routing/flowstateobject/";

/// A write request carrying one encoded object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteMessage {
    /// Declared class of `value`, as it appears on the wire.
    pub object_class: String,
    /// Name of the written object.
    pub object_name: String,
    /// Encoded object.
    pub value: Bytes,
}

impl WriteMessage {
    /// Build a write from already-encoded bytes.
    pub fn new(class: ObjectClass, object_name: impl Into<String>, value: impl Into<Bytes>) -> Self {
        Self {
            object_class: class.name().to_string(),
            object_name: object_name.into(),
            value: value.into(),
        }
    }

    /// Encode a group write.
    pub fn group<E: Encoder + ?Sized>(
        encoder: &E,
        object_name: &str,
        group: &FlowStateGroup,
    ) -> Result<Self, CoreError> {
        let bytes = encoder.encode_group(group)?;
        Ok(Self::new(ObjectClass::FlowStateGroup, object_name, bytes))
    }

    /// Encode a single-entry write.
    pub fn entry<E: Encoder + ?Sized>(encoder: &E, entry: &FlowStateEntry) -> Result<Self, CoreError> {
        let bytes = encoder.encode_entry(entry)?;
        Ok(Self::new(ObjectClass::FlowState, object_name_for(&entry.key()), bytes))
    }

    /// The declared object class, resolved through the fixed class table.
    pub fn class(&self) -> Result<ObjectClass, CoreError> {
        ObjectClass::from_name(&self.object_class)
    }
}

/// Object name of a single entry.
pub fn object_name_for(key: &EntryKey) -> String {
    format!("{FLOW_STATE_OBJECT_NAME_PREFIX}{key}")
}
