//! The encoding seam between link-state objects and payload bytes.
//!
//! Two object classes exist on the wire. The class travels beside the
//! payload and selects the decode path through a fixed table; payload
//! bytes are never sniffed to guess their type.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::canonical::{canonical_entry_bytes, canonical_group_bytes, decode_entry, decode_group};
use crate::entry::{FlowStateEntry, FlowStateGroup};
use crate::error::{CoreError, Result};

/// Object class of a single flow state entry.
pub const FLOW_STATE_OBJECT_CLASS: &str = "flowstateobject";

/// Object class of a flow state group.
pub const FLOW_STATE_GROUP_OBJECT_CLASS: &str = "flowstateobjectgroup";

/// Discriminator selecting how a payload is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectClass {
    /// A single [`FlowStateEntry`].
    FlowState,
    /// A [`FlowStateGroup`].
    FlowStateGroup,
}

impl ObjectClass {
    /// The wire name of this class.
    pub const fn name(&self) -> &'static str {
        match self {
            ObjectClass::FlowState => FLOW_STATE_OBJECT_CLASS,
            ObjectClass::FlowStateGroup => FLOW_STATE_GROUP_OBJECT_CLASS,
        }
    }

    /// Look up a class by wire name.
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            FLOW_STATE_OBJECT_CLASS => Ok(ObjectClass::FlowState),
            FLOW_STATE_GROUP_OBJECT_CLASS => Ok(ObjectClass::FlowStateGroup),
            other => Err(CoreError::UnknownObjectClass(other.to_string())),
        }
    }
}

impl fmt::Display for ObjectClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A decoded payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedObject {
    Entry(FlowStateEntry),
    Group(FlowStateGroup),
}

impl DecodedObject {
    /// The class this object was decoded as.
    pub fn class(&self) -> ObjectClass {
        match self {
            DecodedObject::Entry(_) => ObjectClass::FlowState,
            DecodedObject::Group(_) => ObjectClass::FlowStateGroup,
        }
    }
}

/// Encoding collaborator.
///
/// Implementations must be thread-safe (Send + Sync).
pub trait Encoder: Send + Sync {
    /// Encode a single entry.
    fn encode_entry(&self, entry: &FlowStateEntry) -> Result<Vec<u8>>;

    /// Encode a group of entries.
    fn encode_group(&self, group: &FlowStateGroup) -> Result<Vec<u8>>;

    /// Decode a payload declared as `class`.
    fn decode(&self, bytes: &[u8], class: ObjectClass) -> Result<DecodedObject>;
}

/// Canonical CBOR encoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct CborEncoder;

impl Encoder for CborEncoder {
    fn encode_entry(&self, entry: &FlowStateEntry) -> Result<Vec<u8>> {
        canonical_entry_bytes(entry)
    }

    fn encode_group(&self, group: &FlowStateGroup) -> Result<Vec<u8>> {
        canonical_group_bytes(group)
    }

    fn decode(&self, bytes: &[u8], class: ObjectClass) -> Result<DecodedObject> {
        match class {
            ObjectClass::FlowState => decode_entry(bytes).map(DecodedObject::Entry),
            ObjectClass::FlowStateGroup => decode_group(bytes).map(DecodedObject::Group),
        }
    }
}
