//! # Flowstate Core
//!
//! Pure primitives for the flowstate link-state engine: flow state
//! entries, groups of entries, and their canonical encoding.
//!
//! This crate contains no I/O, no locking, no networking. It is pure
//! computation over the link-state data model.
//!
//! ## Key Types
//!
//! - [`FlowStateEntry`] - One directed link fact as seen by its originator
//! - [`FlowStateGroup`] - An unordered batch of entries, the transmission unit
//! - [`EntryKey`] - The `(address, port_id)` identity of an entry
//! - [`ObjectClass`] - Discriminator selecting the decode path of a payload
//!
//! ## Encoding
//!
//! Entries and groups are encoded using deterministic CBOR. See the
//! [`canonical`] module. The [`Encoder`] trait is the seam through which
//! the rest of the workspace encodes; [`CborEncoder`] is the default.

pub mod canonical;
pub mod encoder;
pub mod entry;
pub mod error;
pub mod types;

pub use canonical::{canonical_entry_bytes, canonical_group_bytes, decode_entry, decode_group};
pub use encoder::{CborEncoder, DecodedObject, Encoder, ObjectClass};
pub use entry::{EntryKey, FlowStateEntry, FlowStateGroup};
pub use error::{CoreError, Result};
pub use types::{Address, PortId};
