//! Strong type definitions for flowstate.
//!
//! Addresses and port ids are both small integers on the wire. They are
//! newtypes so a port id can never be passed where an address is expected.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A network address of a node in the DIF.
///
/// Ordered so that shortest-path tie-breaking is deterministic.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address(pub u64);

impl Address {
    /// Create a new address.
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the raw value.
    pub const fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Address {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// A local flow identifier.
///
/// On the originating node a port id names the flow to one neighbor, so
/// it doubles as the neighbor handle for outbound messages.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PortId(pub u64);

impl PortId {
    /// Create a new port id.
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the raw value.
    pub const fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PortId({})", self.0)
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for PortId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}
