//! The forwarding table produced by a recompute.

use std::collections::BTreeMap;
use std::fmt;

use flowstate_core::{Address, PortId};

/// Destination address to outgoing local port.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForwardingTable {
    routes: BTreeMap<Address, PortId>,
}

impl ForwardingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Outgoing port toward `destination`.
    pub fn get(&self, destination: Address) -> Option<PortId> {
        self.routes.get(&destination).copied()
    }

    pub fn contains(&self, destination: Address) -> bool {
        self.routes.contains_key(&destination)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Routes ordered by destination.
    pub fn iter(&self) -> impl Iterator<Item = (Address, PortId)> + '_ {
        self.routes.iter().map(|(a, p)| (*a, *p))
    }
}

impl FromIterator<(Address, PortId)> for ForwardingTable {
    fn from_iter<I: IntoIterator<Item = (Address, PortId)>>(iter: I) -> Self {
        Self {
            routes: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for ForwardingTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (destination, port) in self.iter() {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{destination}->{port}")?;
            first = false;
        }
        Ok(())
    }
}
