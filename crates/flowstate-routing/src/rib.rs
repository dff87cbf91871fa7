//! The RIB collaborator that owns the installed forwarding table.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

use crate::table::ForwardingTable;

/// Receives computed tables.
///
/// Implementations must be thread-safe (Send + Sync). `install` replaces
/// the previous table wholesale and must not block on I/O.
pub trait Rib: Send + Sync {
    fn install(&self, table: ForwardingTable);
}

/// A RIB that keeps the latest table in memory.
#[derive(Debug, Default)]
pub struct MemoryRib {
    table: RwLock<ForwardingTable>,
    installs: AtomicUsize,
}

impl MemoryRib {
    pub fn new() -> Self {
        Self::default()
    }

    /// The currently installed table.
    pub fn table(&self) -> ForwardingTable {
        self.table
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// How many tables have been installed.
    pub fn install_count(&self) -> usize {
        self.installs.load(Ordering::Acquire)
    }
}

impl Rib for MemoryRib {
    fn install(&self, table: ForwardingTable) {
        *self.table.write().unwrap_or_else(PoisonError::into_inner) = table;
        self.installs.fetch_add(1, Ordering::AcqRel);
    }
}

impl<R: Rib + ?Sized> Rib for std::sync::Arc<R> {
    fn install(&self, table: ForwardingTable) {
        (**self).install(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowstate_core::{Address, PortId};

    #[test]
    fn test_install_replaces_wholesale() {
        let rib = MemoryRib::new();
        rib.install([(Address(2), PortId(1)), (Address(3), PortId(1))].into_iter().collect());
        rib.install([(Address(4), PortId(2))].into_iter().collect());

        let table = rib.table();
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(Address(4)), Some(PortId(2)));
        assert!(!table.contains(Address(2)));
        assert_eq!(rib.install_count(), 2);
    }
}
