//! The flow state database.
//!
//! All state lives in memory behind one lock. Every operation takes the
//! lock once, so a whole group merge, a flood capture, or an aging step
//! is atomic with respect to every other operation on the same database.

use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, trace};

use flowstate_core::{Address, EntryKey, FlowStateEntry, PortId};

/// Configuration for database aging.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// A withdrawn entry is purged once its age exceeds this many steps.
    pub max_age: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { max_age: 30 }
    }
}

/// Where the stored copy of an entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    /// Originated by this node from a flow event.
    Local,
    /// Accepted from the neighbor behind this port.
    Remote(PortId),
}

impl Origin {
    /// The port to exclude when re-flooding (split horizon).
    pub fn excluded_port(&self) -> Option<PortId> {
        match self {
            Origin::Local => None,
            Origin::Remote(port) => Some(*port),
        }
    }
}

/// An entry with its database bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntry {
    /// The link-state fact.
    pub entry: FlowStateEntry,
    /// Not yet flooded since the last change.
    pub modified: bool,
    /// Provenance of the stored copy.
    pub origin: Origin,
    /// Created or updated since the last aging step.
    touched: bool,
}

impl StoredEntry {
    fn new(entry: FlowStateEntry, origin: Origin) -> Self {
        Self {
            entry,
            modified: true,
            origin,
            touched: true,
        }
    }

    /// Record a change: dirty, fresh, newer version.
    fn bump(&mut self) {
        self.entry.sequence_number = self.entry.sequence_number.saturating_add(1);
        self.entry.age = 0;
        self.modified = true;
        self.touched = true;
    }
}

/// Result of merging a remote entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The entry was new or newer and replaced the stored copy.
    Accepted,
    /// The entry was not newer than the stored copy (not an error).
    Stale,
    /// A neighbor held a newer copy of one of our own keys; the local
    /// entry was bumped past it (as a tombstone if no local flow backs
    /// the key) and will be re-flooded.
    Reoriginated,
}

impl MergeOutcome {
    /// Whether the stored copy was replaced by the incoming one.
    pub fn is_accepted(&self) -> bool {
        matches!(self, MergeOutcome::Accepted)
    }
}

/// Counts for a batch merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub accepted: usize,
    pub stale: usize,
    pub reoriginated: usize,
}

impl MergeSummary {
    /// Whether anything in the database changed.
    pub fn changed(&self) -> bool {
        self.accepted > 0 || self.reoriginated > 0
    }

    fn record(&mut self, outcome: MergeOutcome) {
        match outcome {
            MergeOutcome::Accepted => self.accepted += 1,
            MergeOutcome::Stale => self.stale += 1,
            MergeOutcome::Reoriginated => self.reoriginated += 1,
        }
    }
}

/// A dirty entry captured for flooding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModifiedEntry {
    pub entry: FlowStateEntry,
    pub origin: Origin,
}

/// Everything a flood round needs, read in one critical section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FloodCapture {
    pub modified: Vec<ModifiedEntry>,
    pub neighbors: Vec<PortId>,
}

/// Result of one aging step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgingReport {
    /// Entries whose age advanced.
    pub aged: usize,
    /// Tombstones removed.
    pub purged: Vec<EntryKey>,
}

/// The authoritative link-state store.
///
/// Thread-safe via RwLock. Lost on drop; a restarted node starts empty.
pub struct FlowStateDatabase {
    config: DatabaseConfig,
    local_address: Option<Address>,
    inner: RwLock<DatabaseInner>,
}

#[derive(Default)]
struct DatabaseInner {
    /// Entries by key.
    entries: BTreeMap<EntryKey, StoredEntry>,

    /// Local port id -> key of the entry it originated.
    local_ports: HashMap<PortId, EntryKey>,
}

impl FlowStateDatabase {
    /// Create an empty database that does not know which node it serves.
    pub fn new(config: DatabaseConfig) -> Self {
        Self {
            config,
            local_address: None,
            inner: RwLock::new(DatabaseInner::default()),
        }
    }

    /// Create an empty database for the node at `local_address`.
    ///
    /// Remote copies of keys under `local_address` that this node has no
    /// entry for are flushed with a newer tombstone instead of stored.
    pub fn for_node(local_address: Address, config: DatabaseConfig) -> Self {
        Self {
            local_address: Some(local_address),
            ..Self::new(config)
        }
    }

    /// The node this database serves, if known.
    pub fn local_address(&self) -> Option<Address> {
        self.local_address
    }

    /// The aging configuration.
    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    fn read(&self) -> RwLockReadGuard<'_, DatabaseInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, DatabaseInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Local mutations
    // ─────────────────────────────────────────────────────────────────────────

    /// Record a locally allocated flow.
    ///
    /// Creates a fresh entry if `port_id` is unknown. A tombstone, or an
    /// entry pointing at a different remote endpoint, is reactivated in
    /// place with the next sequence number. Returns whether anything changed.
    pub fn add_or_update_local(
        &self,
        address: Address,
        port_id: PortId,
        neighbor_address: Address,
        neighbor_port_id: PortId,
    ) -> bool {
        let mut inner = self.write();
        let key = EntryKey::new(address, port_id);

        if let Some(previous) = inner.local_ports.get(&port_id).copied() {
            if previous != key {
                // Same port re-bound under a new address: retire the old fact.
                if let Some(stored) = inner.entries.get_mut(&previous) {
                    if stored.entry.is_active() {
                        stored.entry.state = false;
                        stored.bump();
                    }
                }
            }
        }

        let changed = match inner.entries.get_mut(&key) {
            Some(stored) => {
                let unchanged = stored.entry.is_active()
                    && stored.entry.same_endpoint(neighbor_address, neighbor_port_id);
                if unchanged && stored.origin == Origin::Local {
                    false
                } else {
                    stored.entry.neighbor_address = neighbor_address;
                    stored.entry.neighbor_port_id = neighbor_port_id;
                    stored.entry.state = true;
                    stored.origin = Origin::Local;
                    stored.bump();
                    true
                }
            }
            None => {
                let entry = FlowStateEntry::new(address, port_id, neighbor_address, neighbor_port_id);
                inner.entries.insert(key, StoredEntry::new(entry, Origin::Local));
                true
            }
        };

        inner.local_ports.insert(port_id, key);
        if changed {
            debug!(%key, %neighbor_address, "local flow state recorded");
        }
        changed
    }

    /// Withdraw the entry originated for `port_id`.
    ///
    /// Returns `false` if no local entry uses that port. The entry stays
    /// as a tombstone until aged out.
    pub fn withdraw_local(&self, port_id: PortId) -> bool {
        let mut inner = self.write();

        let key = match inner.local_ports.get(&port_id) {
            Some(key) => *key,
            None => return false,
        };

        match inner.entries.get_mut(&key) {
            Some(stored) => {
                if stored.entry.is_active() {
                    stored.entry.state = false;
                    stored.bump();
                    debug!(%key, seq = stored.entry.sequence_number, "local flow withdrawn");
                }
                true
            }
            None => false,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Remote mutations
    // ─────────────────────────────────────────────────────────────────────────

    /// Merge one entry received from the neighbor behind `origin_port`.
    pub fn merge_remote(&self, entry: FlowStateEntry, origin_port: PortId) -> MergeOutcome {
        let mut inner = self.write();
        self.merge_locked(&mut inner, entry, origin_port)
    }

    /// Merge a batch of entries under a single lock acquisition.
    pub fn merge_all<I>(&self, entries: I, origin_port: PortId) -> MergeSummary
    where
        I: IntoIterator<Item = FlowStateEntry>,
    {
        let mut inner = self.write();
        let mut summary = MergeSummary::default();
        for entry in entries {
            summary.record(self.merge_locked(&mut inner, entry, origin_port));
        }
        summary
    }

    fn merge_locked(
        &self,
        inner: &mut DatabaseInner,
        mut entry: FlowStateEntry,
        origin_port: PortId,
    ) -> MergeOutcome {
        let key = entry.key();

        match inner.entries.get_mut(&key) {
            None => {
                // An expired tombstone we no longer hold must not come back.
                if entry.is_withdrawn() && entry.age > self.config.max_age {
                    trace!(%key, "dropping expired tombstone");
                    return MergeOutcome::Stale;
                }
                entry.age = 0;
                if self.local_address == Some(entry.address) {
                    // Our own key without a local flow behind it, e.g. from
                    // before a restart: flush it network-wide.
                    entry.state = false;
                    let mut stored = StoredEntry::new(entry, Origin::Local);
                    stored.bump();
                    debug!(%key, seq = stored.entry.sequence_number, "flushing unbound own flow state");
                    inner.entries.insert(key, stored);
                    return MergeOutcome::Reoriginated;
                }
                inner
                    .entries
                    .insert(key, StoredEntry::new(entry, Origin::Remote(origin_port)));
                MergeOutcome::Accepted
            }
            Some(stored) if entry.sequence_number <= stored.entry.sequence_number => {
                trace!(
                    %key,
                    incoming = entry.sequence_number,
                    stored = stored.entry.sequence_number,
                    "stale flow state discarded"
                );
                MergeOutcome::Stale
            }
            Some(stored) if stored.origin == Origin::Local => {
                stored.entry.sequence_number = entry.sequence_number;
                stored.bump();
                debug!(%key, seq = stored.entry.sequence_number, "re-originating own flow state");
                MergeOutcome::Reoriginated
            }
            Some(stored) => {
                entry.age = 0;
                stored.entry = entry;
                stored.origin = Origin::Remote(origin_port);
                stored.modified = true;
                stored.touched = true;
                MergeOutcome::Accepted
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Flooding support
    // ─────────────────────────────────────────────────────────────────────────

    /// Dirty entries, without clearing their flag.
    pub fn collect_modified(&self) -> Vec<ModifiedEntry> {
        Self::modified_locked(&self.read())
    }

    /// Dirty entries and neighbor ports, captured under one lock.
    pub fn capture_flood(&self) -> FloodCapture {
        let inner = self.read();
        FloodCapture {
            modified: Self::modified_locked(&inner),
            neighbors: Self::neighbor_ports_locked(&inner),
        }
    }

    fn modified_locked(inner: &DatabaseInner) -> Vec<ModifiedEntry> {
        inner
            .entries
            .values()
            .filter(|s| s.modified)
            .map(|s| ModifiedEntry {
                entry: s.entry.clone(),
                origin: s.origin,
            })
            .collect()
    }

    /// Clear the dirty flag of entries that were handed to the send path.
    ///
    /// The flag is only cleared when the stored version still matches the
    /// version that was sent; a newer local or remote change stays dirty.
    pub fn clear_modified<'a, I>(&self, sent: I) -> usize
    where
        I: IntoIterator<Item = &'a FlowStateEntry>,
    {
        let mut inner = self.write();
        let mut cleared = 0;
        for entry in sent {
            if let Some(stored) = inner.entries.get_mut(&entry.key()) {
                if stored.modified && stored.entry.sequence_number == entry.sequence_number {
                    stored.modified = false;
                    cleared += 1;
                }
            }
        }
        cleared
    }

    /// Ports of the locally originated active flows, i.e. the neighbors.
    pub fn neighbor_ports(&self) -> Vec<PortId> {
        Self::neighbor_ports_locked(&self.read())
    }

    fn neighbor_ports_locked(inner: &DatabaseInner) -> Vec<PortId> {
        let mut ports: Vec<PortId> = inner
            .local_ports
            .iter()
            .filter(|(_, key)| {
                inner
                    .entries
                    .get(key)
                    .map(|s| s.origin == Origin::Local && s.entry.is_active())
                    .unwrap_or(false)
            })
            .map(|(port, _)| *port)
            .collect();
        ports.sort();
        ports
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────────

    /// All entries, ordered by key.
    pub fn snapshot(&self) -> Vec<FlowStateEntry> {
        self.read().entries.values().map(|s| s.entry.clone()).collect()
    }

    /// Active (non-withdrawn) entries, ordered by key.
    pub fn active_entries(&self) -> Vec<FlowStateEntry> {
        self.read()
            .entries
            .values()
            .filter(|s| s.entry.is_active())
            .map(|s| s.entry.clone())
            .collect()
    }

    /// Look up one entry with its bookkeeping.
    pub fn get(&self, key: &EntryKey) -> Option<StoredEntry> {
        self.read().entries.get(key).cloned()
    }

    /// Number of stored entries, tombstones included.
    pub fn len(&self) -> usize {
        self.read().entries.len()
    }

    /// Whether the database holds no entries at all.
    pub fn is_empty(&self) -> bool {
        self.read().entries.is_empty()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Aging
    // ─────────────────────────────────────────────────────────────────────────

    /// Advance age on entries untouched since the previous step and purge
    /// tombstones older than `max_age`.
    pub fn age_step(&self) -> AgingReport {
        let mut inner = self.write();
        let max_age = self.config.max_age;
        let mut report = AgingReport::default();

        for stored in inner.entries.values_mut() {
            if stored.touched {
                stored.touched = false;
            } else {
                stored.entry.age = stored.entry.age.saturating_add(1);
                report.aged += 1;
            }
        }

        let expired: Vec<EntryKey> = inner
            .entries
            .iter()
            .filter(|(_, s)| s.entry.is_withdrawn() && s.entry.age > max_age)
            .map(|(key, _)| *key)
            .collect();

        for key in &expired {
            inner.entries.remove(key);
            // The port may since have been re-bound under another address.
            if inner.local_ports.get(&key.port_id) == Some(key) {
                inner.local_ports.remove(&key.port_id);
            }
        }

        if !expired.is_empty() {
            debug!(count = expired.len(), "purged expired tombstones");
        }
        report.purged = expired;
        report
    }
}

impl Default for FlowStateDatabase {
    fn default() -> Self {
        Self::new(DatabaseConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn key(address: u64, port: u64) -> EntryKey {
        EntryKey::new(Address(address), PortId(port))
    }

    fn remote(address: u64, port: u64, neighbor: u64, seq: u64) -> FlowStateEntry {
        FlowStateEntry::new(Address(address), PortId(port), Address(neighbor), PortId(1))
            .with_sequence_number(seq)
    }

    #[test]
    fn test_add_local_creates_dirty_entry() {
        let db = FlowStateDatabase::default();
        assert!(db.add_or_update_local(Address(1), PortId(1), Address(2), PortId(1)));

        let stored = db.get(&key(1, 1)).unwrap();
        assert_eq!(stored.entry.sequence_number, 1);
        assert_eq!(stored.entry.age, 0);
        assert!(stored.entry.state);
        assert!(stored.modified);
        assert_eq!(stored.origin, Origin::Local);
    }

    #[test]
    fn test_add_local_twice_is_noop() {
        let db = FlowStateDatabase::default();
        db.add_or_update_local(Address(1), PortId(1), Address(2), PortId(1));
        assert!(!db.add_or_update_local(Address(1), PortId(1), Address(2), PortId(1)));
        assert_eq!(db.get(&key(1, 1)).unwrap().entry.sequence_number, 1);
    }

    #[test]
    fn test_withdraw_local() {
        let db = FlowStateDatabase::default();
        db.add_or_update_local(Address(1), PortId(1), Address(2), PortId(1));
        db.clear_modified(&db.snapshot());

        assert!(db.withdraw_local(PortId(1)));
        assert!(!db.withdraw_local(PortId(2)));

        let stored = db.get(&key(1, 1)).unwrap();
        assert!(!stored.entry.state);
        assert_eq!(stored.entry.sequence_number, 2);
        assert!(stored.modified);
        // Tombstone retained.
        assert_eq!(db.len(), 1);
        assert!(db.active_entries().is_empty());
    }

    #[test]
    fn test_reallocation_bumps_sequence() {
        let db = FlowStateDatabase::default();
        db.add_or_update_local(Address(1), PortId(1), Address(2), PortId(1));
        db.withdraw_local(PortId(1));
        assert!(db.add_or_update_local(Address(1), PortId(1), Address(3), PortId(4)));

        let stored = db.get(&key(1, 1)).unwrap();
        assert!(stored.entry.state);
        assert_eq!(stored.entry.sequence_number, 3);
        assert_eq!(stored.entry.neighbor_address, Address(3));
    }

    #[test]
    fn test_merge_rules() {
        let db = FlowStateDatabase::default();

        assert_eq!(db.merge_remote(remote(2, 1, 3, 5), PortId(9)), MergeOutcome::Accepted);
        assert_eq!(db.merge_remote(remote(2, 1, 3, 5), PortId(9)), MergeOutcome::Stale);
        assert_eq!(db.merge_remote(remote(2, 1, 3, 4), PortId(9)), MergeOutcome::Stale);

        let mut newer = remote(2, 1, 4, 6);
        newer.age = 17;
        assert_eq!(db.merge_remote(newer, PortId(8)), MergeOutcome::Accepted);

        let stored = db.get(&key(2, 1)).unwrap();
        assert_eq!(stored.entry.sequence_number, 6);
        assert_eq!(stored.entry.neighbor_address, Address(4));
        assert_eq!(stored.entry.age, 0);
        assert_eq!(stored.origin, Origin::Remote(PortId(8)));
        assert!(stored.modified);
    }

    #[test]
    fn test_stale_merge_keeps_flag_clear() {
        let db = FlowStateDatabase::default();
        db.merge_remote(remote(2, 1, 3, 2), PortId(1));
        db.clear_modified(&db.snapshot());

        assert_eq!(db.merge_remote(remote(2, 1, 3, 2), PortId(1)), MergeOutcome::Stale);
        assert!(db.collect_modified().is_empty());
    }

    #[test]
    fn test_remote_copy_of_own_entry_reoriginates() {
        let db = FlowStateDatabase::default();
        db.add_or_update_local(Address(1), PortId(1), Address(2), PortId(1));
        db.clear_modified(&db.snapshot());

        let echoed = remote(1, 1, 2, 7).with_state(false);
        assert_eq!(db.merge_remote(echoed, PortId(1)), MergeOutcome::Reoriginated);

        let stored = db.get(&key(1, 1)).unwrap();
        assert_eq!(stored.entry.sequence_number, 8);
        assert!(stored.entry.state);
        assert_eq!(stored.origin, Origin::Local);
        assert!(stored.modified);
    }

    #[test]
    fn test_merge_all_summary() {
        let db = FlowStateDatabase::default();
        db.merge_remote(remote(3, 1, 4, 3), PortId(2));

        let summary = db.merge_all(
            vec![remote(2, 1, 3, 1), remote(3, 1, 4, 3), remote(3, 2, 5, 1)],
            PortId(2),
        );
        assert_eq!(summary.accepted, 2);
        assert_eq!(summary.stale, 1);
        assert!(summary.changed());
    }

    #[test]
    fn test_clear_modified_respects_newer_version() {
        let db = FlowStateDatabase::default();
        db.add_or_update_local(Address(1), PortId(1), Address(2), PortId(1));
        let captured = db.snapshot();

        // Changed between capture and clear.
        db.withdraw_local(PortId(1));
        assert_eq!(db.clear_modified(&captured), 0);
        assert_eq!(db.collect_modified().len(), 1);

        assert_eq!(db.clear_modified(&db.snapshot()), 1);
        assert!(db.collect_modified().is_empty());
    }

    #[test]
    fn test_neighbor_ports() {
        let db = FlowStateDatabase::default();
        db.add_or_update_local(Address(1), PortId(5), Address(2), PortId(1));
        db.add_or_update_local(Address(1), PortId(3), Address(3), PortId(1));
        db.merge_remote(remote(2, 1, 3, 1), PortId(5));
        assert_eq!(db.neighbor_ports(), vec![PortId(3), PortId(5)]);

        db.withdraw_local(PortId(5));
        assert_eq!(db.neighbor_ports(), vec![PortId(3)]);
    }

    #[test]
    fn test_aging_purges_tombstones_only() {
        let db = FlowStateDatabase::new(DatabaseConfig { max_age: 2 });
        db.add_or_update_local(Address(1), PortId(1), Address(2), PortId(1));
        db.add_or_update_local(Address(1), PortId(2), Address(3), PortId(1));
        db.withdraw_local(PortId(2));

        // First step only clears the touched marks.
        let report = db.age_step();
        assert_eq!(report.aged, 0);
        assert!(report.purged.is_empty());

        db.age_step();
        db.age_step();
        assert_eq!(db.len(), 2);
        let report = db.age_step();
        assert_eq!(report.purged, vec![key(1, 2)]);
        assert_eq!(db.len(), 1);
        assert_eq!(db.get(&key(1, 1)).unwrap().entry.age, 3);

        // The purged port is free again.
        assert!(!db.withdraw_local(PortId(2)));
    }

    #[test]
    fn test_purging_old_binding_keeps_rebound_port() {
        let db = FlowStateDatabase::new(DatabaseConfig { max_age: 1 });
        db.add_or_update_local(Address(1), PortId(1), Address(2), PortId(1));
        db.add_or_update_local(Address(3), PortId(1), Address(2), PortId(1));

        let mut purged = Vec::new();
        for _ in 0..5 {
            purged.extend(db.age_step().purged);
        }
        assert_eq!(purged, vec![key(1, 1)]);

        assert_eq!(db.neighbor_ports(), vec![PortId(1)]);
        assert!(db.withdraw_local(PortId(1)));
        assert!(db.get(&key(3, 1)).unwrap().entry.is_withdrawn());
    }

    #[test]
    fn test_unbound_own_key_is_flushed() {
        let db = FlowStateDatabase::for_node(Address(1), DatabaseConfig::default());

        let stale = remote(1, 9, 3, 4);
        assert_eq!(db.merge_remote(stale, PortId(1)), MergeOutcome::Reoriginated);

        let stored = db.get(&key(1, 9)).unwrap();
        assert!(stored.entry.is_withdrawn());
        assert_eq!(stored.entry.sequence_number, 5);
        assert_eq!(stored.origin, Origin::Local);
        assert!(stored.modified);
        assert!(db.active_entries().is_empty());
        assert!(db.neighbor_ports().is_empty());
        assert!(!db.withdraw_local(PortId(9)));

        // A later allocation on that port continues past the flushed version.
        assert!(db.add_or_update_local(Address(1), PortId(9), Address(3), PortId(1)));
        assert_eq!(db.get(&key(1, 9)).unwrap().entry.sequence_number, 6);
    }

    #[test]
    fn test_unknown_node_stores_any_key() {
        let db = FlowStateDatabase::default();
        assert_eq!(db.merge_remote(remote(1, 9, 3, 4), PortId(1)), MergeOutcome::Accepted);
    }

    #[test]
    fn test_update_resets_age() {
        let db = FlowStateDatabase::default();
        db.merge_remote(remote(2, 1, 3, 1), PortId(1));
        db.age_step();
        db.age_step();
        assert_eq!(db.get(&key(2, 1)).unwrap().entry.age, 1);

        db.merge_remote(remote(2, 1, 3, 2), PortId(1));
        assert_eq!(db.get(&key(2, 1)).unwrap().entry.age, 0);
        db.age_step();
        assert_eq!(db.get(&key(2, 1)).unwrap().entry.age, 0);
    }

    #[test]
    fn test_expired_tombstone_not_resurrected() {
        let db = FlowStateDatabase::new(DatabaseConfig { max_age: 2 });
        let mut tombstone = remote(2, 1, 3, 4).with_state(false);
        tombstone.age = 3;
        assert_eq!(db.merge_remote(tombstone, PortId(1)), MergeOutcome::Stale);
        assert!(db.is_empty());
    }

    #[derive(Debug, Clone)]
    enum Op {
        Allocate(u64, u64),
        Deallocate(u64),
        Merge(u64, u64, u64),
        Age,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (1u64..4, 2u64..5).prop_map(|(p, n)| Op::Allocate(p, n)),
            (1u64..4).prop_map(Op::Deallocate),
            (1u64..3, 1u64..4, 0u64..10).prop_map(|(a, p, s)| Op::Merge(a, p, s)),
            Just(Op::Age),
        ]
    }

    proptest! {
        #[test]
        fn test_sequence_numbers_never_decrease(ops in prop::collection::vec(op(), 1..60)) {
            let db = FlowStateDatabase::new(DatabaseConfig { max_age: 1000 });
            let mut seen: HashMap<EntryKey, u64> = HashMap::new();

            for op in ops {
                match op {
                    Op::Allocate(port, neighbor) => {
                        db.add_or_update_local(Address(1), PortId(port), Address(neighbor), PortId(1));
                    }
                    Op::Deallocate(port) => {
                        db.withdraw_local(PortId(port));
                    }
                    Op::Merge(address, port, seq) => {
                        db.merge_remote(remote(address, port, 9, seq), PortId(1));
                    }
                    Op::Age => {
                        db.age_step();
                    }
                }

                for entry in db.snapshot() {
                    let previous = seen.insert(entry.key(), entry.sequence_number).unwrap_or(0);
                    prop_assert!(entry.sequence_number >= previous);
                }
            }
        }
    }
}
