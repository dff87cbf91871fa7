//! PduForwarding: the facade the surrounding process talks to.
//!
//! Brings the database, the gossip engines and the routing computation
//! together behind the five inbound operations, and runs the periodic
//! work (flooding, aging, resync, coalesced recompute) as tokio tasks.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use flowstate_core::{Address, CborEncoder, Encoder, PortId};
use flowstate_routing::{ForwardingComputation, ForwardingTable, Metric, Rib, UniformMetric};
use flowstate_store::{AgingReport, DatabaseConfig, FlowStateDatabase, MergeSummary};
use flowstate_sync::{
    EnrollmentHandler, Messenger, PropagationEngine, PropagationReport, SyncConfig, UpdateMerger,
    WriteMessage,
};

use crate::error::{ForwardingError, Result};
use crate::scheduler::RecomputeScheduler;

/// Configuration for a forwarding instance.
#[derive(Debug, Clone)]
pub struct ForwardingConfig {
    /// Address of this node; the source of every shortest-path computation.
    pub local_address: Address,
    /// Aging configuration.
    pub database: DatabaseConfig,
    /// Outbound write configuration.
    pub sync: SyncConfig,
    /// Period of incremental flooding.
    pub propagation_interval: Duration,
    /// Period of database aging.
    pub aging_interval: Duration,
    /// Coalescing window between the first accepted merge and the recompute.
    pub recompute_delay: Duration,
    /// Period of full resync, or `None` to flood incrementally only.
    pub full_resync_interval: Option<Duration>,
}

impl ForwardingConfig {
    /// Defaults for the node at `local_address`.
    pub fn new(local_address: Address) -> Self {
        Self {
            local_address,
            ..Self::default()
        }
    }
}

impl Default for ForwardingConfig {
    fn default() -> Self {
        Self {
            local_address: Address(0),
            database: DatabaseConfig::default(),
            sync: SyncConfig::default(),
            propagation_interval: Duration::from_secs(1),
            aging_interval: Duration::from_secs(1),
            recompute_delay: Duration::from_millis(100),
            full_resync_interval: Some(Duration::from_secs(30)),
        }
    }
}

/// Link-state PDU forwarding for one node.
///
/// Cheap to clone; clones share the same database and collaborators.
pub struct PduForwarding<M, R, E = CborEncoder> {
    inner: Arc<Inner<M, R, E>>,
}

struct Inner<M, R, E> {
    config: ForwardingConfig,
    database: FlowStateDatabase,
    messenger: M,
    rib: R,
    encoder: E,
    merger: UpdateMerger,
    propagation: PropagationEngine,
    enrollment: EnrollmentHandler,
    routing: ForwardingComputation<Arc<dyn Metric>>,
    scheduler: RecomputeScheduler,
}

impl<M, R, E> Clone for PduForwarding<M, R, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<M: Messenger, R: Rib> PduForwarding<M, R, CborEncoder> {
    /// Create an instance using the CBOR encoding and hop-count routing.
    pub fn new(config: ForwardingConfig, messenger: M, rib: R) -> Self {
        Self::with_components(config, messenger, rib, CborEncoder, Arc::new(UniformMetric))
    }
}

impl<M: Messenger, R: Rib, E: Encoder> PduForwarding<M, R, E> {
    /// Create an instance with an explicit encoder and edge metric.
    pub fn with_components(
        config: ForwardingConfig,
        messenger: M,
        rib: R,
        encoder: E,
        metric: Arc<dyn Metric>,
    ) -> Self {
        let inner = Inner {
            database: FlowStateDatabase::for_node(config.local_address, config.database.clone()),
            propagation: PropagationEngine::new(config.sync.clone()),
            enrollment: EnrollmentHandler::new(config.sync.clone()),
            merger: UpdateMerger::new(),
            routing: ForwardingComputation::new(metric),
            scheduler: RecomputeScheduler::new(config.recompute_delay),
            config,
            messenger,
            rib,
            encoder,
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    /// This node's address.
    pub fn local_address(&self) -> Address {
        self.inner.config.local_address
    }

    /// The configuration.
    pub fn config(&self) -> &ForwardingConfig {
        &self.inner.config
    }

    /// The database.
    pub fn database(&self) -> &FlowStateDatabase {
        &self.inner.database
    }

    /// The messaging collaborator.
    pub fn messenger(&self) -> &M {
        &self.inner.messenger
    }

    /// The RIB collaborator.
    pub fn rib(&self) -> &R {
        &self.inner.rib
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Local flow events
    // ─────────────────────────────────────────────────────────────────────────

    /// A flow to a neighbor came up on `port_id`.
    pub fn flow_allocated(
        &self,
        address: Address,
        port_id: PortId,
        neighbor_address: Address,
        neighbor_port_id: PortId,
    ) {
        let changed = self.inner.database.add_or_update_local(
            address,
            port_id,
            neighbor_address,
            neighbor_port_id,
        );
        if changed {
            info!(
                port = %port_id,
                neighbor = %neighbor_address,
                neighbor_port = %neighbor_port_id,
                "flow allocated"
            );
            self.inner.scheduler.request();
        }
    }

    /// The flow on `port_id` went down.
    ///
    /// Returns false if no locally originated flow is bound to the port.
    pub fn flow_deallocated(&self, port_id: PortId) -> bool {
        match self.withdraw(port_id) {
            Ok(()) => {
                info!(port = %port_id, "flow deallocated");
                self.inner.scheduler.request();
                true
            }
            Err(e) => {
                debug!(error = %e, "ignoring deallocation");
                false
            }
        }
    }

    fn withdraw(&self, port_id: PortId) -> Result<()> {
        if self.inner.database.withdraw_local(port_id) {
            Ok(())
        } else {
            Err(ForwardingError::UnknownPort(port_id))
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Gossip
    // ─────────────────────────────────────────────────────────────────────────

    /// Send the full database to a neighbor that just enrolled.
    ///
    /// Returns whether a snapshot was sent. An empty database sends nothing.
    pub async fn enrollment_to_neighbor(
        &self,
        neighbor: Address,
        is_new_member: bool,
        port_id: PortId,
    ) -> bool {
        match self.enroll(neighbor, is_new_member, port_id).await {
            Ok(sent) => sent,
            Err(e) => {
                warn!(neighbor = %neighbor, port = %port_id, error = %e, "enrollment failed");
                false
            }
        }
    }

    async fn enroll(&self, neighbor: Address, is_new_member: bool, port_id: PortId) -> Result<bool> {
        let inner = &self.inner;
        let sent = inner
            .enrollment
            .enrollment_to_neighbor(
                &inner.database,
                &inner.messenger,
                &inner.encoder,
                neighbor,
                is_new_member,
                port_id,
            )
            .await?;
        Ok(sent)
    }

    /// A neighbor wrote to us through `port_id`.
    ///
    /// Returns true when the write was recognized and merged, even if every
    /// entry in it was stale. Returns false, leaving the database untouched,
    /// for single-entry writes, unknown classes and undecodable payloads.
    pub fn write_message_received(&self, message: &WriteMessage, port_id: PortId) -> bool {
        match self.merge(message, port_id) {
            Ok(summary) => {
                if summary.accepted > 0 {
                    self.inner.scheduler.request();
                }
                true
            }
            Err(e) => {
                warn!(
                    port = %port_id,
                    object_class = %message.object_class,
                    object_name = %message.object_name,
                    error = %e,
                    "rejected flow state write"
                );
                false
            }
        }
    }

    fn merge(&self, message: &WriteMessage, port_id: PortId) -> Result<MergeSummary> {
        let inner = &self.inner;
        let summary = inner
            .merger
            .merge_write(&inner.database, &inner.encoder, message, port_id)?;
        Ok(summary)
    }

    /// Run one flooding round.
    ///
    /// Returns false when no neighbor was due a write: nothing changed
    /// since the previous round, or every dirty entry is still waiting for
    /// a neighbor it can go to.
    pub async fn propagate_fsdb(&self) -> bool {
        self.propagate().await.propagated
    }

    /// Run one flooding round, reporting the details.
    pub async fn propagate(&self) -> PropagationReport {
        let inner = &self.inner;
        inner
            .propagation
            .propagate(&inner.database, &inner.messenger, &inner.encoder)
            .await
    }

    /// Send the full database to every neighbor.
    pub async fn full_resync(&self) -> PropagationReport {
        let inner = &self.inner;
        let report = inner
            .propagation
            .full_resync(&inner.database, &inner.messenger, &inner.encoder)
            .await;
        if report.propagated {
            debug!(writes = report.messages_sent, "full resync");
        }
        report
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Maintenance
    // ─────────────────────────────────────────────────────────────────────────

    /// Advance entry ages and purge expired tombstones.
    pub fn age_step(&self) -> AgingReport {
        self.inner.database.age_step()
    }

    /// Recompute and install the forwarding table now.
    ///
    /// Clears any pending coalesced recompute.
    pub fn recompute(&self) -> ForwardingTable {
        self.inner.scheduler.take();
        let inner = &self.inner;
        let table = inner
            .routing
            .recompute(inner.config.local_address, &inner.database, &inner.rib);
        info!(routes = table.len(), "forwarding table installed");
        table
    }

    /// Run the pending coalesced recompute, if any.
    pub fn flush_recompute(&self) -> Option<ForwardingTable> {
        if self.inner.scheduler.is_pending() {
            Some(self.recompute())
        } else {
            None
        }
    }

    /// Whether a recompute is pending.
    pub fn recompute_pending(&self) -> bool {
        self.inner.scheduler.is_pending()
    }
}

impl<M, R, E> PduForwarding<M, R, E>
where
    M: Messenger + 'static,
    R: Rib + 'static,
    E: Encoder + 'static,
{
    /// Start the periodic tasks on the current tokio runtime.
    ///
    /// The tasks stop when the returned handle is dropped.
    pub fn spawn_background(&self) -> BackgroundTasks {
        let config = &self.inner.config;
        let mut handles = Vec::with_capacity(4);

        let this = self.clone();
        let period = config.propagation_interval;
        handles.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                this.propagate().await;
            }
        }));

        let this = self.clone();
        let period = config.aging_interval;
        handles.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                this.age_step();
            }
        }));

        if let Some(period) = config.full_resync_interval {
            let this = self.clone();
            handles.push(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    this.full_resync().await;
                }
            }));
        }

        let this = self.clone();
        handles.push(tokio::spawn(async move {
            loop {
                if this.inner.scheduler.next_window().await {
                    this.recompute();
                }
            }
        }));

        debug!(tasks = handles.len(), "background tasks started");
        BackgroundTasks { handles }
    }
}

/// Handle to the periodic tasks; aborts them on drop.
#[derive(Debug)]
pub struct BackgroundTasks {
    handles: Vec<JoinHandle<()>>,
}

impl BackgroundTasks {
    /// Number of running tasks.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Stop every task.
    pub fn shutdown(self) {
        drop(self);
    }
}

impl Drop for BackgroundTasks {
    fn drop(&mut self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowstate_routing::MemoryRib;
    use flowstate_sync::MemoryNetwork;

    async fn node(address: u64) -> PduForwarding<flowstate_sync::MemoryMessenger, MemoryRib> {
        let network = MemoryNetwork::new();
        let messenger = network.create_messenger(Address(address)).await;
        PduForwarding::new(ForwardingConfig::new(Address(address)), messenger, MemoryRib::new())
    }

    #[tokio::test]
    async fn test_unknown_port_deallocation() {
        let node = node(1).await;
        assert!(!node.flow_deallocated(PortId(5)));
        assert!(!node.recompute_pending());
    }

    #[tokio::test]
    async fn test_allocation_schedules_recompute() {
        let node = node(1).await;
        node.flow_allocated(Address(1), PortId(1), Address(2), PortId(1));
        assert!(node.recompute_pending());

        let table = node.flush_recompute().unwrap();
        assert_eq!(table.get(Address(2)), Some(PortId(1)));
        assert!(node.flush_recompute().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_allocation_does_not_reschedule() {
        let node = node(1).await;
        node.flow_allocated(Address(1), PortId(1), Address(2), PortId(1));
        node.recompute();

        node.flow_allocated(Address(1), PortId(1), Address(2), PortId(1));
        assert!(!node.recompute_pending());
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let node = node(1).await;
        let other = node.clone();
        other.flow_allocated(Address(1), PortId(1), Address(2), PortId(1));
        assert_eq!(node.database().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_recompute_coalesces() {
        let node = node(1).await;
        let tasks = node.spawn_background();
        assert_eq!(tasks.len(), 4);

        node.flow_allocated(Address(1), PortId(1), Address(2), PortId(1));
        node.flow_allocated(Address(1), PortId(2), Address(3), PortId(1));
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(node.rib().install_count(), 1);
        assert_eq!(node.rib().table().len(), 2);

        tasks.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_aging_purges_tombstones() {
        let mut config = ForwardingConfig::new(Address(1));
        config.database.max_age = 2;
        let network = MemoryNetwork::new();
        let messenger = network.create_messenger(Address(1)).await;
        let node = PduForwarding::new(config, messenger, MemoryRib::new());
        let _tasks = node.spawn_background();

        node.flow_allocated(Address(1), PortId(1), Address(2), PortId(1));
        node.flow_deallocated(PortId(1));
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert!(node.database().is_empty());
    }
}
