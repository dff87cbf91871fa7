//! Messaging abstraction for the sync protocol.
//!
//! The messenger delivers a write to the neighbor behind a local port.
//! Delivery is fire-and-forget from the engine's point of view; retries and
//! acknowledgements, if any, belong to the implementation.

use async_trait::async_trait;

use flowstate_core::PortId;

use crate::error::Result;
use crate::messages::WriteMessage;

/// Messaging collaborator.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Send a write to the neighbor reachable through `port`.
    async fn send(&self, port: PortId, message: WriteMessage) -> Result<()>;
}

#[async_trait]
impl<M: Messenger + ?Sized> Messenger for std::sync::Arc<M> {
    async fn send(&self, port: PortId, message: WriteMessage) -> Result<()> {
        (**self).send(port, message).await
    }
}

/// A simple in-memory messenger for testing.
///
/// Uses channels to simulate flows between nodes. Each link joins a
/// `(node, port)` pair on one side to a `(node, port)` pair on the other.
pub mod memory {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::{mpsc, Mutex, RwLock};

    use flowstate_core::Address;

    use crate::error::SyncError;

    /// A write as seen by the receiving node.
    #[derive(Debug, Clone)]
    pub struct Delivery {
        /// Local port on the receiving node the write arrived on.
        pub port: PortId,
        /// The write.
        pub message: WriteMessage,
    }

    /// Shared state for the memory network.
    #[derive(Default)]
    pub struct MemoryNetwork {
        /// Inbox of each node.
        inboxes: RwLock<HashMap<Address, mpsc::Sender<Delivery>>>,
        /// (node, local port) -> (peer node, peer port).
        links: RwLock<HashMap<(Address, PortId), (Address, PortId)>>,
    }

    impl MemoryNetwork {
        /// Create a new memory network.
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        /// Attach a node and get its messenger.
        pub async fn create_messenger(self: &Arc<Self>, node: Address) -> MemoryMessenger {
            let (tx, rx) = mpsc::channel(1000);
            self.inboxes.write().await.insert(node, tx);

            MemoryMessenger {
                node,
                network: Arc::clone(self),
                receiver: Mutex::new(rx),
            }
        }

        /// Join `a` on `port_a` with `b` on `port_b`.
        pub async fn connect(&self, a: Address, port_a: PortId, b: Address, port_b: PortId) {
            let mut links = self.links.write().await;
            links.insert((a, port_a), (b, port_b));
            links.insert((b, port_b), (a, port_a));
        }

        /// Tear down the link behind `a`/`port_a`, both directions.
        pub async fn disconnect(&self, a: Address, port_a: PortId) {
            let mut links = self.links.write().await;
            if let Some(peer) = links.remove(&(a, port_a)) {
                links.remove(&peer);
            }
        }
    }

    /// In-memory messenger of one node.
    pub struct MemoryMessenger {
        node: Address,
        network: Arc<MemoryNetwork>,
        receiver: Mutex<mpsc::Receiver<Delivery>>,
    }

    impl MemoryMessenger {
        /// The node this messenger belongs to.
        pub fn node(&self) -> Address {
            self.node
        }

        /// Take the next pending delivery, if any, without waiting.
        pub async fn try_recv(&self) -> Option<Delivery> {
            self.receiver.lock().await.try_recv().ok()
        }

        /// Receive with timeout.
        ///
        /// Returns None if the timeout expires before a write arrives.
        pub async fn recv_timeout(&self, timeout: std::time::Duration) -> Option<Delivery> {
            let mut rx = self.receiver.lock().await;
            tokio::time::timeout(timeout, rx.recv()).await.ok().flatten()
        }
    }

    #[async_trait]
    impl Messenger for MemoryMessenger {
        async fn send(&self, port: PortId, message: WriteMessage) -> Result<()> {
            let (peer, peer_port) = self
                .network
                .links
                .read()
                .await
                .get(&(self.node, port))
                .copied()
                .ok_or(SyncError::PeerNotConnected(port))?;

            let inboxes = self.network.inboxes.read().await;
            let inbox = inboxes
                .get(&peer)
                .ok_or_else(|| SyncError::TransportError(format!("node {peer} not attached")))?;

            inbox
                .send(Delivery {
                    port: peer_port,
                    message,
                })
                .await
                .map_err(|_| SyncError::TransportError("peer disconnected".into()))
        }
    }
}
