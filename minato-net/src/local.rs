//! Single-process cluster wiring: partition holders as tasks, the
//! transport as channels between them.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::{mpsc, oneshot};
use tokio::time;
use tracing::{debug, info};

use minato_core::error::{Error, Result};
use minato_core::{ClusterView, DataBlock, HolderId, MessageKind, Metrics, Transport};

use crate::codec;
use crate::server::{Envelope, TableServer};

/// Registry of the partition holders living inside this process.
///
/// Holders are numbered in registration order starting at zero, which
/// is exactly what `block_number % holder_count` routing assumes.
pub struct LocalCluster {
    inner: Arc<ClusterInner>,
}

struct ClusterInner {
    nodes: RwLock<HashMap<HolderId, mpsc::Sender<Envelope>>>,
    metrics: Metrics,
}

impl LocalCluster {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ClusterInner {
                nodes: RwLock::new(HashMap::new()),
                metrics: Metrics::new(),
            }),
        }
    }

    /// Spawns a holder persisting to `directory` and returns its id.
    /// Must be called from within a tokio runtime.
    pub fn add_holder(&self, directory: impl AsRef<Path>) -> Result<HolderId> {
        let mut nodes = self.inner.nodes.write();
        let id = nodes.len() as HolderId;
        let mailbox = TableServer::spawn(
            id,
            directory.as_ref().to_path_buf(),
            self.inner.metrics.clone(),
        )?;
        nodes.insert(id, mailbox);
        info!(holder = id, "registered partition holder");
        Ok(id)
    }

    pub fn holder_count(&self) -> usize {
        self.inner.nodes.read().len()
    }

    /// Counters aggregated across every holder of this cluster.
    pub fn metrics(&self) -> Metrics {
        self.inner.metrics.clone()
    }

    /// A sending handle for writers. Implements [`Transport`] and
    /// [`ClusterView`]; clone it freely.
    pub fn handle(&self) -> ClusterHandle {
        ClusterHandle {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Default for LocalCluster {
    fn default() -> Self {
        Self::new()
    }
}

/// Writer-side view of a [`LocalCluster`].
#[derive(Clone)]
pub struct ClusterHandle {
    inner: Arc<ClusterInner>,
}

impl ClusterHandle {
    fn mailbox(&self, dest: HolderId) -> Result<mpsc::Sender<Envelope>> {
        self.inner
            .nodes
            .read()
            .get(&dest)
            .cloned()
            .ok_or(Error::Transport {
                message: format!("unknown partition holder {}", dest),
            })
    }
}

#[async_trait]
impl Transport for ClusterHandle {
    async fn send(&self, dest: HolderId, kind: MessageKind, block: DataBlock) -> Result<()> {
        let payload = codec::encode_block(&block)?;
        // The mailbox sender is cloned out so no lock is held across
        // the await below.
        let mailbox = self.mailbox(dest)?;
        mailbox
            .send(Envelope::Block { kind, payload })
            .await
            .map_err(|_| Error::Closed {
                channel: "holder mailbox",
            })
    }

    async fn sync_broadcast(
        &self,
        announce: MessageKind,
        expect: MessageKind,
        timeout: Option<Duration>,
    ) -> Result<()> {
        // Snapshot the membership once; holders joining mid-barrier
        // have nothing to acknowledge.
        let mut mailboxes: Vec<(HolderId, mpsc::Sender<Envelope>)> = {
            let nodes = self.inner.nodes.read();
            nodes.iter().map(|(id, tx)| (*id, tx.clone())).collect()
        };
        mailboxes.sort_by_key(|(id, _)| *id);
        debug!(peers = mailboxes.len(), ?announce, "broadcasting completion barrier");

        // A clogged mailbox stalls the fan-out itself, so the timeout
        // bounds the whole round, not just the ack wait.
        let round = async move {
            let mut pending = Vec::with_capacity(mailboxes.len());
            for (id, mailbox) in mailboxes {
                let (ack_tx, ack_rx) = oneshot::channel();
                mailbox
                    .send(Envelope::Control {
                        kind: announce,
                        ack: ack_tx,
                    })
                    .await
                    .map_err(|_| Error::Closed {
                        channel: "holder mailbox",
                    })?;
                pending.push((id, ack_rx));
            }
            collect_acks(pending, expect).await
        };

        match timeout {
            Some(limit) => time::timeout(limit, round)
                .await
                .map_err(|_| Error::PeerUnresponsive { waited: limit })?,
            None => round.await,
        }
    }
}

impl ClusterView for ClusterHandle {
    fn partition_holder_count(&self) -> usize {
        self.inner.nodes.read().len()
    }
}

async fn collect_acks(
    pending: Vec<(HolderId, oneshot::Receiver<MessageKind>)>,
    expect: MessageKind,
) -> Result<()> {
    for (id, ack) in pending {
        match ack.await {
            Ok(kind) if kind == expect => {
                debug!(holder = id, "barrier acknowledged");
            }
            Ok(kind) => {
                return Err(Error::Transport {
                    message: format!("holder {} answered {:?}, expected {:?}", id, kind, expect),
                });
            }
            Err(_) => {
                return Err(Error::Transport {
                    message: format!("holder {} closed before acknowledging", id),
                });
            }
        }
    }
    Ok(())
}
