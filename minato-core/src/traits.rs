use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{DataBlock, HolderId};

/// Message kinds exchanged between writers and partition holders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Carries one [`DataBlock`] to a holder.
    PutBlock,
    /// Announces that the sending writer has drained its pipeline.
    WritesFinished,
    /// Acknowledges [`MessageKind::WritesFinished`].
    WritesDone,
}

/// Delivery of blocks and control messages to partition holders.
///
/// Implementations own retry and backpressure policy; the pipelines only
/// decide *where* a block goes, never how it gets there.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Delivers one block to the given holder.
    async fn send(&self, dest: HolderId, kind: MessageKind, block: DataBlock) -> Result<()>;

    /// Sends `announce` to every holder and waits until each one answers
    /// with `expect`. `timeout` bounds the whole wait; `None` waits
    /// indefinitely.
    async fn sync_broadcast(
        &self,
        announce: MessageKind,
        expect: MessageKind,
        timeout: Option<Duration>,
    ) -> Result<()>;
}

/// Read-only view of cluster membership.
pub trait ClusterView: Send + Sync {
    /// Number of partition holders currently registered. Queried at every
    /// routing decision so that membership changes take effect on the
    /// next block, not a cached one.
    fn partition_holder_count(&self) -> usize;
}
