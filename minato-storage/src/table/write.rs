//! Write pipeline: puts accumulate into the current block, full blocks
//! queue to a background sender, and `finish` drains whatever is left
//! before joining the cluster-wide completion barrier.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use minato_core::error::{Error, Result};
use minato_core::{
    BlockNumber, ClusterView, DataBlock, HolderId, MessageKind, Metrics, Record, TableConfig,
    Transport,
};

use crate::queue::BlockQueue;

use super::TableInfo;

/// Buffered writer for one table.
///
/// Records accumulate in the current block; once it reaches the enqueue
/// threshold (or would overflow the rotation window) it moves to the
/// hand-off queue, where a background task picks a destination holder
/// and transmits it. Nothing is durable until [`TableWriter::finish`]
/// returns: that call drains both the current block and the queue, then
/// holds every writer at the barrier until all holders acknowledge.
pub struct TableWriter {
    info: TableInfo,
    config: TableConfig,
    transport: Arc<dyn Transport>,
    cluster: Arc<dyn ClusterView>,
    metrics: Metrics,
    state: Option<WriteState>,
}

struct WriteState {
    queue: Arc<BlockQueue>,
    current: DataBlock,
    block_number: BlockNumber,
    /// Records flushed under the current block number.
    window: u64,
    stop: watch::Sender<bool>,
    sender: JoinHandle<()>,
    send_error: Arc<Mutex<Option<Error>>>,
}

impl TableWriter {
    pub(crate) fn new(
        info: TableInfo,
        config: TableConfig,
        transport: Arc<dyn Transport>,
        cluster: Arc<dyn ClusterView>,
        metrics: Metrics,
    ) -> Self {
        Self {
            info,
            config,
            transport,
            cluster,
            metrics,
            state: None,
        }
    }

    pub fn table(&self) -> &str {
        &self.info.name
    }

    /// Block number the next accepted record lands under.
    pub fn current_block_number(&self) -> BlockNumber {
        self.state.as_ref().map_or(0, |s| s.block_number)
    }

    /// Appends one key/value pair. Waits only when the current block
    /// fills while the hand-off queue is at capacity.
    pub async fn put(&mut self, key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) {
        if self.state.is_none() {
            self.start();
        }
        let threshold = self.config.write_enqueue_threshold as u64;
        let max_block = self.info.max_block_size;
        self.metrics.record_put(1);

        let state = self.state.as_mut().unwrap();
        state
            .current
            .push(Record::copy_from(key.as_ref(), value.as_ref()));

        // Flush at the threshold, or early when one more record would
        // push this block number past the rotation window.
        let len = state.current.len() as u64;
        if len < threshold && state.window + len < max_block {
            return;
        }

        let next = DataBlock::new(self.info.name.clone(), state.block_number);
        let full = std::mem::replace(&mut state.current, next);
        state.window += full.len() as u64;
        state.queue.push(full).await;
        self.metrics.record_enqueue();

        let state = self.state.as_mut().unwrap();
        if state.window >= max_block {
            state.block_number += 1;
            state.window = 0;
            state.current.block_number = state.block_number;
            debug!(
                table = %self.info.name,
                block = state.block_number,
                "rotated to next block number"
            );
        }
    }

    /// Flushes the partial current block, waits for the background
    /// sender to drain, transmits any stragglers in order and then
    /// blocks at the cluster-wide barrier until every partition holder
    /// has acknowledged. Consumes the writer: after the barrier the
    /// table is complete on the holders and safe to read.
    pub async fn finish(mut self) -> Result<()> {
        let state = match self.state.take() {
            Some(state) => state,
            // Nothing was written, but peers still expect this writer's
            // barrier signal.
            None => return self.barrier().await,
        };
        let WriteState {
            queue,
            current,
            stop,
            sender,
            send_error,
            ..
        } = state;

        if !current.is_empty() {
            debug!(
                table = %self.info.name,
                records = current.len(),
                "flushing final partial block"
            );
            queue.push(current).await;
            self.metrics.record_enqueue();
        }

        // Stop the sender and wait it out so the drain below cannot
        // interleave with an in-flight send.
        let _ = stop.send(true);
        if let Err(e) = sender.await {
            warn!(table = %self.info.name, error = %e, "sender task failed");
        }
        if let Some(err) = send_error.lock().take() {
            return Err(err);
        }

        while let Some(block) = queue.try_pop() {
            transmit(
                self.transport.as_ref(),
                self.cluster.as_ref(),
                self.info.destination,
                block,
                &self.metrics,
            )
            .await?;
        }

        self.barrier().await
    }

    async fn barrier(&self) -> Result<()> {
        info!(table = %self.info.name, "waiting on cluster write barrier");
        self.transport
            .sync_broadcast(
                MessageKind::WritesFinished,
                MessageKind::WritesDone,
                self.config.barrier_timeout,
            )
            .await?;
        self.metrics.record_barrier();
        Ok(())
    }

    fn start(&mut self) {
        info!(table = %self.info.name, "starting write pipeline");
        let queue = Arc::new(BlockQueue::new(self.config.queue_capacity));
        let (stop_tx, stop_rx) = watch::channel(false);
        let send_error = Arc::new(Mutex::new(None));
        let sender = tokio::spawn(send_loop(
            Arc::clone(&queue),
            Arc::clone(&self.transport),
            Arc::clone(&self.cluster),
            self.info.destination,
            stop_rx,
            Arc::clone(&send_error),
            self.metrics.clone(),
        ));
        self.state = Some(WriteState {
            queue,
            current: DataBlock::new(self.info.name.clone(), 0),
            block_number: 0,
            window: 0,
            stop: stop_tx,
            sender,
            send_error,
        });
    }
}

impl Drop for TableWriter {
    fn drop(&mut self) {
        if let Some(state) = &self.state {
            if !state.current.is_empty() || !state.queue.is_empty() {
                warn!(
                    table = %self.info.name,
                    "writer dropped without finish; buffered records discarded"
                );
            }
        }
    }
}

async fn send_loop(
    queue: Arc<BlockQueue>,
    transport: Arc<dyn Transport>,
    cluster: Arc<dyn ClusterView>,
    destination: Option<HolderId>,
    mut stop: watch::Receiver<bool>,
    send_error: Arc<Mutex<Option<Error>>>,
    metrics: Metrics,
) {
    loop {
        tokio::select! {
            block = queue.pop() => {
                // Keep consuming on error so producers never wedge on a
                // full queue; the first failure is reported at finish.
                if let Err(e) = transmit(
                    transport.as_ref(),
                    cluster.as_ref(),
                    destination,
                    block,
                    &metrics,
                )
                .await
                {
                    warn!(error = %e, "block transmission failed");
                    let mut slot = send_error.lock();
                    if slot.is_none() {
                        *slot = Some(e);
                    }
                }
            }
            _ = stop.changed() => {
                debug!("sender task stopped");
                return;
            }
        }
    }
}

/// Picks the destination holder and delivers one block. Tables without
/// a fixed destination read the holder count on every call, so a
/// membership change steers the very next block.
async fn transmit(
    transport: &dyn Transport,
    cluster: &dyn ClusterView,
    destination: Option<HolderId>,
    block: DataBlock,
    metrics: &Metrics,
) -> Result<()> {
    let dest = match destination {
        Some(holder) => holder,
        None => {
            let holders = cluster.partition_holder_count();
            if holders == 0 {
                return Err(Error::Transport {
                    message: "no partition holders registered".to_string(),
                });
            }
            (block.block_number % holders as u64) as HolderId
        }
    };
    debug!(
        table = %block.table,
        block = block.block_number,
        dest,
        records = block.len(),
        "sending block"
    );
    transport.send(dest, MessageKind::PutBlock, block).await?;
    metrics.record_send();
    Ok(())
}
