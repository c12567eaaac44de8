//! Read pipeline: a background task streams shard frames into a bounded
//! queue while the foreground cursor walks record by record.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use minato_core::error::Result;
use minato_core::{DataBlock, Metrics, TableConfig};

use crate::queue::BlockQueue;
use crate::shard::{RecordStream, ShardCatalog, ShardFile};

use super::TableInfo;

/// Cursor over every record of a table, in shard order, fed by a
/// background reader task.
///
/// The reader task walks the shard catalog front to back and parks at
/// the queue whenever the consumer falls behind, so at most
/// `queue_capacity` blocks (plus the one under the cursor) sit in
/// memory at a time.
pub struct TableReader {
    info: TableInfo,
    queue: Arc<BlockQueue>,
    current: DataBlock,
    cursor: usize,
    exhausted: bool,
    reader_done: watch::Receiver<bool>,
    stop: watch::Sender<bool>,
    metrics: Metrics,
}

impl TableReader {
    pub(crate) async fn open(info: TableInfo, config: TableConfig, metrics: Metrics) -> Result<Self> {
        let catalog = ShardCatalog::discover(&info)?;
        info!(table = %info.name, shards = catalog.len(), "opening table for read");

        let queue = Arc::new(BlockQueue::new(config.queue_capacity));
        let (stop_tx, stop_rx) = watch::channel(false);
        let (done_tx, done_rx) = watch::channel(false);

        tokio::spawn(read_loop(
            catalog.into_shards(),
            info.name.clone(),
            Arc::clone(&queue),
            stop_rx,
            done_tx,
            metrics.clone(),
        ));

        let current = DataBlock::new(info.name.clone(), 0);
        let mut reader = Self {
            info,
            queue,
            current,
            cursor: 0,
            exhausted: false,
            reader_done: done_rx,
            stop: stop_tx,
            metrics,
        };

        // Park until the first block is buffered so the cursor has data
        // the moment open returns.
        loop {
            match reader.fetch_block().await {
                Some(block) if block.is_empty() => continue,
                Some(block) => {
                    reader.current = block;
                    break;
                }
                None => {
                    reader.exhausted = true;
                    break;
                }
            }
        }
        Ok(reader)
    }

    pub fn table(&self) -> &str {
        &self.info.name
    }

    /// Key/value under the cursor, or `None` once the table is
    /// exhausted. Repeated calls without `advance` see the same pair.
    pub fn read_pair(&self) -> Option<(Bytes, Bytes)> {
        if self.exhausted {
            return None;
        }
        let record = self.current.records.get(self.cursor)?;
        Some((record.key.clone(), record.value.clone()))
    }

    /// Moves the cursor past the current record, crossing into the next
    /// buffered block (waiting on the background reader) as needed.
    pub async fn advance(&mut self) {
        if self.exhausted {
            return;
        }
        self.metrics.record_read(1);
        self.cursor += 1;
        while self.cursor >= self.current.len() {
            match self.fetch_block().await {
                Some(block) => {
                    self.cursor = 0;
                    self.current = block;
                }
                None => {
                    self.exhausted = true;
                    return;
                }
            }
        }
    }

    /// Reads the pair under the cursor and advances past it.
    pub async fn next_pair(&mut self) -> Option<(Bytes, Bytes)> {
        let pair = self.read_pair()?;
        self.advance().await;
        Some(pair)
    }

    /// True when the cursor is past the last buffered record, the
    /// background reader has finished every shard and the queue is
    /// drained. While blocks are still in flight this stays false even
    /// if the cursor has momentarily run dry.
    pub fn done(&self) -> bool {
        self.exhausted
            || (self.cursor >= self.current.len()
                && *self.reader_done.borrow()
                && self.queue.is_empty())
    }

    /// Next buffered block, waiting on the reader task if it is still
    /// running. `None` means the table has no further blocks.
    async fn fetch_block(&mut self) -> Option<DataBlock> {
        loop {
            if let Some(block) = self.queue.try_pop() {
                return Some(block);
            }
            if *self.reader_done.borrow() {
                // The reader may have pushed between our miss and its
                // exit; one final pop settles it either way.
                return self.queue.try_pop();
            }
            let queue = Arc::clone(&self.queue);
            tokio::select! {
                block = queue.pop() => return Some(block),
                changed = self.reader_done.changed() => {
                    if changed.is_err() {
                        // Reader task gone without reporting; whatever
                        // is queued is all there will ever be.
                        return self.queue.try_pop();
                    }
                }
            }
        }
    }
}

impl Drop for TableReader {
    fn drop(&mut self) {
        let _ = self.stop.send(true);
    }
}

async fn read_loop(
    shards: Vec<ShardFile>,
    table: String,
    queue: Arc<BlockQueue>,
    mut stop: watch::Receiver<bool>,
    done: watch::Sender<bool>,
    metrics: Metrics,
) {
    for shard in &shards {
        let mut stream = match RecordStream::open(shard, table.as_str()) {
            Ok(stream) => stream,
            Err(e) => {
                warn!(path = ?shard.path, error = %e, "skipping unreadable shard");
                continue;
            }
        };
        while let Some(block) = stream.advance() {
            metrics.record_block_read();
            tokio::select! {
                _ = queue.push(block) => {}
                _ = stop.changed() => {
                    debug!(table = %table, "reader task stopped");
                    let _ = done.send(true);
                    return;
                }
            }
        }
    }
    debug!(table = %table, shards = shards.len(), "reader task finished");
    let _ = done.send(true);
}
