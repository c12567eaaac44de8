//! Disk-backed partitioned tables.
//!
//! A table moves through two independent pipelines, each pairing a
//! foreground cursor with one background task and one bounded queue:
//!
//! ```text
//!  write:  put() ──▶ current block ──▶ BlockQueue ──▶ sender ──▶ Transport
//!  read:   shards ──▶ reader ──▶ BlockQueue ──▶ cursor ──▶ read_pair()
//! ```
//!
//! Opening a reader or writer consumes the [`DiskTable`] handle, so a
//! table is in at most one mode at a time.

mod read;
mod sink;
mod write;

pub use read::TableReader;
pub use sink::ShardSink;
pub use write::TableWriter;

use std::path::PathBuf;
use std::sync::Arc;

use minato_core::error::Result;
use minato_core::{ClusterView, HolderId, Metrics, TableConfig, Transport};

/// Records a writer accumulates under one block number before rotating
/// to the next, when the caller does not choose a size.
pub const DEFAULT_MAX_BLOCK_SIZE: u64 = 1 << 20;

/// Identity and placement of one table.
#[derive(Debug, Clone)]
pub struct TableInfo {
    pub name: String,
    /// Directory holding this table's shards.
    pub directory: PathBuf,
    /// Records written under one block number before the writer rotates
    /// to the next.
    pub max_block_size: u64,
    /// Fixed partition holder for every block of this table. `None`
    /// routes each block by `block_number % partition_holder_count`,
    /// evaluated per send.
    pub destination: Option<HolderId>,
}

impl TableInfo {
    pub fn new(name: impl Into<String>, directory: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            directory: directory.into(),
            max_block_size: DEFAULT_MAX_BLOCK_SIZE,
            destination: None,
        }
    }
}

/// Handle to one disk-backed table.
pub struct DiskTable {
    info: TableInfo,
    config: TableConfig,
    metrics: Metrics,
}

impl DiskTable {
    pub fn new(info: TableInfo, config: TableConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            info,
            config,
            metrics: Metrics::new(),
        })
    }

    pub fn info(&self) -> &TableInfo {
        &self.info
    }

    /// Another handle to this table's counters; stays valid after the
    /// table moves into a reader or writer.
    pub fn metrics(&self) -> Metrics {
        self.metrics.clone()
    }

    /// Opens the table for sequential reads. Returns once the first
    /// block is buffered, or immediately for an empty table.
    pub async fn into_reader(self) -> Result<TableReader> {
        TableReader::open(self.info, self.config, self.metrics).await
    }

    /// Opens the table for writes delivered through `transport`.
    pub fn into_writer(
        self,
        transport: Arc<dyn Transport>,
        cluster: Arc<dyn ClusterView>,
    ) -> TableWriter {
        TableWriter::new(self.info, self.config, transport, cluster, self.metrics)
    }
}
