//! Receiving-side persistence: blocks arriving from writers land in
//! shard files, one file per table and block number.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use tracing::debug;

use minato_core::error::Result;
use minato_core::{BlockNumber, DataBlock, Metrics};

use crate::shard::file;

/// Appends incoming blocks to shard files named `<table>_<number>`,
/// keeping one open file per table so interleaved tables never clobber
/// each other's shards.
///
/// Within one table a single writer emits non-decreasing block numbers;
/// a new number finalizes that table's open file and truncates the next
/// one, which is what a fresh re-put of the same table wants.
pub struct ShardSink {
    directory: PathBuf,
    open: HashMap<String, OpenShard>,
    metrics: Metrics,
}

struct OpenShard {
    block_number: BlockNumber,
    writer: BufWriter<File>,
}

impl ShardSink {
    pub fn new(directory: impl Into<PathBuf>, metrics: Metrics) -> Self {
        Self {
            directory: directory.into(),
            open: HashMap::new(),
            metrics,
        }
    }

    pub fn directory(&self) -> &std::path::Path {
        &self.directory
    }

    /// Appends one block as a frame, opening or rotating the table's
    /// shard file as needed.
    pub fn append(&mut self, block: &DataBlock) -> Result<()> {
        let rotate = match self.open.get(&block.table) {
            Some(open) => open.block_number != block.block_number,
            None => true,
        };
        if rotate {
            self.rotate_to(block)?;
        }

        let open = self.open.get_mut(&block.table).unwrap();
        if let Err(e) = file::write_frame(&mut open.writer, block) {
            // A half-written frame must not prefix the next append.
            self.open.remove(&block.table);
            return Err(e);
        }
        self.metrics.record_dump();
        Ok(())
    }

    /// Flushes and syncs every open shard, so data a holder acknowledges
    /// at the barrier is actually on disk.
    pub fn flush(&mut self) -> Result<()> {
        for (table, open) in self.open.iter_mut() {
            open.writer.flush()?;
            open.writer.get_ref().sync_all()?;
            debug!(table = %table, block = open.block_number, "synced shard");
        }
        Ok(())
    }

    fn rotate_to(&mut self, block: &DataBlock) -> Result<()> {
        if let Some(mut open) = self.open.remove(&block.table) {
            open.writer.flush()?;
            debug!(table = %block.table, block = open.block_number, "finalized shard");
        }
        let path = self
            .directory
            .join(format!("{}_{}", block.table, block.block_number));
        debug!(path = ?path, "opening shard for append");
        let writer = file::create(&path)?;
        self.open.insert(
            block.table.clone(),
            OpenShard {
                block_number: block.block_number,
                writer,
            },
        );
        Ok(())
    }
}
