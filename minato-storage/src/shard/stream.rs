//! Sequential block reader over a single shard file.

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use tracing::warn;

use minato_core::error::Result;
use minato_core::DataBlock;

use super::file;
use super::ShardFile;

/// Streams the frames of one shard back as [`DataBlock`]s, one block per
/// frame, in file order.
///
/// A malformed frame marks the stream done instead of failing the whole
/// read: everything before the bad frame is served, and everything after
/// it is unreachable anyway once frame boundaries are lost.
pub struct RecordStream {
    path: PathBuf,
    table: String,
    reader: BufReader<File>,
    done: bool,
}

impl RecordStream {
    /// Opens the shard and validates its header.
    pub fn open(shard: &ShardFile, table: impl Into<String>) -> Result<Self> {
        let reader = file::open_for_read(&shard.path)?;
        Ok(Self {
            path: shard.path.clone(),
            table: table.into(),
            reader,
            done: false,
        })
    }

    /// True once every readable frame has been returned.
    pub fn done(&self) -> bool {
        self.done
    }

    /// Returns the next block, or `None` (and flips `done`) at the end
    /// of the shard.
    pub fn advance(&mut self) -> Option<DataBlock> {
        if self.done {
            return None;
        }
        match file::read_frame(&mut self.reader, &self.table, &self.path) {
            Ok(Some(block)) => Some(block),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                warn!(path = ?self.path, error = %e, "treating shard as exhausted after bad frame");
                self.done = true;
                None
            }
        }
    }
}

impl Iterator for RecordStream {
    type Item = DataBlock;

    fn next(&mut self) -> Option<DataBlock> {
        self.advance()
    }
}
