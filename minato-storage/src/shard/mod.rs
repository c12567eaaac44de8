//! Shard discovery and the on-disk shard format.
//!
//! A table's persistent form is a set of shard files in one directory,
//! each named `<table>_<number>`. The numeric suffix orders the shards;
//! nothing else about the file name matters.

pub(crate) mod file;
mod stream;

use std::fs;
use std::path::PathBuf;

use tracing::debug;

use minato_core::error::{Error, Result};

use crate::table::TableInfo;

pub use file::{SHARD_MAGIC, SHARD_VERSION};
pub use stream::RecordStream;

/// One shard on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardFile {
    pub path: PathBuf,
    /// Numeric suffix of the file name; shards are read in ascending
    /// `number` order.
    pub number: u64,
    pub len: u64,
}

/// Ordered view of every shard belonging to one table.
#[derive(Debug, Default)]
pub struct ShardCatalog {
    shards: Vec<ShardFile>,
}

impl ShardCatalog {
    /// Lists the table directory and keeps exactly the entries named
    /// `<table>_<number>` where the suffix is all digits. Anything else
    /// in the directory is ignored.
    pub fn discover(info: &TableInfo) -> Result<Self> {
        let prefix = format!("{}_", info.name);
        let unavailable = |source| Error::StorageUnavailable {
            dir: info.directory.clone(),
            source,
        };

        let entries = fs::read_dir(&info.directory).map_err(unavailable)?;
        let mut shards = Vec::new();
        for entry in entries {
            let entry = entry.map_err(unavailable)?;
            let meta = entry.metadata().map_err(unavailable)?;
            if !meta.is_file() {
                continue;
            }
            let name = entry.file_name();
            let name = match name.to_str() {
                Some(n) => n,
                None => continue,
            };
            let suffix = match name.strip_prefix(&prefix) {
                Some(s) => s,
                None => continue,
            };
            if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
                continue;
            }
            let number = match suffix.parse::<u64>() {
                Ok(n) => n,
                Err(_) => continue,
            };
            shards.push(ShardFile {
                path: entry.path(),
                number,
                len: meta.len(),
            });
        }
        shards.sort_by_key(|s| s.number);
        debug!(table = %info.name, shards = shards.len(), "discovered shards");
        Ok(Self { shards })
    }

    pub fn shards(&self) -> &[ShardFile] {
        &self.shards
    }

    pub fn len(&self) -> usize {
        self.shards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }

    pub fn into_shards(self) -> Vec<ShardFile> {
        self.shards
    }
}
