use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Monotonically increasing number a writer stamps on each block it produces.
/// Also the routing key for tables without a fixed destination.
pub type BlockNumber = u64;

/// Index of a partition holder within the cluster. Holders are numbered
/// contiguously from zero so that modulo routing lands on a real node.
pub type HolderId = u32;

/// A single key/value pair. Keys and values are opaque byte strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub key: Bytes,
    pub value: Bytes,
}

impl Record {
    pub fn new(key: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Builds a record by copying borrowed bytes into owned buffers.
    pub fn copy_from(key: &[u8], value: &[u8]) -> Self {
        Self {
            key: Bytes::copy_from_slice(key),
            value: Bytes::copy_from_slice(value),
        }
    }

    /// Size of this record inside a shard frame payload: two length
    /// prefixes plus the raw bytes.
    pub fn encoded_len(&self) -> usize {
        8 + self.key.len() + self.value.len()
    }
}

/// An ordered batch of records. Blocks are the unit of queueing,
/// transmission and on-disk framing; record order inside a block is
/// the order in which the records were appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataBlock {
    pub table: String,
    pub block_number: BlockNumber,
    pub records: Vec<Record>,
}

impl DataBlock {
    pub fn new(table: impl Into<String>, block_number: BlockNumber) -> Self {
        Self {
            table: table.into(),
            block_number,
            records: Vec::new(),
        }
    }

    pub fn push(&mut self, record: Record) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Size of the frame payload this block serializes to.
    pub fn encoded_len(&self) -> usize {
        self.records.iter().map(Record::encoded_len).sum()
    }
}
