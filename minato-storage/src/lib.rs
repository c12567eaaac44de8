//! # MinatoDB Storage
//!
//! Disk-backed table pipelines:
//! - Shard files and their frame format
//! - Bounded block queues for pipeline hand-off
//! - Background reader and sender tasks
//! - The receiving-side shard sink
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                    minato-storage                    │
//! ├──────────────────────────────────────────────────────┤
//! │  • queue   - Bounded FIFO of data blocks             │
//! │  • shard   - Shard files, discovery, record streams  │
//! │  • table   - Read/write pipelines and the sink       │
//! └──────────────────────────────────────────────────────┘
//! ```

pub mod queue;
pub mod shard;
pub mod table;

// Re-export commonly used types
pub use queue::BlockQueue;
pub use shard::{RecordStream, ShardCatalog, ShardFile};
pub use table::{
    DiskTable, ShardSink, TableInfo, TableReader, TableWriter, DEFAULT_MAX_BLOCK_SIZE,
};
