//! # MinatoDB Net
//!
//! In-process cluster plumbing:
//! - Partition holder servers (one mailbox task per holder)
//! - A channel-backed [`minato_core::Transport`] implementation
//! - The wire codec for block payloads
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                     minato-net                       │
//! ├──────────────────────────────────────────────────────┤
//! │  • local   - Cluster registry and writer handles     │
//! │  • server  - Holder mailbox loops and shard sinks    │
//! │  • codec   - Block payload encoding                  │
//! └──────────────────────────────────────────────────────┘
//! ```

pub mod codec;
pub mod local;
mod server;

// Re-export commonly used types
pub use local::{ClusterHandle, LocalCluster};
