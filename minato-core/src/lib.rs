//! # MinatoDB Core
//!
//! This crate provides the fundamental building blocks for MinatoDB:
//! - Record and block types that flow through the pipelines
//! - Error types
//! - Pipeline configuration
//! - Transport and cluster traits
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                   minato-core                   │
//! ├─────────────────────────────────────────────────┤
//! │  • types         - Records and data blocks      │
//! │  • traits        - Transport & cluster views    │
//! │  • error         - Error handling               │
//! │  • config        - Pipeline tuning knobs        │
//! │  • metrics       - Shared pipeline counters     │
//! └─────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod metrics;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use config::TableConfig;
pub use error::{Error, Result};
pub use metrics::{Metrics, MetricsSnapshot};
pub use traits::{ClusterView, MessageKind, Transport};
pub use types::{BlockNumber, DataBlock, HolderId, Record};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
