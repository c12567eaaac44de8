use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Tuning knobs shared by the read and write pipelines of one table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableConfig {
    /// Records accumulated in the current block before the writer hands
    /// it to the background sender.
    pub write_enqueue_threshold: usize,
    /// Blocks the hand-off queue holds before producers wait.
    pub queue_capacity: usize,
    /// Upper bound on the completion barrier wait. `None` waits until
    /// every holder acknowledges, however long that takes.
    #[serde(default)]
    pub barrier_timeout: Option<Duration>,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            write_enqueue_threshold: 128,
            queue_capacity: 8,
            barrier_timeout: None,
        }
    }
}

impl TableConfig {
    pub fn validate(&self) -> Result<()> {
        if self.write_enqueue_threshold == 0 {
            return Err(Error::Configuration {
                message: "write_enqueue_threshold must be at least 1".to_string(),
            });
        }
        if self.queue_capacity == 0 {
            return Err(Error::Configuration {
                message: "queue_capacity must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
