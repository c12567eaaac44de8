//! Bounded FIFO hand-off between a pipeline and its background task.
//!
//! The queue never blocks in `try_push`/`try_pop`; those are the
//! primitives the pipelines build their progress checks on. The async
//! `push`/`pop` wrappers wait on [`Notify`] rather than polling.

use std::collections::VecDeque;

use parking_lot::Mutex;
use tokio::sync::Notify;

use minato_core::DataBlock;

/// Fixed-capacity FIFO of [`DataBlock`]s.
///
/// A failed `try_push` returns the block to the caller untouched, so a
/// producer can hold on to it and retry. `pop` is cancel safe: a block
/// only ever leaves the queue through `try_pop`, never by being parked
/// inside a cancelled future.
pub struct BlockQueue {
    inner: Mutex<VecDeque<DataBlock>>,
    capacity: usize,
    not_empty: Notify,
    not_full: Notify,
}

impl BlockQueue {
    pub fn new(capacity: usize) -> Self {
        debug_assert!(capacity >= 1);
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            not_empty: Notify::new(),
            not_full: Notify::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Appends `block` if the queue holds fewer than `capacity` blocks,
    /// otherwise hands it straight back.
    pub fn try_push(&self, block: DataBlock) -> Result<(), DataBlock> {
        let mut queue = self.inner.lock();
        if queue.len() >= self.capacity {
            return Err(block);
        }
        queue.push_back(block);
        drop(queue);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Removes the oldest block, if any.
    pub fn try_pop(&self) -> Option<DataBlock> {
        let block = self.inner.lock().pop_front();
        if block.is_some() {
            self.not_full.notify_one();
        }
        block
    }

    /// Waits for space, then appends. Cancelling the returned future
    /// drops the in-flight block; only teardown paths cancel a push.
    pub async fn push(&self, block: DataBlock) {
        let mut pending = block;
        loop {
            match self.try_push(pending) {
                Ok(()) => return,
                Err(back) => {
                    pending = back;
                    self.not_full.notified().await;
                }
            }
        }
    }

    /// Waits until a block is available and removes it.
    pub async fn pop(&self) -> DataBlock {
        loop {
            if let Some(block) = self.try_pop() {
                return block;
            }
            self.not_empty.notified().await;
        }
    }
}
