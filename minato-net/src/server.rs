//! Partition holder server: a mailbox task that persists incoming
//! blocks and answers completion barriers.

use std::path::PathBuf;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use minato_core::error::{Error, Result};
use minato_core::{HolderId, MessageKind, Metrics};
use minato_storage::ShardSink;

use crate::codec;

/// Message delivered to a holder's mailbox.
pub(crate) enum Envelope {
    /// A serialized [`minato_core::DataBlock`] with its message kind.
    Block {
        kind: MessageKind,
        payload: Vec<u8>,
    },
    /// A control message expecting an acknowledgement back.
    Control {
        kind: MessageKind,
        ack: oneshot::Sender<MessageKind>,
    },
}

/// Depth of each holder's mailbox; senders wait when a holder lags.
pub(crate) const MAILBOX_DEPTH: usize = 64;

pub(crate) struct TableServer {
    id: HolderId,
    directory: PathBuf,
    metrics: Metrics,
}

impl TableServer {
    /// Creates the holder's directory and spawns its mailbox loop.
    /// Dropping every sender stops the loop.
    pub(crate) fn spawn(
        id: HolderId,
        directory: PathBuf,
        metrics: Metrics,
    ) -> Result<mpsc::Sender<Envelope>> {
        std::fs::create_dir_all(&directory)?;
        let (tx, rx) = mpsc::channel(MAILBOX_DEPTH);
        let server = Self {
            id,
            directory,
            metrics,
        };
        tokio::spawn(server.run(rx));
        Ok(tx)
    }

    async fn run(self, mut mailbox: mpsc::Receiver<Envelope>) {
        info!(holder = self.id, directory = ?self.directory, "partition holder started");
        let mut sink = ShardSink::new(&self.directory, self.metrics.clone());
        // First block this holder failed to persist. Once set, every
        // barrier is refused: an ack would claim data that never made
        // it to disk.
        let mut failed: Option<Error> = None;

        while let Some(envelope) = mailbox.recv().await {
            match envelope {
                Envelope::Block {
                    kind: MessageKind::PutBlock,
                    payload,
                } => {
                    let block = match codec::decode_block(&payload) {
                        Ok(block) => block,
                        Err(e) => {
                            error!(holder = self.id, error = %e, "failed to decode block");
                            if failed.is_none() {
                                failed = Some(e);
                            }
                            continue;
                        }
                    };
                    debug!(
                        holder = self.id,
                        table = %block.table,
                        block = block.block_number,
                        records = block.len(),
                        "persisting block"
                    );
                    if let Err(e) = sink.append(&block) {
                        error!(holder = self.id, error = %e, "failed to persist block");
                        if failed.is_none() {
                            failed = Some(e);
                        }
                    }
                }
                Envelope::Block { kind, .. } => {
                    warn!(holder = self.id, ?kind, "unexpected data message");
                }
                Envelope::Control {
                    kind: MessageKind::WritesFinished,
                    ack,
                } => {
                    // Only acknowledge what is actually on disk. A lost
                    // block or a failed flush drops the ack and fails the
                    // barrier loudly.
                    if let Some(e) = &failed {
                        error!(holder = self.id, error = %e, "refusing barrier after lost block");
                        drop(ack);
                        continue;
                    }
                    match sink.flush() {
                        Ok(()) => {
                            debug!(holder = self.id, "acknowledging write completion");
                            let _ = ack.send(MessageKind::WritesDone);
                        }
                        Err(e) => {
                            error!(holder = self.id, error = %e, "flush on completion failed");
                            drop(ack);
                        }
                    }
                }
                Envelope::Control { kind, ack } => {
                    warn!(holder = self.id, ?kind, "unexpected control message");
                    drop(ack);
                }
            }
        }
        debug!(holder = self.id, "partition holder stopped");
    }
}
