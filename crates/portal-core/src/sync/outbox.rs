//! Best-effort outbound push queue
//!
//! Mutations enqueue a snapshot of the collection they changed and return
//! immediately. A single worker task pushes queued writes to the remote
//! store in enqueue order; failures are logged and counted, never rolled
//! back.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::models::Collection;
use crate::remote::{Record, RemoteStore};

/// Commands sent to the push worker
#[derive(Debug)]
enum OutboxCommand {
    Upsert {
        collection: Collection,
        rows: Vec<Value>,
    },
    Delete {
        collection: Collection,
        ids: Vec<String>,
    },
    /// Acknowledge once every earlier command has been handled
    Flush(oneshot::Sender<()>),
}

/// Counters of finished pushes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutboxStats {
    pub pushed: usize,
    pub failed: usize,
}

#[derive(Default)]
struct Counters {
    pushed: AtomicUsize,
    failed: AtomicUsize,
}

/// Handle to the push worker
pub struct Outbox {
    command_tx: mpsc::UnboundedSender<OutboxCommand>,
    counters: Arc<Counters>,
    task: JoinHandle<()>,
}

impl Outbox {
    /// Spawn the worker on the current runtime
    pub fn spawn(remote: Arc<dyn RemoteStore>) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let counters = Arc::new(Counters::default());
        let task = tokio::spawn(push_loop(remote, command_rx, Arc::clone(&counters)));

        Self {
            command_tx,
            counters,
            task,
        }
    }

    /// Queue an upsert of `records` into their collection
    pub fn enqueue_upsert<T: Record>(&self, records: &[T]) {
        let rows = match records.iter().map(Record::to_row).collect::<Result<Vec<_>, _>>() {
            Ok(rows) => rows,
            Err(e) => {
                warn!("Not pushing {}: {}", T::COLLECTION, e);
                return;
            }
        };
        self.send(OutboxCommand::Upsert {
            collection: T::COLLECTION,
            rows,
        });
    }

    /// Queue removal of rows by id
    pub fn enqueue_delete(&self, collection: Collection, ids: Vec<String>) {
        self.send(OutboxCommand::Delete { collection, ids });
    }

    /// Wait until everything queued so far has been pushed or has failed
    pub async fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.send(OutboxCommand::Flush(ack_tx));
        // A dropped ack means the worker is gone; nothing left to wait for
        let _ = ack_rx.await;
    }

    pub fn stats(&self) -> OutboxStats {
        OutboxStats {
            pushed: self.counters.pushed.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }

    /// Push what is queued, then stop the worker
    pub async fn shutdown(self) {
        drop(self.command_tx);
        if let Err(e) = self.task.await {
            warn!("Outbox worker ended abnormally: {}", e);
        }
    }

    fn send(&self, command: OutboxCommand) {
        if self.command_tx.send(command).is_err() {
            warn!("Outbox worker has stopped; dropping push");
        }
    }
}

async fn push_loop(
    remote: Arc<dyn RemoteStore>,
    mut command_rx: mpsc::UnboundedReceiver<OutboxCommand>,
    counters: Arc<Counters>,
) {
    while let Some(command) = command_rx.recv().await {
        let (collection, result) = match command {
            OutboxCommand::Upsert { collection, rows } => {
                let count = rows.len();
                let result = remote.upsert(collection, rows).await;
                if result.is_ok() {
                    debug!("Pushed {} rows to {}", count, collection);
                }
                (collection, result)
            }
            OutboxCommand::Delete { collection, ids } => {
                let count = ids.len();
                let result = remote.delete(collection, ids).await;
                if result.is_ok() {
                    debug!("Deleted {} rows from {}", count, collection);
                }
                (collection, result)
            }
            OutboxCommand::Flush(ack) => {
                let _ = ack.send(());
                continue;
            }
        };

        match result {
            Ok(()) => {
                counters.pushed.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                warn!("Push to {} failed: {}", collection, e);
            }
        }
    }
    debug!("Outbox worker stopped");
}
