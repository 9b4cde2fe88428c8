//! Background writer that mirrors log mutations to the store.
//!
//! Writes are fire-and-forget: callers hand over the full value for a key and return
//! immediately. Queued writes to the same key are coalesced, so the last write wins.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::errors::StoreError;
use crate::log::{ActionLog, ACTIONS_KEY, SESSION_KEY};
use crate::store::KeyValueStore;

enum PersistCommand {
    Write { key: String, value: Value },
    Flush(oneshot::Sender<()>),
}

#[derive(Clone)]
pub struct PersistHandle {
    tx: mpsc::UnboundedSender<PersistCommand>,
}

impl PersistHandle {
    /// Start the writer task on the current runtime.
    pub fn spawn(store: Arc<dyn KeyValueStore>) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_writer(store, rx));
        (Self { tx }, task)
    }

    pub fn write(&self, key: &str, value: Value) {
        let command = PersistCommand::Write {
            key: key.to_string(),
            value,
        };
        if self.tx.send(command).is_err() {
            warn!(target: "action-log", key, "persistence worker gone; write dropped");
        }
    }

    /// Mirror the action list and its metadata.
    pub fn write_log(&self, log: &ActionLog) {
        self.write(ACTIONS_KEY, log.actions_value());
        self.write(SESSION_KEY, log.meta_value());
    }

    /// Wait until every write queued before this call has been attempted.
    pub async fn flush(&self) -> Result<(), StoreError> {
        let (ack, done) = oneshot::channel();
        self.tx
            .send(PersistCommand::Flush(ack))
            .map_err(|_| StoreError::WorkerStopped)?;
        done.await.map_err(|_| StoreError::WorkerStopped)
    }
}

async fn run_writer(
    store: Arc<dyn KeyValueStore>,
    mut rx: mpsc::UnboundedReceiver<PersistCommand>,
) {
    while let Some(first) = rx.recv().await {
        let mut pending: Vec<(String, Value)> = Vec::new();
        let mut acks = Vec::new();
        let mut absorb = |command: PersistCommand| match command {
            PersistCommand::Write { key, value } => {
                match pending.iter_mut().find(|(existing, _)| *existing == key) {
                    Some(slot) => slot.1 = value,
                    None => pending.push((key, value)),
                }
            }
            PersistCommand::Flush(ack) => acks.push(ack),
        };
        absorb(first);
        while let Ok(command) = rx.try_recv() {
            absorb(command);
        }

        for (key, value) in pending {
            match store.set(&key, value).await {
                Ok(()) => debug!(target: "action-log", key = %key, "persisted"),
                Err(err) => warn!(target: "action-log", key = %key, %err, "persist failed"),
            }
        }
        for ack in acks {
            let _ = ack.send(());
        }
    }
    debug!(target: "action-log", "persistence worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    #[tokio::test]
    async fn last_write_wins() {
        let store = MemoryStore::new();
        let (handle, _task) = PersistHandle::spawn(Arc::new(store.clone()));
        for n in 0..10 {
            handle.write("counter", json!(n));
        }
        handle.flush().await.unwrap();
        assert_eq!(store.snapshot().get("counter"), Some(&json!(9)));
    }

    #[tokio::test]
    async fn mirrors_log_and_meta() {
        let store = MemoryStore::new();
        let (handle, _task) = PersistHandle::spawn(Arc::new(store.clone()));
        let mut log = ActionLog::new();
        log.insert_wait(None, 2).unwrap();
        handle.write_log(&log);
        handle.flush().await.unwrap();

        let snapshot = store.snapshot();
        assert_eq!(snapshot[ACTIONS_KEY][0]["durationSeconds"], json!(2));
        assert_eq!(snapshot[SESSION_KEY]["dirty"], json!(true));
    }
}
