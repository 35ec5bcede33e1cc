//! Change notifications pushed from the backend to subscribers.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::warn;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Profiles,
    Messages,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Insert,
    Update,
}

/// A committed row change. `record` is the row as the backend saw it
/// at commit time.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub table: Table,
    pub kind: ChangeKind,
    pub record: Value,
}

/// Fan-out of committed changes, in commit order.
#[derive(Debug, Clone)]
pub struct PushChannel {
    tx: broadcast::Sender<ChangeEvent>,
}

impl PushChannel {
    pub fn new() -> Self {
        Self {
            tx: broadcast::channel(CHANNEL_CAPACITY).0,
        }
    }

    pub fn publish(&self, event: ChangeEvent) {
        // No subscribers is fine.
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self, table: Table, kind: ChangeKind) -> ChangeStream {
        ChangeStream {
            rx: self.tx.subscribe(),
            table,
            kind,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for PushChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// Subscription to one table and change kind. Dropping it unsubscribes.
#[derive(Debug)]
pub struct ChangeStream {
    rx: broadcast::Receiver<ChangeEvent>,
    table: Table,
    kind: ChangeKind,
}

impl ChangeStream {
    /// Next matching change, or `None` once the channel is closed.
    ///
    /// Changes lost to lag are not replayed.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if event.table == self.table && event.kind == self.kind => {
                    return Some(event);
                }
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, table = ?self.table, "push channel lagged, changes dropped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}
