use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};

use super::{ChangeKind, ChangeSource, ChangeStream, RealtimeError, TableChange};
use crate::entities::Table;

/// in-process change fan-out fed by the in-memory repositories.
#[derive(Clone)]
pub struct ChangeHub {
    tx: broadcast::Sender<TableChange>,
}

impl ChangeHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(256);
        Self { tx }
    }

    pub fn publish(&self, table: Table, kind: ChangeKind) {
        // no subscriber is fine
        let _ = self.tx.send(TableChange { table, kind });
    }

    pub fn receiver_count(&self) -> usize { self.tx.receiver_count() }
}

impl Default for ChangeHub {
    fn default() -> Self { Self::new() }
}

#[async_trait]
impl ChangeSource for ChangeHub {
    async fn subscribe(
        &self,
        channel: &str,
        tables: &[Table],
    ) -> Result<ChangeStream, RealtimeError> {
        let mut sub = self.tx.subscribe();
        let (tx, rx) = mpsc::unbounded_channel();
        let tables = tables.to_vec();

        tracing::trace!("hub subscription `{}` - {:?}", channel, tables);

        let worker = tokio::spawn(async move {
            loop {
                let change = match sub.recv().await {
                    Ok(c) => c,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("hub subscriber lagged by {} changes", n);
                        continue;
                    },
                    Err(broadcast::error::RecvError::Closed) => break,
                };

                if !tables.contains(&change.table) {
                    continue;
                }
                if tx.send(change).is_err() {
                    break;
                }
            }
        });

        Ok(ChangeStream::new(rx, worker))
    }
}
