//! Realtime synchronization.
//!
//! A [`ChangeSource`] delivers "something changed" signals per table. The
//! [`Synchronizer`] owns at most one live subscription per surface and runs the
//! reactions registered for the changed table, in registration order, as full
//! re-fetches. Change kinds are not distinguished and nothing is debounced.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use smallvec::SmallVec;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::entities::Table;

pub mod mock;
pub mod phoenix;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
    Other,
}

impl ChangeKind {
    pub fn from_wire(s: &str) -> Self {
        match s {
            "INSERT" => ChangeKind::Insert,
            "UPDATE" => ChangeKind::Update,
            "DELETE" => ChangeKind::Delete,
            _ => ChangeKind::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableChange {
    pub table: Table,
    pub kind: ChangeKind,
}

#[derive(Debug, Error)]
pub enum RealtimeError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid realtime url: {0}")]
    Url(String),

    #[error("channel join rejected: {0}")]
    Rejected(String),
}

/// live subscription; dropping it releases the transport.
pub struct ChangeStream {
    rx: mpsc::UnboundedReceiver<TableChange>,
    worker: Option<JoinHandle<()>>,
}

impl ChangeStream {
    pub fn new(rx: mpsc::UnboundedReceiver<TableChange>, worker: JoinHandle<()>) -> Self {
        Self {
            rx,
            worker: Some(worker),
        }
    }

    pub async fn next(&mut self) -> Option<TableChange> { self.rx.recv().await }
}

impl Drop for ChangeStream {
    fn drop(&mut self) {
        if let Some(w) = self.worker.take() {
            w.abort();
        }
    }
}

#[async_trait]
pub trait ChangeSource {
    /// opens `channel` watching every table in `tables`.
    async fn subscribe(
        &self,
        channel: &str,
        tables: &[Table],
    ) -> Result<ChangeStream, RealtimeError>;
}

#[async_trait]
pub trait Reaction {
    async fn react(&self, change: TableChange);
}

type Reactions = SmallVec<[Arc<dyn Reaction + Sync + Send>; 4]>;

pub struct Synchronizer {
    channel: String,
    source: Arc<dyn ChangeSource + Sync + Send>,
    reactions: HashMap<Table, Reactions>,
    active: Mutex<Option<JoinHandle<()>>>,
}

impl Synchronizer {
    pub fn new(channel: impl Into<String>, source: Arc<dyn ChangeSource + Sync + Send>) -> Self {
        Self {
            channel: channel.into(),
            source,
            reactions: HashMap::new(),
            active: Mutex::new(None),
        }
    }

    /// registers `reaction` for every change on `table`.
    pub fn on(mut self, table: Table, reaction: Arc<dyn Reaction + Sync + Send>) -> Self {
        self.reactions.entry(table).or_default().push(reaction);
        self
    }

    pub fn watched(&self) -> Vec<Table> {
        Table::ALL
            .iter()
            .copied()
            .filter(|t| self.reactions.contains_key(t))
            .collect()
    }

    pub async fn is_active(&self) -> bool {
        self.active
            .lock()
            .await
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// subscribes, first tearing down any subscription still held.
    #[tracing::instrument(skip(self), fields(channel = %self.channel))]
    pub async fn start(&self) -> Result<(), RealtimeError> {
        let mut guard = self.active.lock().await;

        if let Some(prev) = guard.take() {
            tracing::debug!("replacing active subscription");
            prev.abort();
        }

        let tables = self.watched();
        let mut stream = self.source.subscribe(&self.channel, &tables).await?;
        let reactions = self.reactions.clone();

        let handle = tokio::spawn(async move {
            while let Some(change) = stream.next().await {
                tracing::debug!("change on {} ({:?})", change.table, change.kind);

                let targets = match reactions.get(&change.table) {
                    Some(r) => r,
                    None => continue,
                };
                for r in targets {
                    r.react(change).await;
                }
            }

            tracing::debug!("change stream closed");
        });

        *guard = Some(handle);
        tracing::info!("subscribed to {:?}", tables);

        Ok(())
    }

    /// unsubscribes; a no-op without an active subscription.
    #[tracing::instrument(skip(self), fields(channel = %self.channel))]
    pub async fn stop(&self) {
        if let Some(h) = self.active.lock().await.take() {
            h.abort();
            let _ = h.await;
            tracing::info!("unsubscribed");
        }
    }
}
