//! Supabase Realtime over its phoenix-channels websocket protocol.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::time::interval;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use super::{ChangeKind, ChangeSource, ChangeStream, RealtimeError, TableChange};
use crate::entities::Table;

const HEARTBEAT: Duration = Duration::from_secs(30);
const PROTOCOL_VSN: &str = "1.0.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhxMessage {
    pub topic: String,
    pub event: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(rename = "ref", default)]
    pub msg_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_ref: Option<String>,
}

impl PhxMessage {
    pub fn join(channel: &str, tables: &[Table], access_token: &str, msg_ref: u64) -> Self {
        let changes = tables
            .iter()
            .map(|t| json!({ "event": "*", "schema": "public", "table": t.name() }))
            .collect::<Vec<_>>();

        PhxMessage {
            topic: topic(channel),
            event: "phx_join".to_string(),
            payload: json!({
                "config": {
                    "broadcast": { "self": false },
                    "presence": { "key": "" },
                    "postgres_changes": changes,
                },
                "access_token": access_token,
            }),
            msg_ref: Some(msg_ref.to_string()),
            join_ref: Some(msg_ref.to_string()),
        }
    }

    pub fn heartbeat(msg_ref: u64) -> Self {
        PhxMessage {
            topic: "phoenix".to_string(),
            event: "heartbeat".to_string(),
            payload: json!({}),
            msg_ref: Some(msg_ref.to_string()),
            join_ref: None,
        }
    }
}

fn topic(channel: &str) -> String { format!("realtime:{}", channel) }

/// what one inbound frame means for the subscription.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Change(TableChange),
    Rejected(String),
    Closed,
    Ignored,
}

pub fn interpret(msg: &PhxMessage) -> Inbound {
    match msg.event.as_str() {
        "postgres_changes" => {
            let data = &msg.payload["data"];
            let table = data["table"].as_str().and_then(Table::from_name);

            match table {
                Some(table) => Inbound::Change(TableChange {
                    table,
                    kind: ChangeKind::from_wire(data["type"].as_str().unwrap_or_default()),
                }),
                None => Inbound::Ignored,
            }
        },
        "phx_reply" if msg.payload["status"] == "error" => Inbound::Rejected(
            msg.payload["response"]
                .get("reason")
                .and_then(Value::as_str)
                .unwrap_or("unknown reason")
                .to_string(),
        ),
        "phx_close" | "phx_error" => Inbound::Closed,
        _ => Inbound::Ignored,
    }
}

/// websocket endpoint derived from the project url.
pub fn socket_url(api_url: &str, api_key: &str) -> Result<Url, RealtimeError> {
    let mut url = Url::parse(api_url).map_err(|e| RealtimeError::Url(e.to_string()))?;

    let scheme = match url.scheme() {
        "https" => "wss",
        "http" => "ws",
        s => return Err(RealtimeError::Url(format!("unsupported scheme `{}`", s))),
    };
    url.set_scheme(scheme)
        .map_err(|_| RealtimeError::Url(api_url.to_string()))?;
    url.set_path("/realtime/v1/websocket");
    url.query_pairs_mut()
        .clear()
        .append_pair("apikey", api_key)
        .append_pair("vsn", PROTOCOL_VSN);

    Ok(url)
}

pub struct PhoenixChangeSource {
    url: Url,
    access_token: String,
}

impl PhoenixChangeSource {
    pub fn new(api_url: &str, anon_key: impl Into<String>) -> Result<Self, RealtimeError> {
        let access_token = anon_key.into();
        let url = socket_url(api_url, &access_token)?;

        Ok(Self { url, access_token })
    }
}

#[async_trait]
impl ChangeSource for PhoenixChangeSource {
    #[tracing::instrument(skip(self))]
    async fn subscribe(
        &self,
        channel: &str,
        tables: &[Table],
    ) -> Result<ChangeStream, RealtimeError> {
        let (ws, _) = connect_async(self.url.as_str()).await?;
        let (mut write, mut read) = ws.split();

        let join = PhxMessage::join(channel, tables, &self.access_token, 1);
        write
            .send(Message::Text(serde_json::to_string(&join)?))
            .await?;
        tracing::debug!("sent phx_join for `{}`", join.topic);

        let (tx, rx) = mpsc::unbounded_channel();

        let worker = tokio::spawn(async move {
            let mut beat = interval(HEARTBEAT);
            let mut next_ref = 2u64;

            loop {
                tokio::select! {
                    _ = beat.tick() => {
                        let hb = PhxMessage::heartbeat(next_ref);
                        next_ref += 1;

                        let text = match serde_json::to_string(&hb) {
                            Ok(t) => t,
                            Err(e) => break tracing::error!("cannot encode heartbeat: {}", e),
                        };
                        if let Err(e) = write.send(Message::Text(text)).await {
                            break tracing::warn!("heartbeat failed: {}", e);
                        }
                    },
                    frame = read.next() => {
                        let text = match frame {
                            Some(Ok(Message::Text(t))) => t,
                            Some(Ok(Message::Close(_))) | None => {
                                break tracing::info!("realtime socket closed");
                            },
                            Some(Ok(_)) => continue,
                            Some(Err(e)) => break tracing::warn!("realtime socket error: {}", e),
                        };

                        let msg: PhxMessage = match serde_json::from_str(&text) {
                            Ok(m) => m,
                            Err(e) => {
                                tracing::warn!("unparsable realtime frame: {}", e);
                                continue;
                            },
                        };

                        match interpret(&msg) {
                            Inbound::Change(c) => {
                                if tx.send(c).is_err() {
                                    break;
                                }
                            },
                            Inbound::Rejected(reason) => {
                                break tracing::error!("{}", RealtimeError::Rejected(reason));
                            },
                            Inbound::Closed => break tracing::info!("channel closed by server"),
                            Inbound::Ignored => tracing::trace!("ignored - {:?}", msg.event),
                        }
                    },
                }
            }
        });

        Ok(ChangeStream::new(rx, worker))
    }
}
