//! Realtime change feed
//!
//! Speaks the Phoenix channel protocol used by the hosted store's realtime
//! service: join `realtime:public:<table>` with a `postgres_changes`
//! config, heartbeat every 30 seconds, and forward each change frame as a
//! [`ChangeEvent`].

use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use super::{ChangeEvent, ChangeKind, EventFilter, RemoteError};
use crate::models::Collection;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWrite = SplitSink<WsStream, Message>;
type WsRead = SplitStream<WsStream>;

const JOIN_TIMEOUT: Duration = Duration::from_secs(10);
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const JOIN_REF: &str = "1";

/// Outgoing Phoenix frame
#[derive(Debug, Serialize)]
struct OutgoingFrame<'a> {
    topic: &'a str,
    event: &'a str,
    payload: Value,
    #[serde(rename = "ref")]
    reference: String,
}

/// Incoming Phoenix frame
#[derive(Debug, Deserialize)]
struct IncomingFrame {
    topic: String,
    event: String,
    #[serde(default)]
    payload: Value,
    #[serde(rename = "ref", default)]
    reference: Option<String>,
}

/// A running channel task
pub(super) struct ChannelHandle {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl ChannelHandle {
    /// Ask the task to leave the channel and wait for it to finish
    pub(super) async fn close(self) {
        let _ = self.shutdown.send(());
        if let Err(e) = self.task.await {
            debug!("Realtime task ended abnormally: {}", e);
        }
    }
}

/// Websocket endpoint for a project URL
pub(super) fn socket_url(base_url: &str, api_key: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        base.to_string()
    };
    format!("{}/realtime/v1/websocket?apikey={}&vsn=1.0.0", base, api_key)
}

fn topic(collection: Collection) -> String {
    format!("realtime:public:{}", collection.table_name())
}

fn join_payload(collection: Collection, filter: EventFilter) -> Value {
    json!({
        "config": {
            "broadcast": { "self": false },
            "presence": { "key": "" },
            "postgres_changes": [{
                "event": filter.as_str(),
                "schema": "public",
                "table": collection.table_name(),
            }],
        }
    })
}

/// Extract a change event from a `postgres_changes` frame
fn parse_change(frame: &IncomingFrame) -> Option<ChangeEvent> {
    if frame.event != "postgres_changes" {
        return None;
    }
    let data = frame.payload.get("data")?;
    let kind = ChangeKind::parse(data.get("type")?.as_str()?)?;
    let row = |key: &str| {
        data.get(key)
            .filter(|v| v.as_object().is_some_and(|o| !o.is_empty()))
            .cloned()
    };
    Some(ChangeEvent {
        kind,
        new: row("record"),
        old: row("old_record"),
    })
}

async fn send_frame(write: &mut WsWrite, frame: &OutgoingFrame<'_>) -> Result<(), String> {
    let text = serde_json::to_string(frame).map_err(|e| e.to_string())?;
    write
        .send(Message::Text(text))
        .await
        .map_err(|e| e.to_string())
}

/// Connect, join the table's channel and spawn the forwarding task
pub(super) async fn open_channel(
    url: &str,
    collection: Collection,
    filter: EventFilter,
) -> Result<(ChannelHandle, mpsc::UnboundedReceiver<ChangeEvent>), RemoteError> {
    let failed = |reason: String| RemoteError::Subscription { collection, reason };

    debug!("Opening realtime channel for {}", collection);
    let (ws_stream, _response) = connect_async(url)
        .await
        .map_err(|e| failed(format!("connect failed: {}", e)))?;
    let (mut write, mut read) = ws_stream.split();

    let topic = topic(collection);
    let join = OutgoingFrame {
        topic: &topic,
        event: "phx_join",
        payload: join_payload(collection, filter),
        reference: JOIN_REF.to_string(),
    };
    send_frame(&mut write, &join).await.map_err(failed)?;
    wait_for_join(&mut read, &topic).await.map_err(failed)?;
    info!("Subscribed to realtime changes on {}", collection);

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let task = tokio::spawn(channel_loop(
        collection,
        filter,
        topic,
        write,
        read,
        event_tx,
        shutdown_rx,
    ));

    Ok((
        ChannelHandle {
            shutdown: shutdown_tx,
            task,
        },
        event_rx,
    ))
}

/// Wait for the server's reply to our join
async fn wait_for_join(read: &mut WsRead, topic: &str) -> Result<(), String> {
    let deadline = tokio::time::Instant::now() + JOIN_TIMEOUT;

    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            return Err("timeout waiting for join reply".to_string());
        }

        tokio::select! {
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let Ok(frame) = serde_json::from_str::<IncomingFrame>(&text) else {
                            continue;
                        };
                        if frame.topic != topic
                            || frame.event != "phx_reply"
                            || frame.reference.as_deref() != Some(JOIN_REF)
                        {
                            continue;
                        }
                        return match frame.payload.get("status").and_then(Value::as_str) {
                            Some("ok") => Ok(()),
                            _ => Err(format!("join rejected: {}", frame.payload)),
                        };
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        return Err("server closed connection during join".to_string());
                    }
                    Some(Err(e)) => return Err(format!("websocket error: {}", e)),
                    _ => {}
                }
            }
            _ = tokio::time::sleep(remaining) => {
                return Err("timeout waiting for join reply".to_string());
            }
        }
    }
}

/// Forward change frames until shutdown or disconnection
async fn channel_loop(
    collection: Collection,
    filter: EventFilter,
    topic: String,
    mut write: WsWrite,
    mut read: WsRead,
    event_tx: mpsc::UnboundedSender<ChangeEvent>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let mut heartbeat = tokio::time::interval_at(
        tokio::time::Instant::now() + HEARTBEAT_INTERVAL,
        HEARTBEAT_INTERVAL,
    );
    let mut next_ref: u64 = 2;

    loop {
        tokio::select! {
            _ = &mut shutdown_rx => {
                let leave = OutgoingFrame {
                    topic: &topic,
                    event: "phx_leave",
                    payload: json!({}),
                    reference: next_ref.to_string(),
                };
                send_frame(&mut write, &leave).await.ok();
                write.close().await.ok();
                debug!("Left realtime channel for {}", collection);
                return;
            }

            _ = heartbeat.tick() => {
                let beat = OutgoingFrame {
                    topic: "phoenix",
                    event: "heartbeat",
                    payload: json!({}),
                    reference: next_ref.to_string(),
                };
                next_ref += 1;
                if let Err(e) = send_frame(&mut write, &beat).await {
                    warn!("Realtime heartbeat for {} failed: {}", collection, e);
                    return;
                }
            }

            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let frame = match serde_json::from_str::<IncomingFrame>(&text) {
                            Ok(frame) => frame,
                            Err(e) => {
                                debug!("Ignoring unreadable realtime frame: {}", e);
                                continue;
                            }
                        };
                        if let Some(event) = parse_change(&frame) {
                            if !filter.matches(event.kind) {
                                continue;
                            }
                            if event_tx.send(event).is_err() {
                                // Nobody is listening any more
                                write.close().await.ok();
                                return;
                            }
                        } else if frame.event == "phx_error" || frame.event == "phx_close" {
                            warn!("Realtime channel for {} closed by server: {}", collection, frame.payload);
                            return;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("Realtime connection for {} closed", collection);
                        return;
                    }
                    Some(Err(e)) => {
                        warn!("Realtime connection for {} failed: {}", collection, e);
                        return;
                    }
                    _ => {}
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(text: &str) -> IncomingFrame {
        serde_json::from_str(text).unwrap()
    }

    #[test]
    fn test_socket_url() {
        assert_eq!(
            socket_url("https://abc.supabase.co/", "key"),
            "wss://abc.supabase.co/realtime/v1/websocket?apikey=key&vsn=1.0.0"
        );
        assert!(socket_url("http://localhost:54321", "k").starts_with("ws://localhost:54321/"));
    }

    #[test]
    fn test_join_payload_names_table_and_filter() {
        let payload = join_payload(Collection::TeacherProfile, EventFilter::Only(ChangeKind::Update));
        let change = &payload["config"]["postgres_changes"][0];
        assert_eq!(change["table"], "teacher_profile");
        assert_eq!(change["event"], "UPDATE");
        assert_eq!(topic(Collection::Links), "realtime:public:links");
    }

    #[test]
    fn test_parse_insert_frame() {
        let f = frame(
            r##"{"topic":"realtime:public:links","event":"postgres_changes","ref":null,
                "payload":{"ids":[1],"data":{"type":"INSERT","table":"links",
                "record":{"id":"5","title":"Notes","url":"#"},"old_record":{}}}}"##,
        );
        let event = parse_change(&f).unwrap();
        assert_eq!(event.kind, ChangeKind::Insert);
        assert_eq!(event.new.unwrap()["title"], "Notes");
        assert!(event.old.is_none());
    }

    #[test]
    fn test_parse_delete_frame() {
        let f = frame(
            r#"{"topic":"realtime:public:students","event":"postgres_changes",
                "payload":{"data":{"type":"DELETE","old_record":{"id":"1"}}}}"#,
        );
        let event = parse_change(&f).unwrap();
        assert_eq!(event.kind, ChangeKind::Delete);
        assert!(event.new.is_none());
        assert_eq!(event.old.unwrap()["id"], "1");
    }

    #[test]
    fn test_non_change_frames_are_ignored() {
        let reply = frame(r#"{"topic":"phoenix","event":"phx_reply","ref":"3","payload":{"status":"ok"}}"#);
        assert!(parse_change(&reply).is_none());
    }
}
