//! Socket pumps. Each connection gets a writer task fed by a bounded outbox and a
//! forwarder that copies matching bus events into it. Chat sockets forward through
//! an [`Inbox`] and acknowledge messages after writing them.

use crate::error::ChatError;
use crate::inbox::Inbox;
use crate::protocol::error_frame;
use crate::session::Session;
use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use shortly_domain::events::Notification;
use shortly_event_bus::{EventBus, EventReceiverExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const OUTBOX_CAPACITY: usize = 64;

pub(crate) async fn serve_chat(socket: WebSocket, session: Session) {
    let (mut inbox, greeting) = match Inbox::open(session.clone()).await {
        Ok(opened) => opened,
        Err(e) => {
            error!(error = %e, "Chat socket cannot subscribe to deliveries");
            return;
        },
    };

    let (sink, mut stream) = socket.split();
    let (outbox, writer) = spawn_writer(sink, Some(session.clone()));

    let forward = outbox.clone();
    let forwarder = tokio::spawn(async move {
        while let Some(frames) = inbox.next().await {
            for frame in frames {
                if forward.send(frame).await.is_err() {
                    return;
                }
            }
        }
    });

    info!(email = %session.email(), "Chat socket connected");
    for frame in greeting {
        if outbox.send(frame).await.is_err() {
            break;
        }
    }

    while let Some(Ok(message)) = stream.next().await {
        let reply = match message {
            Message::Text(text) => session.handle_text(text.as_str()).await,
            Message::Close(_) => break,
            _ => continue,
        };
        if let Some(reply) = reply
            && outbox.send(reply).await.is_err()
        {
            break;
        }
    }

    forwarder.abort();
    drop(outbox);
    let _ = writer.await;
    session.close();
    info!(email = %session.email(), "Chat socket disconnected");
}

/// Echoes client frames and streams bus notifications.
pub(crate) async fn serve_notifications(socket: WebSocket, events: EventBus) {
    let mut notifications = match events.subscribe::<Notification>() {
        Ok(rx) => rx,
        Err(e) => {
            error!(error = %e, "Notifications socket cannot subscribe");
            return;
        },
    };

    let (sink, mut stream) = socket.split();
    let (outbox, writer) = spawn_writer(sink, None);

    let forward = outbox.clone();
    let forwarder = tokio::spawn(async move {
        while let Some(notice) = notifications.next_event().await {
            let frame = json!({ "source": "notification", "topic": notice.topic, "message": notice.message });
            if forward.send(frame).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(message)) = stream.next().await {
        let reply = match message {
            Message::Text(text) => echo(text.as_str()),
            Message::Close(_) => break,
            _ => continue,
        };
        if outbox.send(reply).await.is_err() {
            break;
        }
    }

    forwarder.abort();
    drop(outbox);
    let _ = writer.await;
    debug!("Notifications socket closed");
}

pub(crate) fn echo(text: &str) -> Value {
    match serde_json::from_str::<Value>(text) {
        Ok(data) => json!({ "status": "received", "data": data }),
        Err(_) => error_frame(&ChatError::InvalidRequest { message: "Frames must be JSON".into(), context: None }),
    }
}

/// Writes queued frames in order. With a session, each incoming message is
/// acknowledged once its frame is on the wire.
fn spawn_writer(
    mut sink: futures::stream::SplitSink<WebSocket, Message>,
    acknowledger: Option<Session>,
) -> (mpsc::Sender<Value>, JoinHandle<()>) {
    let (outbox, mut frames) = mpsc::channel::<Value>(OUTBOX_CAPACITY);
    let writer = tokio::spawn(async move {
        while let Some(frame) = frames.recv().await {
            if sink.send(Message::Text(frame.to_string().into())).await.is_err() {
                break;
            }
            if let Some(session) = &acknowledger
                && let Err(e) = session.acknowledge(&frame).await
            {
                warn!(email = %session.email(), error = %e, "Failed to mark message delivered");
            }
        }
        let _ = sink.close().await;
    });
    (outbox, writer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn echo_wraps_json_frames() {
        assert_eq!(echo(r#"{"hello":1}"#), json!({"status": "received", "data": {"hello": 1}}));
    }

    #[test]
    fn echo_rejects_non_json() {
        assert_eq!(echo("nope")["error"]["type"], json!("invalid_request"));
    }
}
