use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::{
        admin::SignalResponse,
        sse::NotificationLevel,
        ws::{BridgeAck, BridgeInboundMessage},
    },
    services::{buzzer_service, sse_events},
    state::{SharedState, game::TeamColor, tokens::TokenTable},
};

/// Handle the full lifecycle of a signal gateway WebSocket connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let id = Uuid::new_v4();
    info!(%id, "signal gateway connected");
    sse_events::notify_admin(&state, NotificationLevel::Info, "Signal gateway connected");

    let ack = BridgeAck {
        id,
        status: "connected".into(),
    };
    if send_json(&outbound_tx, &ack).is_err() {
        finalize(writer_task, outbound_tx).await;
        return;
    }

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                debug!(%id, payload = %text.as_str(), "received gateway frame");
                match BridgeInboundMessage::from_frame(text.as_str()) {
                    Ok(BridgeInboundMessage::Signal { token }) => {
                        let token = normalize_token(state.arbiter().tokens(), &token);
                        let outcome = buzzer_service::handle_signal(&state, &token);
                        if send_json(&outbound_tx, &SignalResponse::from(outcome)).is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        warn!(%id, error = %err, "ignoring gateway frame");
                    }
                }
            }
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) | Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(%id, error = %err, "websocket error");
                break;
            }
        }
    }

    info!(%id, "signal gateway disconnected");
    sse_events::notify_admin(
        &state,
        NotificationLevel::Warning,
        "Signal gateway disconnected",
    );

    finalize(writer_task, outbound_tx).await;
}

/// Map a full color name (`"blue"`) to that team's primary key token; other
/// tokens pass through unchanged.
pub fn normalize_token(tokens: &TokenTable, token: &str) -> String {
    TeamColor::from_name(token)
        .and_then(|team| tokens.primary_token(team))
        .map_or_else(|| token.to_string(), |primary| primary.to_string())
}

/// Serialize a payload and queue it on the writer. Fails only when the writer is gone.
fn send_json<T: serde::Serialize>(
    tx: &mpsc::UnboundedSender<Message>,
    value: &T,
) -> Result<(), ()> {
    let payload = match serde_json::to_string(value) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(error = %err, "failed to serialize gateway message");
            return Ok(());
        }
    };
    tx.send(Message::Text(payload.into())).map_err(|_| ())
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
