use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc,
};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

use crate::{
    dto::{
        public::PublicSnapshot,
        sse::{Handshake, ServerEvent},
    },
    error::ServiceError,
    state::SharedState,
};

const EVENT_HANDSHAKE: &str = "handshake";
const EVENT_STATE_SNAPSHOT: &str = "state.snapshot";

/// A freshly opened stream: the live receiver plus the events replayed to this
/// client only (handshake, then the current snapshot).
pub struct Subscription {
    receiver: broadcast::Receiver<ServerEvent>,
    initial: Vec<ServerEvent>,
}

/// Subscribe to the display stream.
pub fn subscribe_public(state: &SharedState) -> Subscription {
    let receiver = state.public_sse().subscribe();
    let session = state.snapshot();
    let handshake = Handshake {
        stream: "public".into(),
        message: "public stream connected".into(),
        degraded: state.is_degraded(),
        token: None,
    };
    Subscription {
        receiver,
        initial: initial_events(&handshake, &PublicSnapshot::from(&session)),
    }
}

/// Subscribe to the moderator stream, issuing the admin token.
///
/// Only one moderator stream may be open at a time.
pub async fn subscribe_admin(state: &SharedState) -> Result<Subscription, ServiceError> {
    let token = state.admin_stream().claim().await.ok_or_else(|| {
        ServiceError::Unauthorized("another admin SSE stream is already active".into())
    })?;
    let receiver = state.admin_sse().subscribe();
    let session = state.snapshot();
    let handshake = Handshake {
        stream: "admin".into(),
        message: "admin stream connected".into(),
        degraded: state.is_degraded(),
        token: Some(token),
    };
    Ok(Subscription {
        receiver,
        initial: initial_events(&handshake, &session),
    })
}

fn initial_events(handshake: &Handshake, snapshot: &impl serde::Serialize) -> Vec<ServerEvent> {
    let mut events = Vec::with_capacity(2);
    for event in [
        ServerEvent::json(Some(EVENT_HANDSHAKE.to_string()), handshake),
        ServerEvent::json(Some(EVENT_STATE_SNAPSHOT.to_string()), snapshot),
    ] {
        match event {
            Ok(event) => events.push(event),
            Err(err) => warn!(error = %err, "failed to serialize initial SSE event"),
        }
    }
    events
}

/// Identifies the target SSE stream so we can perform stream-specific
/// bookkeeping when the connection is torn down.
#[derive(Clone)]
pub enum StreamKind {
    Public,
    /// Carries the shared state so teardown can release the admin token.
    Admin(SharedState),
}

fn to_event(payload: ServerEvent) -> Event {
    let event = Event::default().data(payload.data);
    match payload.event {
        Some(name) => event.event(name),
        None => event,
    }
}

/// Convert a subscription into an SSE response, forwarding events and
/// cleaning up once the client disconnects.
pub fn to_sse_stream(
    subscription: Subscription,
    kind: StreamKind,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let Subscription {
        mut receiver,
        initial,
    } = subscription;
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        for payload in initial {
            if tx.send(Ok(to_event(payload))).await.is_err() {
                break;
            }
        }

        loop {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(payload) => {
                            if tx.send(Ok(to_event(payload))).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(skipped)) => {
                            // The next snapshot brings the client back in sync.
                            debug!(skipped, "SSE subscriber lagged");
                            continue;
                        }
                    }
                }
            }
        }

        match kind {
            StreamKind::Public => info!("public SSE stream disconnected"),
            StreamKind::Admin(state) => {
                state.admin_stream().release().await;
                info!("admin SSE stream disconnected")
            }
        }
    });

    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::kv_store::MemoryStore,
        services::audio::RecordingAudio,
        state::{AppState, arbitration::ManualClock},
    };

    fn state() -> SharedState {
        AppState::with_collaborators(
            AppConfig::default(),
            Arc::new(MemoryStore::new()),
            Arc::new(ManualClock::new(0)),
            Arc::new(RecordingAudio::new()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn public_subscription_starts_with_handshake_and_snapshot() {
        let state = state();
        let subscription = subscribe_public(&state);
        let names: Vec<_> = subscription
            .initial
            .iter()
            .filter_map(|event| event.event.as_deref())
            .collect();
        assert_eq!(names, vec![EVENT_HANDSHAKE, EVENT_STATE_SNAPSHOT]);
        assert!(!subscription.initial[0].data.contains("token"));
    }

    #[tokio::test]
    async fn admin_stream_is_single_subscriber() {
        let state = state();
        let first = subscribe_admin(&state).await.unwrap();
        assert!(first.initial[0].data.contains("\"token\""));
        assert!(matches!(
            subscribe_admin(&state).await,
            Err(ServiceError::Unauthorized(_))
        ));

        state.admin_stream().release().await;
        assert!(subscribe_admin(&state).await.is_ok());
    }
}
