use tokio::sync::{Mutex, broadcast};
use uuid::Uuid;

use crate::dto::sse::ServerEvent;

/// The two outbound streams: displays and moderator.
pub struct SseState {
    public: SseHub,
    admin: AdminSseState,
}

impl SseState {
    pub fn new(public_capacity: usize, admin_capacity: usize) -> Self {
        Self {
            public: SseHub::new(public_capacity),
            admin: AdminSseState::new(admin_capacity),
        }
    }

    /// Hub feeding the displays (scoreboard, question screen).
    pub fn public(&self) -> &SseHub {
        &self.public
    }

    pub fn admin(&self) -> &AdminSseState {
        &self.admin
    }
}

/// The moderator hub and the token issued to its single connection.
pub struct AdminSseState {
    hub: SseHub,
    token: Mutex<Option<String>>,
}

impl AdminSseState {
    fn new(capacity: usize) -> Self {
        Self {
            hub: SseHub::new(capacity),
            token: Mutex::new(None),
        }
    }

    pub fn hub(&self) -> &SseHub {
        &self.hub
    }

    pub fn token(&self) -> &Mutex<Option<String>> {
        &self.token
    }

    /// Issue a fresh token, or `None` while another moderator holds one.
    pub async fn claim(&self) -> Option<String> {
        let mut guard = self.token.lock().await;
        if guard.is_some() {
            return None;
        }
        let token = Uuid::new_v4().simple().to_string();
        *guard = Some(token.clone());
        Some(token)
    }

    /// Drop the issued token so the next moderator connection can claim one.
    pub async fn release(&self) {
        self.token.lock().await.take();
    }

    /// Whether `candidate` is the token currently issued.
    pub async fn accepts(&self, candidate: &str) -> bool {
        self.token.lock().await.as_deref() == Some(candidate)
    }
}

/// Cloneable broadcast hub; clones feed the same subscribers.
#[derive(Clone)]
pub struct SseHub {
    sender: broadcast::Sender<ServerEvent>,
}

impl SseHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    /// Number of open streams on this hub.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Send an event to all current subscribers; an event with no subscriber is dropped.
    pub fn broadcast(&self, event: ServerEvent) {
        let _ = self.sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn clones_share_subscribers() {
        let hub = SseHub::new(4);
        let mut receiver = hub.subscribe();
        hub.clone()
            .broadcast(ServerEvent::new(Some("ping".into()), "{}".into()));

        let event = receiver.recv().await.unwrap();
        assert_eq!(event.event.as_deref(), Some("ping"));
        assert_eq!(hub.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn admin_token_is_exclusive_until_released() {
        let admin = AdminSseState::new(4);
        let token = admin.claim().await.unwrap();
        assert!(admin.claim().await.is_none());
        assert!(admin.accepts(&token).await);
        assert!(!admin.accepts("forged").await);

        admin.release().await;
        assert!(!admin.accepts(&token).await);
        assert!(admin.claim().await.is_some());
    }
}
