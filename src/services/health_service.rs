use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report `degraded` while the most recent write to storage failed.
pub fn health_status(state: &SharedState) -> HealthResponse {
    if state.is_degraded() {
        warn!("health check while storage writes are failing");
        HealthResponse::degraded()
    } else {
        HealthResponse::ok()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::kv_store::MemoryStore,
        dto::health::HealthStatus,
        services::{admin_service, audio::RecordingAudio},
        state::{AppState, arbitration::ManualClock},
    };

    #[tokio::test]
    async fn degraded_while_writes_fail() {
        let backend = Arc::new(MemoryStore::new());
        let state = AppState::with_collaborators(
            AppConfig::default(),
            backend.clone(),
            Arc::new(ManualClock::new(0)),
            Arc::new(RecordingAudio::new()),
        )
        .unwrap();
        assert_eq!(health_status(&state).status, HealthStatus::Ok);

        backend.set_unavailable(true);
        admin_service::toggle_answer_visibility(&state);
        assert_eq!(health_status(&state).status, HealthStatus::Degraded);

        backend.set_unavailable(false);
        admin_service::toggle_answer_visibility(&state);
        assert_eq!(health_status(&state).status, HealthStatus::Ok);
    }
}
