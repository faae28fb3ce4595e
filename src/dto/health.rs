use serde::Serialize;
use utoipa::ToSchema;

/// Overall service state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    /// The session lives in memory only: the last save failed.
    Degraded,
}

/// Body of `GET /healthcheck`.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: HealthStatus,
}

impl HealthResponse {
    pub fn ok() -> Self {
        Self {
            status: HealthStatus::Ok,
        }
    }

    pub fn degraded() -> Self {
        Self {
            status: HealthStatus::Degraded,
        }
    }
}
