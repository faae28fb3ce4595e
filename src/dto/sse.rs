use serde::Serialize;
use utoipa::ToSchema;

use crate::state::game::{ScoreTableKind, TeamColor, TimerState};
use crate::state::scores::RowClass;

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    pub event: Option<String>,
    pub data: String,
}

impl ServerEvent {
    /// Build an event from a raw data string.
    pub fn new(event: Option<String>, data: String) -> Self {
        Self { event, data }
    }

    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Initial metadata sent to an SSE client when it connects.
pub struct Handshake {
    /// Identifier of the SSE stream (`public` or `admin`).
    pub stream: String,
    /// Human-readable message confirming the subscription.
    pub message: String,
    /// Whether the last write to storage failed.
    pub degraded: bool,
    /// Admin token returned when the stream is privileged.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when the backend enters or leaves degraded mode.
pub struct SystemStatus {
    pub degraded: bool,
}

#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
/// Severity of a moderator notification.
pub enum NotificationLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Serialize, ToSchema)]
/// Non-blocking message for the moderator (failed save, gateway lost, ...).
pub struct NotificationEvent {
    pub level: NotificationLevel,
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
/// Countdown progress.
pub struct TimerEvent {
    pub timer: TimerState,
    pub listening: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Cue to play (or stop) on the display.
pub struct AudioEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sound: Option<String>,
    /// Asset path configured for the cue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
/// A score cell changed.
pub struct CellEvent {
    pub table: ScoreTableKind,
    /// One-based question number.
    pub row: usize,
    pub team: TeamColor,
    pub value: Option<f64>,
    pub row_class: RowClass,
    pub column_sum: f64,
    pub total_points: f64,
}
