use serde::Serialize;
use tracing::warn;

use crate::{
    dao::storage::StorageError,
    dto::{
        public::PublicSnapshot,
        sse::{
            CellEvent, NotificationEvent, NotificationLevel, ServerEvent, SystemStatus, TimerEvent,
        },
    },
    state::{
        SharedState, SseHub,
        arbitration::ClickRecord,
        game::{ScoreTableKind, Session, TeamColor},
        scores,
    },
};

const EVENT_STATE_SNAPSHOT: &str = "state.snapshot";
const EVENT_BUZZ_CLICK: &str = "buzz.click";
const EVENT_TIMER_TICK: &str = "timer.tick";
const EVENT_TIMER_WARNING: &str = "timer.warning";
const EVENT_TIMER_FINISHED: &str = "timer.finished";
const EVENT_SCORE_CELL: &str = "score.cell";
const EVENT_NOTIFICATION: &str = "notification";
const EVENT_SYSTEM_STATUS: &str = "system.status";

/// Push the session to both streams; the public one gets the redacted view.
pub fn publish_snapshot(public: &SseHub, admin: &SseHub, session: &Session) {
    send_event(public, EVENT_STATE_SNAPSHOT, &PublicSnapshot::from(session));
    send_event(admin, EVENT_STATE_SNAPSHOT, session);
}

/// Tell the moderator a save failed. The session keeps running from memory.
pub fn publish_storage_failure(admin: &SseHub, err: &StorageError) {
    let payload = NotificationEvent {
        level: NotificationLevel::Warning,
        message: format!("Progress could not be saved: {err}"),
    };
    send_event(admin, EVENT_NOTIFICATION, &payload);
}

/// Broadcast a degraded-mode change to the moderator.
pub fn publish_system_status(admin: &SseHub, degraded: bool) {
    send_event(admin, EVENT_SYSTEM_STATUS, &SystemStatus { degraded });
}

/// Announce an accepted buzzer signal.
pub fn broadcast_click(state: &SharedState, record: &ClickRecord) {
    send_public_event(state, EVENT_BUZZ_CLICK, record);
    send_admin_event(state, EVENT_BUZZ_CLICK, record);
}

/// One second elapsed on the countdown.
pub fn broadcast_timer_tick(state: &SharedState, session: &Session) {
    let payload = timer_payload(session);
    send_public_event(state, EVENT_TIMER_TICK, &payload);
    send_admin_event(state, EVENT_TIMER_TICK, &payload);
}

/// Ten seconds left on a standard countdown.
pub fn broadcast_timer_warning(state: &SharedState, session: &Session) {
    let payload = timer_payload(session);
    send_public_event(state, EVENT_TIMER_WARNING, &payload);
    send_admin_event(state, EVENT_TIMER_WARNING, &payload);
}

/// The countdown ended, by expiry or by the moderator.
pub fn broadcast_timer_finished(state: &SharedState, session: &Session) {
    let payload = timer_payload(session);
    send_public_event(state, EVENT_TIMER_FINISHED, &payload);
    send_admin_event(state, EVENT_TIMER_FINISHED, &payload);
}

/// A score cell changed; carries the refreshed row class and sums.
pub fn broadcast_cell(
    state: &SharedState,
    session: &Session,
    table: ScoreTableKind,
    row: usize,
    team: TeamColor,
) {
    let Some(entry) = session.teams.get(&team) else {
        return;
    };
    let Some(index) = row.checked_sub(1) else {
        return;
    };
    let Some(row_class) = scores::classify_row(&session.teams, table, index) else {
        return;
    };
    let payload = CellEvent {
        table,
        row,
        team,
        value: entry.column(table)[index],
        row_class,
        column_sum: entry.column(table).iter().flatten().sum(),
        total_points: entry.total_points,
    };
    send_admin_event(state, EVENT_SCORE_CELL, &payload);
}

/// Send a notification to the moderator.
pub fn notify_admin(state: &SharedState, level: NotificationLevel, message: impl Into<String>) {
    let payload = NotificationEvent {
        level,
        message: message.into(),
    };
    send_admin_event(state, EVENT_NOTIFICATION, &payload);
}

fn timer_payload(session: &Session) -> TimerEvent {
    TimerEvent {
        timer: session.timer,
        listening: session.buzzer.listening,
    }
}

fn send_public_event(state: &SharedState, event: &str, payload: &impl Serialize) {
    send_event(state.public_sse(), event, payload);
}

fn send_admin_event(state: &SharedState, event: &str, payload: &impl Serialize) {
    send_event(state.admin_sse(), event, payload);
}

fn send_event(hub: &SseHub, event: &str, payload: &impl Serialize) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => hub.broadcast(event),
        Err(err) => warn!(event, error = %err, "failed to serialize SSE payload"),
    }
}
