use tracing::{debug, info};

use crate::{
    services::{audio::SoundId, sse_events, timer_service},
    state::{
        SharedState,
        arbitration::{PointsAward, SignalOutcome},
        game::TeamColor,
    },
};

/// Arbitrate one raw signal from any source (keyboard relay, gateway).
///
/// The store lock serializes concurrent sources: delivery order is arbitration order.
pub fn handle_signal(state: &SharedState, raw: &str) -> SignalOutcome {
    let outcome = {
        let mut store = state.store();
        let now_ms = state.clock().now_ms();
        state.arbiter().handle_signal(&mut store, raw, now_ms)
    };

    match &outcome {
        SignalOutcome::Accepted(record) => {
            info!(team = %record.team, rank = record.rank, label = %record.label, "buzz accepted");
            state.audio().play(SoundId::Team(record.team));
            sse_events::broadcast_click(state, record);
        }
        rejected => debug!(token = raw, outcome = ?rejected, "buzz rejected"),
    }
    outcome
}

/// Clear the race for the next question, reset the countdown and silence every cue.
pub fn reset_output(state: &SharedState) {
    {
        let mut store = state.store();
        state.arbiter().reset_output(&mut store);
    }
    timer_service::reset_timer(state);
}

/// Overwrite `team`'s score for the current question of the active round.
pub fn add_points(state: &SharedState, team: TeamColor, points: f64) -> PointsAward {
    let (award, session) = {
        let mut store = state.store();
        let award = state.arbiter().add_points(&mut store, team, points);
        (award, store.get_state())
    };

    if let PointsAward::Written {
        table, question, ..
    } = award
    {
        sse_events::broadcast_cell(state, &session, table, question, team);
    }
    award
}
