//! Business logic powering the admin REST routes: round navigation, score edits,
//! team settings, session lifecycle, export/import and the question list.

use time::OffsetDateTime;
use tracing::{debug, info};

use crate::{
    dao::questions,
    dto::{
        admin::{CellUpdateRequest, CellUpdateResponse, RoundPointerResponse},
        export::{ImportDocument, SessionExport},
        public::QuestionView,
    },
    error::ServiceError,
    services::{buzzer_service, sse_events, statistics},
    state::{
        SharedState,
        game::{
            FIRST_ROUND, LAST_ROUND, MAX_QUESTION, QuestionRow, ScoreTableKind, Session,
            TeamColor, TimerState,
        },
        scores::{self, CellEdit},
        store::SessionPatch,
    },
};

fn pointer(session: &Session) -> RoundPointerResponse {
    RoundPointerResponse {
        current_round: session.current_round,
        current_question: session.current_question,
    }
}

// ---------------------------------------------------------------------------
// Round pointer
// ---------------------------------------------------------------------------

/// Move to another round (clamped to the playable rounds), restart at question 1
/// and clear the buzzer race.
pub fn change_round(state: &SharedState, delta: i32) -> RoundPointerResponse {
    {
        let mut store = state.store();
        let current = i32::from(store.session().current_round);
        let target = (current + delta).clamp(i32::from(FIRST_ROUND), i32::from(LAST_ROUND));
        // Bounded by the clamp above.
        let round = target as u8;
        debug!(from = current, to = round, "changing round");
        store.update_state(SessionPatch::default().round(round).question(1));
    }
    buzzer_service::reset_output(state);
    pointer(&state.snapshot())
}

/// Move the question pointer within the active table and step the question list
/// cursor in the same direction, then clear the buzzer race.
pub fn change_question(state: &SharedState, delta: i32) -> RoundPointerResponse {
    {
        let mut store = state.store();
        let session = store.session();
        let rows = session
            .active_table()
            .map_or(MAX_QUESTION, ScoreTableKind::rows);
        let question = session
            .current_question
            .saturating_add_signed(delta as isize)
            .clamp(1, rows);

        let mut patch = SessionPatch::default().question(question);
        if let Some(index) = step_cursor(session, delta) {
            patch = patch.question_index(index).answer_visible(false);
        }
        store.update_state(patch);
    }
    buzzer_service::reset_output(state);
    pointer(&state.snapshot())
}

/// Next cursor position in the question list, `None` when it does not move.
fn step_cursor(session: &Session, delta: i32) -> Option<usize> {
    let index = session.question_index;
    let last = session.questions.len().checked_sub(1)?;
    let next = match delta.signum() {
        1 => (index + 1).min(last),
        -1 => index.saturating_sub(1),
        _ => index,
    };
    (next != index).then_some(next)
}

// ---------------------------------------------------------------------------
// Score tables
// ---------------------------------------------------------------------------

/// Apply an operator edit to one cell and return the refreshed derived values.
pub fn set_cell(
    state: &SharedState,
    request: CellUpdateRequest,
) -> Result<CellUpdateResponse, ServiceError> {
    let CellUpdateRequest {
        table,
        row,
        team,
        value,
    } = request;

    let session = {
        let mut store = state.store();
        let mut teams = store.session().teams.clone();
        match scores::set_cell(&mut teams, table, row, team, &value) {
            CellEdit::RowOutOfRange => {
                return Err(ServiceError::InvalidInput(format!(
                    "row {row} does not exist in the {} table",
                    table.label()
                )));
            }
            CellEdit::UnknownTeam(team) => {
                return Err(ServiceError::NotFound(format!("team `{team}` has no column")));
            }
            CellEdit::Set(_) | CellEdit::Cleared => {}
        }
        store.update_state(SessionPatch::default().teams(teams));
        store.get_state()
    };

    sse_events::broadcast_cell(state, &session, table, row, team);

    let index = row - 1;
    let row_class = scores::classify_row(&session.teams, table, index).ok_or_else(|| {
        ServiceError::InvalidState(format!("row {row} vanished from the {} table", table.label()))
    })?;
    Ok(CellUpdateResponse {
        value: session.teams.get(&team).and_then(|entry| entry.column(table)[index]),
        row_class,
        column_sums: scores::column_sums(&session.teams, table),
        totals: session
            .teams
            .iter()
            .map(|(color, entry)| (*color, entry.total_points))
            .collect(),
    })
}

/// Statistics report rendered as CSV.
pub fn statistics_csv(state: &SharedState) -> Result<String, ServiceError> {
    let rows = statistics::statistics(&state.snapshot());
    Ok(statistics::statistics_csv(&rows)?)
}

// ---------------------------------------------------------------------------
// Team settings and flags
// ---------------------------------------------------------------------------

/// Give `team` a new display name. Surrounding whitespace is dropped.
pub fn rename_team(state: &SharedState, team: TeamColor, name: &str) -> Result<(), ServiceError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ServiceError::InvalidInput("team name must not be blank".into()));
    }

    let mut store = state.store();
    let mut teams = store.session().teams.clone();
    let entry = teams
        .get_mut(&team)
        .ok_or_else(|| ServiceError::NotFound(format!("team `{team}` not found")))?;
    entry.name = name.to_string();
    store.update_state(SessionPatch::default().teams(teams));
    info!(%team, name, "team renamed");
    Ok(())
}

/// Show or hide `team` on the scoreboard.
pub fn set_team_visibility(
    state: &SharedState,
    team: TeamColor,
    visible: bool,
) -> Result<(), ServiceError> {
    let mut store = state.store();
    let mut teams = store.session().teams.clone();
    let entry = teams
        .get_mut(&team)
        .ok_or_else(|| ServiceError::NotFound(format!("team `{team}` not found")))?;
    entry.visible = visible;
    store.update_state(SessionPatch::default().teams(teams));
    Ok(())
}

/// Flip the mute flag. Returns the new value.
pub fn toggle_mute(state: &SharedState) -> bool {
    let muted = {
        let mut store = state.store();
        let muted = !store.session().muted;
        store.update_state(SessionPatch::default().muted(muted));
        muted
    };
    state.audio().set_muted(muted);
    info!(muted, "mute toggled");
    muted
}

/// Reveal or hide the answer of the current question. Returns the new value.
pub fn toggle_answer_visibility(state: &SharedState) -> bool {
    let mut store = state.store();
    let visible = !store.session().answer_visible;
    store.update_state(SessionPatch::default().answer_visible(visible));
    visible
}

// ---------------------------------------------------------------------------
// Session lifecycle
// ---------------------------------------------------------------------------

/// Start over with a fresh session and a new session id.
pub fn reset_session(state: &SharedState) -> Session {
    let session = {
        let mut timers = state.timers();
        timers.cancel();
        let mut store = state.store();
        store.reset(OffsetDateTime::now_utc());
        store.get_state()
    };
    state.audio().stop_all();
    state.audio().set_muted(session.muted);
    session
}

/// Wipe every score and return to the first question of the first round,
/// keeping the session id, team names and the question list.
pub fn clear_scores(state: &SharedState) -> Session {
    let session = {
        let mut timers = state.timers();
        timers.cancel();
        let mut store = state.store();
        let mut teams = store.session().teams.clone();
        teams.values_mut().for_each(|team| team.clear_scores());
        store.update_state(
            SessionPatch::default()
                .teams(teams)
                .round(FIRST_ROUND)
                .question(1)
                .timer(TimerState::idle()),
        );
        store.get_state()
    };
    state.audio().stop_all();
    info!(session_id = %session.session_id, "scores cleared");
    session
}

/// Portable copy of the session's teams and scores.
pub fn export_snapshot(state: &SharedState) -> SessionExport {
    SessionExport::from_session(&state.snapshot(), OffsetDateTime::now_utc())
}

/// Merge team fields from an exported document into the current session.
///
/// The whole document is checked before anything is written: one column of the
/// wrong length rejects the import. Unknown colors are skipped.
pub fn import_teams(state: &SharedState, document: ImportDocument) -> Result<usize, ServiceError> {
    let mut store = state.store();
    let mut teams = store.session().teams.clone();
    let mut merged = 0;

    for (key, imported) in document.teams {
        let Some(color) = TeamColor::from_name(&key) else {
            debug!(team = %key, "ignoring unknown team in import");
            continue;
        };
        let Some(team) = teams.get_mut(&color) else {
            continue;
        };

        let columns = [
            (ScoreTableKind::YesNo, imported.yes_no),
            (ScoreTableKind::Simple, imported.simple),
            (ScoreTableKind::Hard, imported.hard),
            (ScoreTableKind::Captain, imported.cap),
        ];
        for (table, column) in columns {
            let Some(column) = column else {
                continue;
            };
            if column.len() != table.rows() {
                return Err(ServiceError::InvalidInput(format!(
                    "{color} {} column has {} cells, expected {}",
                    table.label(),
                    column.len(),
                    table.rows()
                )));
            }
            team.column_mut(table).copy_from_slice(&column);
        }
        if let Some(name) = imported
            .name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
        {
            team.name = name.to_string();
        }
        if let Some(visible) = imported.visible {
            team.visible = visible;
        }
        merged += 1;
    }

    scores::recompute_totals(&mut teams);
    store.update_state(SessionPatch::default().teams(teams));
    info!(merged, "teams imported");
    Ok(merged)
}

// ---------------------------------------------------------------------------
// Question list
// ---------------------------------------------------------------------------

/// Replace the question list with the rows parsed from `csv`. Returns the row count.
pub fn load_questions(state: &SharedState, csv: &str) -> Result<usize, ServiceError> {
    let rows = questions::parse_questions(csv)?;
    Ok(install_questions(state, rows))
}

/// Replace the question list with already parsed rows and rewind the cursor.
pub fn install_questions(state: &SharedState, rows: Vec<QuestionRow>) -> usize {
    let count = rows.len();
    let mut store = state.store();
    store.update_state(
        SessionPatch::default()
            .questions(rows, 0)
            .answer_visible(false),
    );
    info!(count, "question list loaded");
    count
}

/// Advance the question list cursor. Stays on the last question.
pub fn next_question(state: &SharedState) -> Option<QuestionView> {
    move_cursor(state, 1)
}

/// Move the question list cursor back. Stays on the first question.
pub fn prev_question(state: &SharedState) -> Option<QuestionView> {
    move_cursor(state, -1)
}

fn move_cursor(state: &SharedState, delta: i32) -> Option<QuestionView> {
    let mut store = state.store();
    if let Some(index) = step_cursor(store.session(), delta) {
        store.update_state(
            SessionPatch::default()
                .question_index(index)
                .answer_visible(false),
        );
    }
    QuestionView::current(store.session())
}

/// Drop the loaded question list.
pub fn clear_questions(state: &SharedState) {
    let mut store = state.store();
    store.update_state(
        SessionPatch::default()
            .questions(Vec::new(), 0)
            .answer_visible(false),
    );
}
