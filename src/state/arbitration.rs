//! Buzzer arbitration: first-come ordering, lockout, inter-arrival deltas, point awards.

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::{SystemTime, UNIX_EPOCH},
};

use serde::Serialize;
use tracing::debug;
use utoipa::ToSchema;

use crate::state::{
    game::{ScoreTableKind, TeamColor},
    scores::{self, CellEdit},
    store::{SessionPatch, StateStore},
    tokens::TokenTable,
};

/// Millisecond clock used to timestamp accepted signals.
pub trait Clock: Send + Sync {
    /// Current time in milliseconds since the Unix epoch.
    fn now_ms(&self) -> u64;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or_default()
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    /// Clock frozen at `start_ms`.
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: AtomicU64::new(start_ms),
        }
    }

    /// Move the clock forward.
    pub fn advance_ms(&self, delta: u64) {
        self.now.fetch_add(delta, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Accepted buzzer signal as shown to the moderator.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ClickRecord {
    pub team: TeamColor,
    /// One-based arrival rank within the current question.
    pub rank: usize,
    /// Seconds since the previous accepted signal, rounded to hundredths. `None` for the first one.
    pub delta_seconds: Option<f64>,
    /// Display label: `First`, or the delta formatted as `+0.42 s`.
    pub label: String,
}

/// What happened to a raw signal.
#[derive(Debug, Clone, PartialEq)]
pub enum SignalOutcome {
    Accepted(ClickRecord),
    /// Listening is disabled; the signal was dropped.
    NotListening,
    /// The token maps to no team.
    UnknownToken,
    /// The team already buzzed on this question.
    AlreadyClicked(TeamColor),
}

/// Result of awarding points to the current question.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointsAward {
    Written {
        table: ScoreTableKind,
        question: usize,
        team: TeamColor,
        points: f64,
    },
    /// The current question lies beyond the last row of the active table.
    QuestionOutOfRange {
        table: ScoreTableKind,
        question: usize,
    },
    /// The current round has no score table.
    NoActiveTable,
    /// The team has no column in this session.
    UnknownTeam { team: TeamColor },
}

/// Decides the order in which teams buzzed.
pub struct BuzzerArbiter {
    tokens: TokenTable,
}

impl BuzzerArbiter {
    pub fn new(tokens: TokenTable) -> Self {
        Self { tokens }
    }

    pub fn tokens(&self) -> &TokenTable {
        &self.tokens
    }

    /// Process one raw signal that arrived at `now_ms`.
    ///
    /// Rejected signals leave the session untouched.
    pub fn handle_signal(&self, store: &mut StateStore, raw: &str, now_ms: u64) -> SignalOutcome {
        let session = store.session();
        if !session.buzzer.listening {
            debug!(token = raw, "signal ignored: not listening");
            return SignalOutcome::NotListening;
        }
        let Some(team) = self.tokens.resolve(raw) else {
            debug!(token = raw, "signal ignored: unknown token");
            return SignalOutcome::UnknownToken;
        };
        if session.buzzer.clicked_teams.contains(&team) {
            debug!(%team, "signal ignored: team already clicked");
            return SignalOutcome::AlreadyClicked(team);
        }

        let mut race = session.buzzer.clone();
        let delta_seconds = race.last_click_ms.map(|last| {
            let delta = now_ms.saturating_sub(last) as f64 / 1000.0;
            race.click_timeline.push(delta);
            (delta * 100.0).round() / 100.0
        });
        race.clicked_teams.insert(team);
        race.last_click_ms = Some(now_ms);
        let rank = race.clicked_teams.len();

        store.update_state(SessionPatch::default().buzzer(race));

        let label = match delta_seconds {
            Some(delta) => format!("+{delta:.2} s"),
            None => "First".to_string(),
        };
        SignalOutcome::Accepted(ClickRecord {
            team,
            rank,
            delta_seconds,
            label,
        })
    }

    /// Clear the race of the current question and reopen listening.
    pub fn reset_output(&self, store: &mut StateStore) {
        let mut race = store.session().buzzer.clone();
        race.reopen();
        store.update_state(SessionPatch::default().buzzer(race));
    }

    /// Overwrite `team`'s cell for the current question of the active round.
    pub fn add_points(&self, store: &mut StateStore, team: TeamColor, points: f64) -> PointsAward {
        let session = store.session();
        let Some(table) = session.active_table() else {
            return PointsAward::NoActiveTable;
        };
        let question = session.current_question;

        let mut teams = session.teams.clone();
        match scores::write_cell(&mut teams, table, question, team, Some(points)) {
            CellEdit::RowOutOfRange => {
                debug!(%team, question, ?table, "points ignored: question outside table");
                PointsAward::QuestionOutOfRange { table, question }
            }
            CellEdit::UnknownTeam(team) => {
                debug!(%team, "points ignored: team has no column");
                PointsAward::UnknownTeam { team }
            }
            CellEdit::Set(_) | CellEdit::Cleared => {
                scores::recompute_totals(&mut teams);
                store.update_state(SessionPatch::default().teams(teams));
                PointsAward::Written {
                    table,
                    question,
                    team,
                    points,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::dao::kv_store::MemoryStore;

    fn setup() -> (BuzzerArbiter, StateStore) {
        let arbiter = BuzzerArbiter::new(TokenTable::standard().unwrap());
        let store = StateStore::open(Arc::new(MemoryStore::new()), "brainRingState");
        (arbiter, store)
    }

    fn accepted(outcome: SignalOutcome) -> ClickRecord {
        match outcome {
            SignalOutcome::Accepted(record) => record,
            other => panic!("expected an accepted signal, got {other:?}"),
        }
    }

    #[test]
    fn first_click_has_no_delta() {
        let (arbiter, mut store) = setup();
        let record = accepted(arbiter.handle_signal(&mut store, "g", 10_000));

        assert_eq!(record.team, TeamColor::Green);
        assert_eq!(record.rank, 1);
        assert_eq!(record.delta_seconds, None);
        assert_eq!(record.label, "First");
        let race = &store.session().buzzer;
        assert_eq!(race.clicked_teams.len(), 1);
        assert!(race.click_timeline.is_empty());
        assert_eq!(race.last_click_ms, Some(10_000));
    }

    #[test]
    fn later_clicks_record_deltas_in_order() {
        let (arbiter, mut store) = setup();
        arbiter.handle_signal(&mut store, "g", 10_000);
        let second = accepted(arbiter.handle_signal(&mut store, "R", 10_423));
        let third = accepted(arbiter.handle_signal(&mut store, "и", 11_100));

        assert_eq!(second.rank, 2);
        assert_eq!(second.delta_seconds, Some(0.42));
        assert_eq!(second.label, "+0.42 s");
        assert_eq!(third.team, TeamColor::Blue);
        assert_eq!(third.delta_seconds, Some(0.68));

        let race = &store.session().buzzer;
        let order: Vec<_> = race.clicked_teams.iter().copied().collect();
        assert_eq!(order, [TeamColor::Green, TeamColor::Red, TeamColor::Blue]);
        assert_eq!(race.click_timeline, vec![0.423, 0.677]);
    }

    #[test]
    fn repeated_team_is_locked_out() {
        let (arbiter, mut store) = setup();
        arbiter.handle_signal(&mut store, "g", 1_000);
        let before = store.get_state();

        assert_eq!(
            arbiter.handle_signal(&mut store, "п", 1_500),
            SignalOutcome::AlreadyClicked(TeamColor::Green)
        );
        assert_eq!(store.get_state(), before);
    }

    #[test]
    fn signals_are_dropped_while_not_listening() {
        let (arbiter, mut store) = setup();
        let mut race = store.session().buzzer.clone();
        race.listening = false;
        store.update_state(SessionPatch::default().buzzer(race));
        let before = store.get_state();

        assert_eq!(
            arbiter.handle_signal(&mut store, "g", 1_000),
            SignalOutcome::NotListening
        );
        assert_eq!(store.get_state(), before);
    }

    #[test]
    fn unknown_tokens_are_dropped() {
        let (arbiter, mut store) = setup();
        let before = store.get_state();
        assert_eq!(
            arbiter.handle_signal(&mut store, "q", 1_000),
            SignalOutcome::UnknownToken
        );
        assert_eq!(store.get_state(), before);
    }

    #[test]
    fn reset_output_reopens_the_race() {
        let (arbiter, mut store) = setup();
        arbiter.handle_signal(&mut store, "g", 1_000);
        arbiter.handle_signal(&mut store, "b", 2_000);
        arbiter.reset_output(&mut store);

        let race = &store.session().buzzer;
        assert!(race.listening);
        assert!(race.clicked_teams.is_empty());
        assert!(race.click_timeline.is_empty());
        assert_eq!(race.last_click_ms, None);
        assert_eq!(
            accepted(arbiter.handle_signal(&mut store, "g", 5_000)).rank,
            1
        );
    }

    #[test]
    fn add_points_overwrites_the_current_cell() {
        let (arbiter, mut store) = setup();
        store.update_state(SessionPatch::default().round(3).question(5));

        arbiter.add_points(&mut store, TeamColor::Red, 2.0);
        let award = arbiter.add_points(&mut store, TeamColor::Red, 3.0);

        assert_eq!(
            award,
            PointsAward::Written {
                table: ScoreTableKind::Hard,
                question: 5,
                team: TeamColor::Red,
                points: 3.0,
            }
        );
        let red = &store.session().teams[&TeamColor::Red];
        assert_eq!(red.hard[4], Some(3.0));
        assert_eq!(red.total_points, 3.0);
    }

    #[test]
    fn add_points_ignores_questions_past_the_table() {
        let (arbiter, mut store) = setup();
        store.update_state(SessionPatch::default().round(4).question(15));
        let before = store.get_state();

        assert_eq!(
            arbiter.add_points(&mut store, TeamColor::Pink, 1.0),
            PointsAward::QuestionOutOfRange {
                table: ScoreTableKind::Captain,
                question: 15,
            }
        );
        assert_eq!(store.get_state(), before);
    }
}
