//! Session data model: teams, score tables, round pointer, timer and buzzer race state.

use std::fmt;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use utoipa::ToSchema;

/// First playable round (simple questions).
pub const FIRST_ROUND: u8 = 2;
/// Last playable round (captain's round).
pub const LAST_ROUND: u8 = 4;
/// Largest question number of any table.
pub const MAX_QUESTION: usize = 40;

/// One of the six fixed team colors; also the column order of every score table.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum TeamColor {
    Red,
    Green,
    Blue,
    White,
    Yellow,
    Pink,
}

impl TeamColor {
    /// All colors in column order.
    pub const ALL: [TeamColor; 6] = [
        TeamColor::Red,
        TeamColor::Green,
        TeamColor::Blue,
        TeamColor::White,
        TeamColor::Yellow,
        TeamColor::Pink,
    ];

    /// Lowercase identifier used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            TeamColor::Red => "red",
            TeamColor::Green => "green",
            TeamColor::Blue => "blue",
            TeamColor::White => "white",
            TeamColor::Yellow => "yellow",
            TeamColor::Pink => "pink",
        }
    }

    /// Parse a color name, ignoring case and surrounding whitespace.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|color| color.as_str().eq_ignore_ascii_case(name))
    }

    /// Display name given to a freshly created team ("Red Team").
    pub fn default_display_name(self) -> String {
        let id = self.as_str();
        let mut chars = id.chars();
        let capitalized = match chars.next() {
            Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
            None => String::new(),
        };
        format!("{capitalized} Team")
    }
}

impl fmt::Display for TeamColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The four score tables of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ScoreTableKind {
    YesNo,
    Simple,
    Hard,
    Captain,
}

impl ScoreTableKind {
    /// Every table, in display order.
    pub const ALL: [ScoreTableKind; 4] = [
        ScoreTableKind::YesNo,
        ScoreTableKind::Simple,
        ScoreTableKind::Hard,
        ScoreTableKind::Captain,
    ];

    /// Number of question rows in the table.
    pub fn rows(self) -> usize {
        match self {
            ScoreTableKind::YesNo => 1,
            ScoreTableKind::Simple => 40,
            ScoreTableKind::Hard => 20,
            ScoreTableKind::Captain => 10,
        }
    }

    /// Table receiving points while `round` is active.
    pub fn for_round(round: u8) -> Option<Self> {
        match round {
            2 => Some(ScoreTableKind::Simple),
            3 => Some(ScoreTableKind::Hard),
            4 => Some(ScoreTableKind::Captain),
            _ => None,
        }
    }

    /// Human readable label used in reports.
    pub fn label(self) -> &'static str {
        match self {
            ScoreTableKind::YesNo => "Yes/No Round",
            ScoreTableKind::Simple => "Simple Questions",
            ScoreTableKind::Hard => "Hard Questions",
            ScoreTableKind::Captain => "Captain's Round",
        }
    }
}

/// A score cell: `None` is the unset state, distinct from an explicit zero.
pub type Cell = Option<f64>;

/// Per-team record holding one column of every score table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub name: String,
    pub visible: bool,
    pub yes_no: Vec<Cell>,
    pub simple: Vec<Cell>,
    pub hard: Vec<Cell>,
    #[serde(rename = "cap")]
    pub captain: Vec<Cell>,
    /// Sum of every filled cell across all tables.
    #[serde(default)]
    pub total_points: f64,
}

impl Team {
    /// Fresh team with empty tables.
    pub fn new(color: TeamColor) -> Self {
        Self {
            name: color.default_display_name(),
            visible: true,
            yes_no: vec![None; ScoreTableKind::YesNo.rows()],
            simple: vec![None; ScoreTableKind::Simple.rows()],
            hard: vec![None; ScoreTableKind::Hard.rows()],
            captain: vec![None; ScoreTableKind::Captain.rows()],
            total_points: 0.0,
        }
    }

    /// Column of the given table.
    pub fn column(&self, table: ScoreTableKind) -> &[Cell] {
        match table {
            ScoreTableKind::YesNo => &self.yes_no,
            ScoreTableKind::Simple => &self.simple,
            ScoreTableKind::Hard => &self.hard,
            ScoreTableKind::Captain => &self.captain,
        }
    }

    /// Mutable column of the given table. Returned as a slice so the row count cannot change.
    pub fn column_mut(&mut self, table: ScoreTableKind) -> &mut [Cell] {
        match table {
            ScoreTableKind::YesNo => &mut self.yes_no,
            ScoreTableKind::Simple => &mut self.simple,
            ScoreTableKind::Hard => &mut self.hard,
            ScoreTableKind::Captain => &mut self.captain,
        }
    }

    /// Drop every score, keeping name and visibility.
    pub fn clear_scores(&mut self) {
        for table in ScoreTableKind::ALL {
            self.column_mut(table).fill(None);
        }
        self.total_points = 0.0;
    }

    fn check_shape(&self, color: TeamColor) -> Result<(), SessionShapeError> {
        for table in ScoreTableKind::ALL {
            let actual = self.column(table).len();
            if actual != table.rows() {
                return Err(SessionShapeError::ColumnLength {
                    team: color,
                    table,
                    expected: table.rows(),
                    actual,
                });
            }
        }
        Ok(())
    }
}

/// Ordered team map, always holding the six colors in column order.
pub type Teams = IndexMap<TeamColor, Team>;

/// Build the six default teams.
pub fn default_teams() -> Teams {
    TeamColor::ALL
        .into_iter()
        .map(|color| (color, Team::new(color)))
        .collect()
}

/// Countdown state. Idle timers always report zero duration and remaining.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TimerState {
    pub active: bool,
    pub duration: u32,
    pub remaining: u32,
}

impl TimerState {
    /// Timer at rest.
    pub fn idle() -> Self {
        Self::default()
    }

    /// Timer just started for `duration` seconds.
    pub fn running(duration: u32) -> Self {
        Self {
            active: true,
            duration,
            remaining: duration,
        }
    }
}

/// Race state of the current question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct BuzzerRace {
    /// Whether buzzer signals are currently accepted.
    pub listening: bool,
    /// Teams that buzzed, in arrival order.
    #[schema(value_type = Vec<TeamColor>)]
    pub clicked_teams: IndexSet<TeamColor>,
    /// Arrival time of the latest accepted signal, in epoch milliseconds.
    pub last_click_ms: Option<u64>,
    /// Raw seconds between consecutive accepted signals.
    pub click_timeline: Vec<f64>,
}

impl Default for BuzzerRace {
    fn default() -> Self {
        Self {
            listening: true,
            clicked_teams: IndexSet::new(),
            last_click_ms: None,
            click_timeline: Vec::new(),
        }
    }
}

impl BuzzerRace {
    /// Clear the race and open it for new signals.
    pub fn reopen(&mut self) {
        *self = Self::default();
    }
}

/// A question loaded from the question list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct QuestionRow {
    pub number: String,
    pub text: String,
    pub answer: String,
}

/// The whole persisted session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct Session {
    pub session_id: String,
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String, format = DateTime)]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String, format = DateTime)]
    pub last_modified: OffsetDateTime,
    #[schema(value_type = Object)]
    pub teams: Teams,
    pub current_round: u8,
    pub current_question: usize,
    pub timer: TimerState,
    pub buzzer: BuzzerRace,
    pub muted: bool,
    pub answer_visible: bool,
    pub questions: Vec<QuestionRow>,
    pub question_index: usize,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(OffsetDateTime::now_utc())
    }
}

impl Session {
    /// Fresh session created at `now`.
    pub fn new(now: OffsetDateTime) -> Self {
        Self {
            session_id: session_id_for(now),
            created_at: now,
            last_modified: now,
            teams: default_teams(),
            current_round: FIRST_ROUND,
            current_question: 1,
            timer: TimerState::idle(),
            buzzer: BuzzerRace::default(),
            muted: false,
            answer_visible: false,
            questions: Vec::new(),
            question_index: 0,
        }
    }

    /// Table receiving points in the current round.
    pub fn active_table(&self) -> Option<ScoreTableKind> {
        ScoreTableKind::for_round(self.current_round)
    }

    /// Validate a session decoded from storage and repair the invariants that can be repaired.
    ///
    /// Column lengths cannot be repaired: a blob with the wrong shape is rejected as a whole.
    /// A timer persisted as active is reset since its callbacks did not survive the restart.
    pub fn sanitize(mut self) -> Result<Self, SessionShapeError> {
        let mut teams = Teams::with_capacity(TeamColor::ALL.len());
        for color in TeamColor::ALL {
            let team = self
                .teams
                .shift_remove(&color)
                .ok_or(SessionShapeError::MissingTeam(color))?;
            team.check_shape(color)?;
            teams.insert(color, team);
        }
        self.teams = teams;

        if !(FIRST_ROUND..=LAST_ROUND).contains(&self.current_round) {
            return Err(SessionShapeError::RoundOutOfRange(self.current_round));
        }
        self.current_question = self.current_question.clamp(1, MAX_QUESTION);

        if self.last_modified < self.created_at {
            self.last_modified = self.created_at;
        }
        if self.timer.active {
            self.timer = TimerState::idle();
            self.buzzer.listening = true;
        }
        if self.question_index >= self.questions.len() {
            self.question_index = 0;
        }
        Ok(self)
    }
}

/// Reasons a decoded session is rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionShapeError {
    #[error("team `{0}` is missing")]
    MissingTeam(TeamColor),
    #[error("team `{team}` table {table:?} holds {actual} rows instead of {expected}")]
    ColumnLength {
        team: TeamColor,
        table: ScoreTableKind,
        expected: usize,
        actual: usize,
    },
    #[error("round {0} is outside the playable rounds")]
    RoundOutOfRange(u8),
}

/// Session identifier derived from the wall clock: `session_YYYY_MM_DD_HH_MM_SS`.
pub fn session_id_for(at: OffsetDateTime) -> String {
    format!(
        "session_{:04}_{:02}_{:02}_{:02}_{:02}_{:02}",
        at.year(),
        u8::from(at.month()),
        at.day(),
        at.hour(),
        at.minute(),
        at.second()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn fresh_session_has_fixed_shape() {
        let session = Session::new(datetime!(2024-03-09 18:05:07 UTC));

        assert_eq!(session.session_id, "session_2024_03_09_18_05_07");
        assert_eq!(session.teams.len(), 6);
        let order: Vec<_> = session.teams.keys().copied().collect();
        assert_eq!(order, TeamColor::ALL.to_vec());
        for team in session.teams.values() {
            assert_eq!(team.yes_no.len(), 1);
            assert_eq!(team.simple.len(), 40);
            assert_eq!(team.hard.len(), 20);
            assert_eq!(team.captain.len(), 10);
        }
        assert_eq!(session.teams[&TeamColor::Pink].name, "Pink Team");
        assert!(session.buzzer.listening);
        assert_eq!(session.current_round, 2);
        assert_eq!(session.current_question, 1);
    }

    #[test]
    fn color_names_parse_case_insensitively() {
        assert_eq!(TeamColor::from_name(" Blue "), Some(TeamColor::Blue));
        assert_eq!(TeamColor::from_name("PINK"), Some(TeamColor::Pink));
        assert_eq!(TeamColor::from_name("purple"), None);
    }

    #[test]
    fn sanitize_rejects_wrong_column_length() {
        let mut session = Session::new(datetime!(2024-03-09 18:05:07 UTC));
        session.teams[&TeamColor::Green].hard.pop();

        let err = session.sanitize().unwrap_err();
        assert!(matches!(
            err,
            SessionShapeError::ColumnLength {
                team: TeamColor::Green,
                table: ScoreTableKind::Hard,
                ..
            }
        ));
    }

    #[test]
    fn sanitize_repairs_timestamps_and_timer() {
        let mut session = Session::new(datetime!(2024-03-09 18:05:07 UTC));
        session.last_modified = datetime!(2024-03-09 18:00:00 UTC);
        session.timer = TimerState::running(60);
        session.buzzer.listening = false;
        session.current_question = 99;

        let repaired = session.sanitize().unwrap();
        assert_eq!(repaired.last_modified, repaired.created_at);
        assert_eq!(repaired.timer, TimerState::idle());
        assert!(repaired.buzzer.listening);
        assert_eq!(repaired.current_question, MAX_QUESTION);
    }

    #[test]
    fn session_round_trips_through_json_with_wire_names() {
        let mut session = Session::new(datetime!(2024-03-09 18:05:07 UTC));
        session.teams[&TeamColor::Red].captain[2] = Some(1.0);

        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["sessionId"], "session_2024_03_09_18_05_07");
        assert_eq!(json["teams"]["red"]["cap"][2], 1.0);
        assert!(json["teams"]["red"]["simple"][0].is_null());

        let decoded: Session = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, session);
    }
}
