use indexmap::IndexMap;
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::{
    game::{BuzzerRace, Cell, ScoreTableKind, Session, TeamColor, TimerState},
    scores::{self, RowClass},
};

#[derive(Debug, Serialize, ToSchema)]
/// Scoreboard line of one team.
pub struct TeamScore {
    pub color: TeamColor,
    pub name: String,
    pub visible: bool,
    pub total_points: f64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
/// The question on screen. The answer is only present once revealed.
pub struct QuestionView {
    /// Zero-based position in the question list.
    pub index: usize,
    pub count: usize,
    pub number: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
}

impl QuestionView {
    /// Current question of `session`, hiding the answer unless it was revealed.
    pub fn current(session: &Session) -> Option<Self> {
        let row = session.questions.get(session.question_index)?;
        Some(Self {
            index: session.question_index,
            count: session.questions.len(),
            number: row.number.clone(),
            text: row.text.clone(),
            answer: session.answer_visible.then(|| row.answer.clone()),
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Everything a display needs, without the unrevealed answers.
pub struct PublicSnapshot {
    pub session_id: String,
    pub teams: Vec<TeamScore>,
    pub current_round: u8,
    pub current_question: usize,
    pub timer: TimerState,
    pub buzzer: BuzzerRace,
    pub muted: bool,
    pub answer_visible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<QuestionView>,
}

impl From<&Session> for PublicSnapshot {
    fn from(session: &Session) -> Self {
        Self {
            session_id: session.session_id.clone(),
            teams: session
                .teams
                .iter()
                .map(|(color, team)| TeamScore {
                    color: *color,
                    name: team.name.clone(),
                    visible: team.visible,
                    total_points: team.total_points,
                })
                .collect(),
            current_round: session.current_round,
            current_question: session.current_question,
            timer: session.timer,
            buzzer: session.buzzer.clone(),
            muted: session.muted,
            answer_visible: session.answer_visible,
            question: QuestionView::current(session),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// One row of a score table with its classification.
pub struct TableRow {
    /// One-based question number.
    pub row: usize,
    /// Cells in team column order.
    pub cells: Vec<Cell>,
    pub class: RowClass,
}

#[derive(Debug, Serialize, ToSchema)]
/// A full score table as rendered by the moderator grid.
pub struct TableView {
    pub table: ScoreTableKind,
    pub teams: Vec<TeamColor>,
    pub rows: Vec<TableRow>,
    #[schema(value_type = Object)]
    pub column_sums: IndexMap<TeamColor, f64>,
}

impl TableView {
    pub fn build(session: &Session, table: ScoreTableKind) -> Self {
        let classes = scores::classify_table(&session.teams, table);
        let rows = classes
            .into_iter()
            .enumerate()
            .map(|(index, class)| TableRow {
                row: index + 1,
                cells: session
                    .teams
                    .values()
                    .map(|team| team.column(table)[index])
                    .collect(),
                class,
            })
            .collect();

        Self {
            table,
            teams: session.teams.keys().copied().collect(),
            rows,
            column_sums: scores::column_sums(&session.teams, table),
        }
    }
}
