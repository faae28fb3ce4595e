//! DTO definitions used by the admin REST API and documentation layer.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    dto::validation::validate_team_name,
    state::{
        arbitration::{ClickRecord, PointsAward, SignalOutcome},
        game::{ScoreTableKind, TeamColor},
        scores::RowClass,
    },
};

/// Raw buzzer token relayed by the moderator page (a key press).
#[derive(Debug, Deserialize, ToSchema)]
pub struct SignalRequest {
    pub token: String,
}

/// How a signal was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SignalStatus {
    Accepted,
    NotListening,
    UnknownToken,
    AlreadyClicked,
}

/// Result of a relayed signal.
#[derive(Debug, Serialize, ToSchema)]
pub struct SignalResponse {
    pub status: SignalStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team: Option<TeamColor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub click: Option<ClickRecord>,
}

impl From<SignalOutcome> for SignalResponse {
    fn from(outcome: SignalOutcome) -> Self {
        match outcome {
            SignalOutcome::Accepted(record) => Self {
                status: SignalStatus::Accepted,
                team: Some(record.team),
                click: Some(record),
            },
            SignalOutcome::NotListening => Self {
                status: SignalStatus::NotListening,
                team: None,
                click: None,
            },
            SignalOutcome::UnknownToken => Self {
                status: SignalStatus::UnknownToken,
                team: None,
                click: None,
            },
            SignalOutcome::AlreadyClicked(team) => Self {
                status: SignalStatus::AlreadyClicked,
                team: Some(team),
                click: None,
            },
        }
    }
}

/// Relative move of the round or question pointer.
#[derive(Debug, Deserialize, ToSchema)]
pub struct StepRequest {
    pub delta: i32,
}

/// Position of the round pointer.
#[derive(Debug, Serialize, ToSchema)]
pub struct RoundPointerResponse {
    pub current_round: u8,
    pub current_question: usize,
}

/// Start a countdown.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct StartTimerRequest {
    /// Length in seconds.
    #[validate(range(min = 1, max = 3600))]
    pub duration: u32,
}

/// Operator edit of one score cell.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CellUpdateRequest {
    pub table: ScoreTableKind,
    /// One-based question number.
    pub row: usize,
    pub team: TeamColor,
    /// Raw input; empty or non-numeric text clears the cell.
    pub value: String,
}

/// Cell state after an edit, with the refreshed derived values.
#[derive(Debug, Serialize, ToSchema)]
pub struct CellUpdateResponse {
    pub value: Option<f64>,
    pub row_class: RowClass,
    #[schema(value_type = Object)]
    pub column_sums: IndexMap<TeamColor, f64>,
    #[schema(value_type = Object)]
    pub totals: IndexMap<TeamColor, f64>,
}

/// Award points to a team for the current question.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AddPointsRequest {
    pub team: TeamColor,
    pub points: f64,
}

/// Result of an award.
#[derive(Debug, Serialize, ToSchema)]
pub struct AddPointsResponse {
    /// `false` when the current question lies outside the active table.
    pub written: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<ScoreTableKind>,
    pub question: usize,
}

impl AddPointsResponse {
    pub fn from_award(award: PointsAward, current_question: usize) -> Self {
        match award {
            PointsAward::Written {
                table, question, ..
            } => Self {
                written: true,
                table: Some(table),
                question,
            },
            PointsAward::QuestionOutOfRange { table, question } => Self {
                written: false,
                table: Some(table),
                question,
            },
            PointsAward::NoActiveTable | PointsAward::UnknownTeam { .. } => Self {
                written: false,
                table: None,
                question: current_question,
            },
        }
    }
}

/// New display name for a team.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RenameTeamRequest {
    #[validate(custom(function = "validate_team_name"))]
    pub name: String,
}

/// Show or hide a team on the scoreboard.
#[derive(Debug, Deserialize, ToSchema)]
pub struct VisibilityRequest {
    pub visible: bool,
}

/// Value of a boolean flag after a toggle.
#[derive(Debug, Serialize, ToSchema)]
pub struct ToggleResponse {
    pub enabled: bool,
}

/// Semicolon separated `number;question;answer` rows.
#[derive(Debug, Deserialize, ToSchema)]
pub struct QuestionsUploadRequest {
    pub csv: String,
}

/// Generic success message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ActionResponse {
    pub message: String,
}

impl ActionResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
