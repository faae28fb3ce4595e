//! Session export document, also accepted back by the import endpoint.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use utoipa::ToSchema;

use crate::state::game::{Cell, Session, TeamColor};

/// Dates attached to an export.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExportMetadata {
    /// Calendar day the session started (`YYYY-MM-DD`).
    pub game_date: String,
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String, format = DateTime)]
    pub last_modified: OffsetDateTime,
}

/// Score columns of one team.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExportedTeam {
    pub name: String,
    pub visible: bool,
    pub yes_no: Vec<Cell>,
    pub simple: Vec<Cell>,
    pub hard: Vec<Cell>,
    pub cap: Vec<Cell>,
}

/// Portable copy of a session's scores.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionExport {
    pub session_id: String,
    /// Creation time of the session.
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String, format = DateTime)]
    pub timestamp: OffsetDateTime,
    pub metadata: ExportMetadata,
    #[schema(value_type = Object)]
    pub teams: IndexMap<TeamColor, ExportedTeam>,
}

impl SessionExport {
    /// Export `session` as of `now`.
    pub fn from_session(session: &Session, now: OffsetDateTime) -> Self {
        let created = session.created_at;
        Self {
            session_id: session.session_id.clone(),
            timestamp: created,
            metadata: ExportMetadata {
                game_date: format!(
                    "{:04}-{:02}-{:02}",
                    created.year(),
                    u8::from(created.month()),
                    created.day()
                ),
                last_modified: now,
            },
            teams: session
                .teams
                .iter()
                .map(|(color, team)| {
                    (
                        *color,
                        ExportedTeam {
                            name: team.name.clone(),
                            visible: team.visible,
                            yes_no: team.yes_no.clone(),
                            simple: team.simple.clone(),
                            hard: team.hard.clone(),
                            cap: team.captain.clone(),
                        },
                    )
                })
                .collect(),
        }
    }
}

/// Per-team fields merged over the current session on import. Absent fields are kept.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct ImportedTeam {
    pub name: Option<String>,
    pub visible: Option<bool>,
    pub yes_no: Option<Vec<Cell>>,
    pub simple: Option<Vec<Cell>>,
    pub hard: Option<Vec<Cell>>,
    pub cap: Option<Vec<Cell>>,
}

/// Import payload: any document carrying a `teams` object (an earlier export fits).
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ImportDocument {
    /// Keyed by color name; unknown colors are ignored.
    #[serde(default)]
    pub teams: HashMap<String, ImportedTeam>,
}
