//! Score table engine: cell parsing, column sums, row classification, team totals.

use indexmap::IndexMap;
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::game::{Cell, ScoreTableKind, TeamColor, Teams};

/// Outcome of classifying one question row across all teams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RowClass {
    /// Exactly one team answered correctly.
    Affirmative,
    /// The row holds conflicting or out-of-range entries.
    Anomalous,
    /// Nothing to report (empty row, or a row excluded from scoring).
    Neutral,
}

/// Result of a cell edit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CellEdit {
    /// The cell now holds a number.
    Set(f64),
    /// Empty or non-numeric input cleared the cell.
    Cleared,
    /// The row does not exist in that table; nothing changed.
    RowOutOfRange,
    /// The team has no column in this session; nothing changed.
    UnknownTeam(TeamColor),
}

impl CellEdit {
    /// Whether the edit reached a cell.
    pub fn applied(self) -> bool {
        matches!(self, CellEdit::Set(_) | CellEdit::Cleared)
    }
}

impl ScoreTableKind {
    /// Whether `value` is a correct-answer marker for this table.
    pub fn is_correct(self, value: f64) -> bool {
        match self {
            ScoreTableKind::YesNo => value > 0.0 && value <= 100.0,
            ScoreTableKind::Simple => value > 0.0 && value <= 2.0,
            ScoreTableKind::Hard => value > 0.0 && value <= 3.0,
            ScoreTableKind::Captain => value == 1.0,
        }
    }

    /// Whether the zero-based `row` takes part in classification and statistics.
    /// The first captain's round row is a warm-up and never counts.
    pub fn counts_row(self, row: usize) -> bool {
        row < self.rows() && !(self == ScoreTableKind::Captain && row == 0)
    }
}

/// Parse operator input into a cell value. Commas are accepted as decimal separators;
/// empty, non-numeric or non-finite input yields the unset state.
pub fn parse_cell(raw: &str) -> Cell {
    let normalized = raw.trim().replace(',', ".");
    if normalized.is_empty() {
        return None;
    }
    normalized.parse::<f64>().ok().filter(|value| value.is_finite())
}

/// Write operator input into `team`'s cell of `table` at one-based `row`, then refresh totals.
pub fn set_cell(
    teams: &mut Teams,
    table: ScoreTableKind,
    row: usize,
    team: TeamColor,
    raw: &str,
) -> CellEdit {
    let value = parse_cell(raw);
    let edit = write_cell(teams, table, row, team, value);
    if edit.applied() {
        recompute_totals(teams);
    }
    edit
}

/// Overwrite a cell with an already-parsed value. Totals are left to the caller.
pub fn write_cell(
    teams: &mut Teams,
    table: ScoreTableKind,
    row: usize,
    team: TeamColor,
    value: Cell,
) -> CellEdit {
    if row == 0 || row > table.rows() {
        return CellEdit::RowOutOfRange;
    }
    let Some(entry) = teams.get_mut(&team) else {
        return CellEdit::UnknownTeam(team);
    };
    entry.column_mut(table)[row - 1] = value;
    match value {
        Some(value) => CellEdit::Set(value),
        None => CellEdit::Cleared,
    }
}

/// Sum of every filled cell of `table`, per team in column order.
pub fn column_sums(teams: &Teams, table: ScoreTableKind) -> IndexMap<TeamColor, f64> {
    teams
        .iter()
        .map(|(color, team)| (*color, team.column(table).iter().flatten().sum()))
        .collect()
}

/// Refresh every team's running total across all tables.
pub fn recompute_totals(teams: &mut Teams) {
    for team in teams.values_mut() {
        team.total_points = ScoreTableKind::ALL
            .into_iter()
            .map(|table| team.column(table).iter().flatten().sum::<f64>())
            .sum();
    }
}

/// Classify zero-based `row` of `table`. Returns `None` for rows outside the table.
pub fn classify_row(teams: &Teams, table: ScoreTableKind, row: usize) -> Option<RowClass> {
    if row >= table.rows() {
        return None;
    }
    if !table.counts_row(row) {
        return Some(RowClass::Neutral);
    }

    let filled: Vec<f64> = teams
        .values()
        .filter_map(|team| team.column(table)[row])
        .collect();

    let class = match table {
        ScoreTableKind::YesNo => {
            if filled.iter().any(|value| !(0.0..=100.0).contains(value)) {
                RowClass::Anomalous
            } else if filled.iter().any(|value| *value > 0.0) {
                RowClass::Affirmative
            } else {
                RowClass::Neutral
            }
        }
        _ => match filled.as_slice() {
            [] => RowClass::Neutral,
            [single] if table.is_correct(*single) => RowClass::Affirmative,
            _ => RowClass::Anomalous,
        },
    };
    Some(class)
}

/// Classification of every row of `table`.
pub fn classify_table(teams: &Teams, table: ScoreTableKind) -> Vec<RowClass> {
    (0..table.rows())
        .filter_map(|row| classify_row(teams, table, row))
        .collect()
}
