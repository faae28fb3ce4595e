//! Per-round and per-team answer statistics, with CSV export.

use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    dao::storage::StorageError,
    state::{
        game::{ScoreTableKind, Session, Teams},
        scores::{self, RowClass},
    },
};

const CSV_HEADER: [&str; 4] = [
    "Round Name",
    "Correct Answers",
    "Incorrect Answers",
    "Correct Percentage",
];

const SIMPLE_BLOCK: usize = 10;

/// One line of the statistics report.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct StatisticsRow {
    pub label: String,
    pub correct: usize,
    pub incorrect: usize,
    /// `correct / total * 100` with one decimal; `0.0` when there is nothing to count.
    pub percentage: String,
}

impl StatisticsRow {
    fn new(label: impl Into<String>, correct: usize, total: usize) -> Self {
        Self {
            label: label.into(),
            correct,
            incorrect: total - correct,
            percentage: percentage(correct, total),
        }
    }
}

/// Build the whole report: round rows, simple blocks, overall total, then one row per team.
pub fn statistics(session: &Session) -> Vec<StatisticsRow> {
    let teams = &session.teams;
    let mut rows = Vec::new();

    let yes_no = count_correct(teams, ScoreTableKind::YesNo, 0..ScoreTableKind::YesNo.rows());
    rows.push(StatisticsRow::new(
        ScoreTableKind::YesNo.label(),
        yes_no.0,
        yes_no.1,
    ));

    let simple_rows = ScoreTableKind::Simple.rows();
    for start in (0..simple_rows).step_by(SIMPLE_BLOCK) {
        let end = (start + SIMPLE_BLOCK).min(simple_rows);
        let (correct, total) = count_correct(teams, ScoreTableKind::Simple, start..end);
        rows.push(StatisticsRow::new(
            format!("Simple {}-{}", start + 1, end),
            correct,
            total,
        ));
    }
    let simple = count_correct(teams, ScoreTableKind::Simple, 0..simple_rows);
    rows.push(StatisticsRow::new("Total Simple", simple.0, simple.1));

    let hard = count_correct(teams, ScoreTableKind::Hard, 0..ScoreTableKind::Hard.rows());
    rows.push(StatisticsRow::new(
        ScoreTableKind::Hard.label(),
        hard.0,
        hard.1,
    ));

    let captain = count_correct(
        teams,
        ScoreTableKind::Captain,
        0..ScoreTableKind::Captain.rows(),
    );
    rows.push(StatisticsRow::new(
        ScoreTableKind::Captain.label(),
        captain.0,
        captain.1,
    ));

    let overall_correct = yes_no.0 + simple.0 + hard.0 + captain.0;
    let overall_total = yes_no.1 + simple.1 + hard.1 + captain.1;
    rows.push(StatisticsRow::new(
        "OVERALL TOTAL",
        overall_correct,
        overall_total,
    ));

    for team in teams.values() {
        let mut correct = 0;
        let mut total = 0;
        for table in ScoreTableKind::ALL {
            for (row, cell) in team.column(table).iter().enumerate() {
                if !table.counts_row(row) {
                    continue;
                }
                total += 1;
                if cell.is_some_and(|value| table.is_correct(value)) {
                    correct += 1;
                }
            }
        }
        rows.push(StatisticsRow::new(team.name.clone(), correct, total));
    }

    rows
}

/// Render the report as CSV with every field quoted.
pub fn statistics_csv(rows: &[StatisticsRow]) -> Result<String, StorageError> {
    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .from_writer(Vec::new());

    let encode = |err: csv::Error| StorageError::malformed("failed to encode statistics".into(), err);
    writer.write_record(CSV_HEADER).map_err(encode)?;
    for row in rows {
        writer
            .write_record([
                row.label.as_str(),
                &row.correct.to_string(),
                &row.incorrect.to_string(),
                &row.percentage,
            ])
            .map_err(encode)?;
    }

    let bytes = writer.into_inner().map_err(|err| {
        StorageError::malformed("failed to flush statistics".into(), err.into_error())
    })?;
    String::from_utf8(bytes)
        .map_err(|err| StorageError::malformed("statistics are not valid UTF-8".into(), err))
}

/// `(correct, counted)` over `rows` of `table`, skipping rows excluded from scoring.
fn count_correct(
    teams: &Teams,
    table: ScoreTableKind,
    rows: std::ops::Range<usize>,
) -> (usize, usize) {
    rows.filter(|row| table.counts_row(*row))
        .fold((0, 0), |(correct, total), row| {
            let hit = scores::classify_row(teams, table, row) == Some(RowClass::Affirmative);
            (correct + usize::from(hit), total + 1)
        })
}

fn percentage(correct: usize, total: usize) -> String {
    if total == 0 {
        return "0.0".to_string();
    }
    format!("{:.1}", correct as f64 / total as f64 * 100.0)
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::state::{game::TeamColor, scores::set_cell};

    fn session() -> Session {
        Session::new(datetime!(2024-03-09 18:05:07 UTC))
    }

    fn row<'a>(rows: &'a [StatisticsRow], label: &str) -> &'a StatisticsRow {
        rows.iter()
            .find(|row| row.label == label)
            .unwrap_or_else(|| panic!("missing row {label}"))
    }

    #[test]
    fn empty_session_reports_zero_correct() {
        let rows = statistics(&session());

        assert_eq!(rows.len(), 9 + 6);
        let overall = row(&rows, "OVERALL TOTAL");
        assert_eq!(overall.correct, 0);
        assert_eq!(overall.incorrect, 1 + 40 + 20 + 9);
        assert_eq!(overall.percentage, "0.0");
        assert_eq!(row(&rows, "Captain's Round").incorrect, 9);
    }

    #[test]
    fn simple_blocks_and_totals() {
        let mut session = session();
        let teams = &mut session.teams;
        set_cell(teams, ScoreTableKind::Simple, 1, TeamColor::Red, "1");
        set_cell(teams, ScoreTableKind::Simple, 12, TeamColor::Blue, "2");
        set_cell(teams, ScoreTableKind::Simple, 13, TeamColor::Blue, "1");
        set_cell(teams, ScoreTableKind::Simple, 13, TeamColor::Pink, "1");

        let rows = statistics(&session);
        assert_eq!(row(&rows, "Simple 1-10").correct, 1);
        assert_eq!(row(&rows, "Simple 1-10").percentage, "10.0");
        assert_eq!(row(&rows, "Simple 11-20").correct, 1);
        assert_eq!(row(&rows, "Total Simple").correct, 2);
        assert_eq!(row(&rows, "Total Simple").incorrect, 38);
        assert_eq!(row(&rows, "Total Simple").percentage, "5.0");
    }

    #[test]
    fn captain_first_row_is_excluded_everywhere() {
        let mut session = session();
        let teams = &mut session.teams;
        set_cell(teams, ScoreTableKind::Captain, 1, TeamColor::Green, "1");
        set_cell(teams, ScoreTableKind::Captain, 2, TeamColor::Green, "1");
        set_cell(teams, ScoreTableKind::YesNo, 1, TeamColor::White, "50");

        let rows = statistics(&session);
        let captain = row(&rows, "Captain's Round");
        assert_eq!((captain.correct, captain.incorrect), (1, 8));
        assert_eq!(captain.percentage, "11.1");
        assert_eq!(row(&rows, "Yes/No Round").correct, 1);
        assert_eq!(row(&rows, "OVERALL TOTAL").correct, 2);

        let green = row(&rows, "Green Team");
        assert_eq!((green.correct, green.incorrect), (1, 69));
        assert_eq!(row(&rows, "White Team").correct, 1);
    }

    #[test]
    fn csv_export_quotes_every_field() {
        let rows = vec![StatisticsRow::new("Captain's Round", 1, 9)];
        let csv = statistics_csv(&rows).unwrap();

        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("\"Round Name\",\"Correct Answers\",\"Incorrect Answers\",\"Correct Percentage\"")
        );
        assert_eq!(lines.next(), Some("\"Captain's Round\",\"1\",\"8\",\"11.1\""));
        assert_eq!(lines.next(), None);
    }
}
