use crate::{
    dto::public::{PublicSnapshot, QuestionView, TableView},
    error::ServiceError,
    services::statistics::{self, StatisticsRow},
    state::{SharedState, game::ScoreTableKind},
};

/// Display view of the session, with unrevealed answers removed.
pub fn session_snapshot(state: &SharedState) -> PublicSnapshot {
    PublicSnapshot::from(&state.snapshot())
}

/// One score table with row classes and column sums.
pub fn table_view(state: &SharedState, table: ScoreTableKind) -> TableView {
    TableView::build(&state.snapshot(), table)
}

/// Question under the cursor, answer hidden unless revealed.
pub fn current_question(state: &SharedState) -> Result<QuestionView, ServiceError> {
    QuestionView::current(&state.snapshot())
        .ok_or_else(|| ServiceError::NotFound("no question list loaded".into()))
}

/// Statistics report for the current scores.
pub fn statistics(state: &SharedState) -> Vec<StatisticsRow> {
    statistics::statistics(&state.snapshot())
}
