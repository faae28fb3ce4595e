use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};

use crate::{
    dto::public::{PublicSnapshot, QuestionView, TableView},
    error::AppError,
    services::{public_service, statistics::StatisticsRow},
    state::{SharedState, game::ScoreTableKind},
};

/// Read-only endpoints used by the scoreboard and question displays.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/public/session", get(get_session))
        .route("/public/tables/{table}", get(get_table))
        .route("/public/question", get(get_question))
        .route("/public/statistics", get(get_statistics))
}

#[utoipa::path(
    get,
    path = "/public/session",
    tag = "public",
    responses((status = 200, description = "Scoreboard view of the session", body = PublicSnapshot))
)]
/// Return the session as shown on the displays.
pub async fn get_session(State(state): State<SharedState>) -> Json<PublicSnapshot> {
    Json(public_service::session_snapshot(&state))
}

#[utoipa::path(
    get,
    path = "/public/tables/{table}",
    tag = "public",
    params(("table" = ScoreTableKind, Path, description = "Score table (yes_no, simple, hard, captain)")),
    responses((status = 200, description = "Score table with row classes", body = TableView))
)]
/// Return one score table.
pub async fn get_table(
    State(state): State<SharedState>,
    Path(table): Path<ScoreTableKind>,
) -> Json<TableView> {
    Json(public_service::table_view(&state, table))
}

#[utoipa::path(
    get,
    path = "/public/question",
    tag = "public",
    responses(
        (status = 200, description = "Question under the cursor", body = QuestionView),
        (status = 404, description = "No question list loaded")
    )
)]
/// Return the current question; the answer only once revealed.
pub async fn get_question(State(state): State<SharedState>) -> Result<Json<QuestionView>, AppError> {
    Ok(Json(public_service::current_question(&state)?))
}

#[utoipa::path(
    get,
    path = "/public/statistics",
    tag = "public",
    responses((status = 200, description = "Per-round and per-team statistics", body = [StatisticsRow]))
)]
/// Return the statistics report.
pub async fn get_statistics(State(state): State<SharedState>) -> Json<Vec<StatisticsRow>> {
    Json(public_service::statistics(&state))
}
