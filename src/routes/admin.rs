use axum::{
    Json, Router,
    body::Body,
    extract::{Path, State},
    http::{Request, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use validator::Validate;

use crate::{
    dto::{
        admin::{
            ActionResponse, AddPointsRequest, AddPointsResponse, CellUpdateRequest,
            CellUpdateResponse, QuestionsUploadRequest, RenameTeamRequest, RoundPointerResponse,
            SignalRequest, SignalResponse, StartTimerRequest, StepRequest, ToggleResponse,
            VisibilityRequest,
        },
        export::{ImportDocument, SessionExport},
        public::QuestionView,
    },
    error::AppError,
    services::{admin_service, buzzer_service, timer_service},
    state::{
        SharedState,
        game::{Session, TeamColor, TimerState},
    },
};

const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Moderator endpoints. Every route requires the token issued by `/sse/admin`.
pub fn router(state: SharedState) -> Router<SharedState> {
    Router::new()
        .route("/admin/signal", post(signal))
        .route("/admin/output/reset", post(reset_output))
        .route("/admin/round", post(change_round))
        .route("/admin/question", post(change_question))
        .route("/admin/timer/start", post(start_timer))
        .route("/admin/timer/stop", post(stop_timer))
        .route("/admin/timer/reset", post(reset_timer))
        .route("/admin/cells", put(update_cell))
        .route("/admin/points", post(add_points))
        .route("/admin/teams/{team}/name", put(rename_team))
        .route("/admin/teams/{team}/visibility", put(set_team_visibility))
        .route("/admin/mute", post(toggle_mute))
        .route("/admin/answer/toggle", post(toggle_answer))
        .route("/admin/session", get(get_session))
        .route("/admin/session/reset", post(reset_session))
        .route("/admin/session/clear-scores", post(clear_scores))
        .route("/admin/export", get(export_session))
        .route("/admin/import", post(import_teams))
        .route(
            "/admin/questions",
            post(upload_questions).delete(clear_questions),
        )
        .route("/admin/questions/next", post(next_question))
        .route("/admin/questions/prev", post(prev_question))
        .route("/admin/statistics.csv", get(statistics_csv))
        .route_layer(middleware::from_fn_with_state(state, require_admin_token))
}

/// Relay a key press from the moderator page to the arbiter.
#[utoipa::path(
    post,
    path = "/admin/signal",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    request_body = SignalRequest,
    responses((status = 200, description = "How the signal was handled", body = SignalResponse))
)]
pub async fn signal(
    State(state): State<SharedState>,
    Json(payload): Json<SignalRequest>,
) -> Json<SignalResponse> {
    Json(buzzer_service::handle_signal(&state, &payload.token).into())
}

/// Clear the buzzer race and the countdown for the next question.
#[utoipa::path(
    post,
    path = "/admin/output/reset",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    responses((status = 200, description = "Race cleared", body = ActionResponse))
)]
pub async fn reset_output(State(state): State<SharedState>) -> Json<ActionResponse> {
    buzzer_service::reset_output(&state);
    Json(ActionResponse::new("output reset"))
}

/// Move the round pointer.
#[utoipa::path(
    post,
    path = "/admin/round",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    request_body = StepRequest,
    responses((status = 200, description = "Round pointer after the move", body = RoundPointerResponse))
)]
pub async fn change_round(
    State(state): State<SharedState>,
    Json(payload): Json<StepRequest>,
) -> Json<RoundPointerResponse> {
    Json(admin_service::change_round(&state, payload.delta))
}

/// Move the question pointer within the active round.
#[utoipa::path(
    post,
    path = "/admin/question",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    request_body = StepRequest,
    responses((status = 200, description = "Round pointer after the move", body = RoundPointerResponse))
)]
pub async fn change_question(
    State(state): State<SharedState>,
    Json(payload): Json<StepRequest>,
) -> Json<RoundPointerResponse> {
    Json(admin_service::change_question(&state, payload.delta))
}

/// Start a countdown, replacing any running one.
#[utoipa::path(
    post,
    path = "/admin/timer/start",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    request_body = StartTimerRequest,
    responses(
        (status = 200, description = "Countdown started", body = TimerState),
        (status = 400, description = "Invalid duration")
    )
)]
pub async fn start_timer(
    State(state): State<SharedState>,
    Json(payload): Json<StartTimerRequest>,
) -> Result<Json<TimerState>, AppError> {
    payload.validate()?;
    Ok(Json(timer_service::start_timer(&state, payload.duration)?))
}

/// Stop the countdown and lock the buzzers.
#[utoipa::path(
    post,
    path = "/admin/timer/stop",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    responses((status = 200, description = "Whether a countdown was running", body = ToggleResponse))
)]
pub async fn stop_timer(State(state): State<SharedState>) -> Json<ToggleResponse> {
    Json(ToggleResponse {
        enabled: timer_service::stop_timer(&state),
    })
}

/// Cancel the countdown without the end cue.
#[utoipa::path(
    post,
    path = "/admin/timer/reset",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    responses((status = 200, description = "Countdown cancelled", body = ActionResponse))
)]
pub async fn reset_timer(State(state): State<SharedState>) -> Json<ActionResponse> {
    timer_service::reset_timer(&state);
    Json(ActionResponse::new("timer reset"))
}

/// Edit one score cell.
#[utoipa::path(
    put,
    path = "/admin/cells",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    request_body = CellUpdateRequest,
    responses(
        (status = 200, description = "Cell updated", body = CellUpdateResponse),
        (status = 400, description = "Row outside the table")
    )
)]
pub async fn update_cell(
    State(state): State<SharedState>,
    Json(payload): Json<CellUpdateRequest>,
) -> Result<Json<CellUpdateResponse>, AppError> {
    Ok(Json(admin_service::set_cell(&state, payload)?))
}

/// Award points to a team for the current question.
#[utoipa::path(
    post,
    path = "/admin/points",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    request_body = AddPointsRequest,
    responses((status = 200, description = "Award outcome", body = AddPointsResponse))
)]
pub async fn add_points(
    State(state): State<SharedState>,
    Json(payload): Json<AddPointsRequest>,
) -> Json<AddPointsResponse> {
    let award = buzzer_service::add_points(&state, payload.team, payload.points);
    let question = state.snapshot().current_question;
    Json(AddPointsResponse::from_award(award, question))
}

/// Rename a team.
#[utoipa::path(
    put,
    path = "/admin/teams/{team}/name",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream"),
    ("team" = TeamColor, Path, description = "Team color")),
    request_body = RenameTeamRequest,
    responses(
        (status = 204, description = "Team renamed"),
        (status = 400, description = "Blank or overly long name")
    )
)]
pub async fn rename_team(
    State(state): State<SharedState>,
    Path(team): Path<TeamColor>,
    Json(payload): Json<RenameTeamRequest>,
) -> Result<StatusCode, AppError> {
    payload.validate()?;
    admin_service::rename_team(&state, team, &payload.name)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Show or hide a team on the scoreboard.
#[utoipa::path(
    put,
    path = "/admin/teams/{team}/visibility",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream"),
    ("team" = TeamColor, Path, description = "Team color")),
    request_body = VisibilityRequest,
    responses((status = 204, description = "Visibility updated"))
)]
pub async fn set_team_visibility(
    State(state): State<SharedState>,
    Path(team): Path<TeamColor>,
    Json(payload): Json<VisibilityRequest>,
) -> Result<StatusCode, AppError> {
    admin_service::set_team_visibility(&state, team, payload.visible)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Mute or unmute every cue.
#[utoipa::path(
    post,
    path = "/admin/mute",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    responses((status = 200, description = "Mute flag after the toggle", body = ToggleResponse))
)]
pub async fn toggle_mute(State(state): State<SharedState>) -> Json<ToggleResponse> {
    Json(ToggleResponse {
        enabled: admin_service::toggle_mute(&state),
    })
}

/// Reveal or hide the current answer on the displays.
#[utoipa::path(
    post,
    path = "/admin/answer/toggle",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    responses((status = 200, description = "Answer visibility after the toggle", body = ToggleResponse))
)]
pub async fn toggle_answer(State(state): State<SharedState>) -> Json<ToggleResponse> {
    Json(ToggleResponse {
        enabled: admin_service::toggle_answer_visibility(&state),
    })
}

/// Full session, answers included.
#[utoipa::path(
    get,
    path = "/admin/session",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    responses((status = 200, description = "Current session", body = Session))
)]
pub async fn get_session(State(state): State<SharedState>) -> Json<Session> {
    Json(state.snapshot())
}

/// Start a brand new session.
#[utoipa::path(
    post,
    path = "/admin/session/reset",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    responses((status = 200, description = "The new session", body = Session))
)]
pub async fn reset_session(State(state): State<SharedState>) -> Json<Session> {
    Json(admin_service::reset_session(&state))
}

/// Wipe scores, keeping the session and team names.
#[utoipa::path(
    post,
    path = "/admin/session/clear-scores",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    responses((status = 200, description = "The cleared session", body = Session))
)]
pub async fn clear_scores(State(state): State<SharedState>) -> Json<Session> {
    Json(admin_service::clear_scores(&state))
}

/// Download the teams and scores as JSON.
#[utoipa::path(
    get,
    path = "/admin/export",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    responses((status = 200, description = "Session export", body = SessionExport))
)]
pub async fn export_session(State(state): State<SharedState>) -> Response {
    let export = admin_service::export_snapshot(&state);
    let filename = format!(
        "attachment; filename=\"brain-ring-{}.json\"",
        export.session_id
    );
    ([(header::CONTENT_DISPOSITION, filename)], Json(export)).into_response()
}

/// Merge teams and scores from an earlier export.
#[utoipa::path(
    post,
    path = "/admin/import",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    request_body = ImportDocument,
    responses(
        (status = 200, description = "Teams merged", body = ActionResponse),
        (status = 400, description = "A column has the wrong length")
    )
)]
pub async fn import_teams(
    State(state): State<SharedState>,
    Json(payload): Json<ImportDocument>,
) -> Result<Json<ActionResponse>, AppError> {
    let merged = admin_service::import_teams(&state, payload)?;
    Ok(Json(ActionResponse::new(format!("{merged} teams imported"))))
}

/// Replace the question list.
#[utoipa::path(
    post,
    path = "/admin/questions",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    request_body = QuestionsUploadRequest,
    responses(
        (status = 200, description = "Questions loaded", body = ActionResponse),
        (status = 400, description = "Unreadable question list")
    )
)]
pub async fn upload_questions(
    State(state): State<SharedState>,
    Json(payload): Json<QuestionsUploadRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    let count = admin_service::load_questions(&state, &payload.csv)?;
    Ok(Json(ActionResponse::new(format!("{count} questions loaded"))))
}

/// Drop the question list.
#[utoipa::path(
    delete,
    path = "/admin/questions",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    responses((status = 204, description = "Question list cleared"))
)]
pub async fn clear_questions(State(state): State<SharedState>) -> StatusCode {
    admin_service::clear_questions(&state);
    StatusCode::NO_CONTENT
}

/// Advance to the next question of the list.
#[utoipa::path(
    post,
    path = "/admin/questions/next",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    responses(
        (status = 200, description = "Question under the cursor", body = QuestionView),
        (status = 404, description = "No question list loaded")
    )
)]
pub async fn next_question(
    State(state): State<SharedState>,
) -> Result<Json<QuestionView>, AppError> {
    admin_service::next_question(&state)
        .map(Json)
        .ok_or_else(|| AppError::NotFound("no question list loaded".into()))
}

/// Go back to the previous question of the list.
#[utoipa::path(
    post,
    path = "/admin/questions/prev",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    responses(
        (status = 200, description = "Question under the cursor", body = QuestionView),
        (status = 404, description = "No question list loaded")
    )
)]
pub async fn prev_question(
    State(state): State<SharedState>,
) -> Result<Json<QuestionView>, AppError> {
    admin_service::prev_question(&state)
        .map(Json)
        .ok_or_else(|| AppError::NotFound("no question list loaded".into()))
}

/// Download the statistics report as CSV.
#[utoipa::path(
    get,
    path = "/admin/statistics.csv",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    responses((status = 200, description = "Statistics report", content_type = "text/csv", body = String))
)]
pub async fn statistics_csv(State(state): State<SharedState>) -> Result<Response, AppError> {
    let csv = admin_service::statistics_csv(&state)?;
    let session_id = state.snapshot().session_id;
    let disposition = format!("attachment; filename=\"statistics-{session_id}.csv\"");
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        csv,
    )
        .into_response())
}

async fn require_admin_token(
    State(state): State<SharedState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let provided = req
        .headers()
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_owned())
        .ok_or_else(|| {
            AppError::Unauthorized("missing admin token header `X-Admin-Token`".into())
        })?;

    let admin = state.admin_stream();
    if admin.accepts(&provided).await {
        return Ok(next.run(req).await);
    }
    if admin.token().lock().await.is_none() {
        return Err(AppError::Unauthorized(
            "admin SSE stream not initialised yet".into(),
        ));
    }
    Err(AppError::Unauthorized("invalid admin token".into()))
}
