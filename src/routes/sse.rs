use std::convert::Infallible;

use axum::{Router, extract::State, response::sse::Sse, routing::get};
use futures::Stream;
use tracing::info;

use crate::{
    error::AppError,
    services::sse_service::{self, StreamKind},
    state::SharedState,
};

#[utoipa::path(
    get,
    path = "/sse/public",
    tag = "sse",
    responses((status = 200, description = "Display SSE stream", content_type = "text/event-stream", body = String))
)]
/// Stream snapshots, clicks, countdown and audio cues to the displays.
pub async fn public_stream(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>> {
    let subscription = sse_service::subscribe_public(&state);
    info!("new public SSE connection");
    sse_service::to_sse_stream(subscription, StreamKind::Public)
}

#[utoipa::path(
    get,
    path = "/sse/admin",
    tag = "sse",
    responses(
        (status = 200, description = "Moderator SSE stream; the handshake carries the admin token", content_type = "text/event-stream", body = String),
        (status = 401, description = "Another moderator stream is already open")
    )
)]
/// Stream moderator events and issue the admin token.
pub async fn admin_stream(
    State(state): State<SharedState>,
) -> Result<Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>>, AppError> {
    let subscription = sse_service::subscribe_admin(&state).await?;
    info!("new admin SSE connection");
    Ok(sse_service::to_sse_stream(
        subscription,
        StreamKind::Admin(state),
    ))
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/sse/public", get(public_stream))
        .route("/sse/admin", get(admin_stream))
}
