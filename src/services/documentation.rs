use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Brain Ring Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::public_stream,
        crate::routes::sse::admin_stream,
        crate::routes::websocket::ws_handler,
        crate::routes::public::get_session,
        crate::routes::public::get_table,
        crate::routes::public::get_question,
        crate::routes::public::get_statistics,
        crate::routes::admin::signal,
        crate::routes::admin::reset_output,
        crate::routes::admin::change_round,
        crate::routes::admin::change_question,
        crate::routes::admin::start_timer,
        crate::routes::admin::stop_timer,
        crate::routes::admin::reset_timer,
        crate::routes::admin::update_cell,
        crate::routes::admin::add_points,
        crate::routes::admin::rename_team,
        crate::routes::admin::set_team_visibility,
        crate::routes::admin::toggle_mute,
        crate::routes::admin::toggle_answer,
        crate::routes::admin::get_session,
        crate::routes::admin::reset_session,
        crate::routes::admin::clear_scores,
        crate::routes::admin::export_session,
        crate::routes::admin::import_teams,
        crate::routes::admin::upload_questions,
        crate::routes::admin::clear_questions,
        crate::routes::admin::next_question,
        crate::routes::admin::prev_question,
        crate::routes::admin::statistics_csv,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::ws::BridgeInboundMessage,
            crate::dto::ws::BridgeAck,
            crate::dto::sse::Handshake,
            crate::dto::sse::SystemStatus,
            crate::dto::sse::NotificationEvent,
            crate::dto::sse::TimerEvent,
            crate::dto::sse::AudioEvent,
            crate::dto::sse::CellEvent,
            crate::dto::public::PublicSnapshot,
            crate::dto::public::TableView,
            crate::dto::public::QuestionView,
            crate::dto::admin::SignalResponse,
            crate::dto::export::SessionExport,
            crate::services::statistics::StatisticsRow,
            crate::state::arbitration::ClickRecord,
            crate::state::game::Session,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "bridge", description = "WebSocket intake for the signal gateway"),
        (name = "public", description = "Read-only views for the displays"),
        (name = "admin", description = "Moderator controls"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_moderator_and_display_paths() {
        let doc = ApiDoc::openapi();
        for path in [
            "/healthcheck",
            "/ws/bridge",
            "/public/tables/{table}",
            "/admin/signal",
            "/admin/teams/{team}/name",
            "/admin/statistics.csv",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
