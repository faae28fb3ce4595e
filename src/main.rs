//! Brain Ring Back binary entrypoint wiring REST, WebSocket, SSE and the file-backed session store.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use brain_ring_back::{
    config::AppConfig,
    dao::{kv_store::FileStore, questions},
    routes,
    services::admin_service,
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let backend = FileStore::new(config.storage_dir().clone());
    info!(dir = %backend.dir().display(), "session storage ready");
    let app_state =
        AppState::new(config, Arc::new(backend)).context("building the token table")?;

    preload_questions(&app_state);

    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Load the configured question list, if any. A restored session keeps its own list.
fn preload_questions(state: &SharedState) {
    let Some(path) = state.config().questions_path().cloned() else {
        return;
    };
    if !state.snapshot().questions.is_empty() {
        info!("restored session already carries a question list");
        return;
    }
    match questions::load_questions_file(&path) {
        Ok(rows) if rows.is_empty() => warn!(path = %path.display(), "question list is empty"),
        Ok(rows) => {
            admin_service::install_questions(state, rows);
        }
        Err(err) => warn!(path = %path.display(), error = %err, "failed to load question list"),
    }
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
