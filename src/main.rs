use axum::routing::{delete, get, patch, post};
use axum::Router;
use tracing_subscriber::EnvFilter;

use codebase_index::api;
use codebase_index::config::Config;
use codebase_index::scheduler;
use codebase_index::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    tracing::info!("Data directory: {}", config.data_dir.display());
    tracing::info!(
        "Embedding provider: {} ({})",
        config.embedder.provider,
        config.embedder.base_url
    );

    let state = AppState::new(config.clone())?;

    // The scheduler shares the same state the settings endpoints write,
    // so frequency changes apply on its next tick.
    tokio::spawn(scheduler::run(state.clone()));

    let app = Router::new()
        .route("/codebases", post(api::codebases::register))
        .route("/codebases", get(api::codebases::list))
        .route("/codebases/{id}", delete(api::codebases::remove))
        .route(
            "/codebases/{id}/indexing/settings",
            get(api::indexing::get_settings),
        )
        .route(
            "/codebases/{id}/indexing/settings",
            patch(api::indexing::update_settings),
        )
        .route("/codebases/{id}/indexing/status", get(api::indexing::status))
        .route(
            "/codebases/{id}/indexing/trigger",
            post(api::indexing::trigger),
        )
        .route(
            "/codebases/{id}/indexing/runs/{run_id}",
            get(api::indexing::get_run),
        )
        .route(
            "/codebases/{id}/indexing/runs/{run_id}/cancel",
            post(api::indexing::cancel_run),
        )
        .route(
            "/codebases/{id}/indexing/commit-event",
            post(api::indexing::commit_event),
        )
        .route("/codebases/{id}/indexing/search", post(api::search::search))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
