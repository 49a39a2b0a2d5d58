use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::models::{Codebase, RegisterCodebaseRequest};
use crate::state::AppState;

/// POST /codebases - Register a codebase and create default settings
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterCodebaseRequest>,
) -> Result<(StatusCode, Json<Codebase>), (StatusCode, String)> {
    let codebase = state
        .settings
        .register(&req.name, &req.root_path, &state.config.embedder.default_model)
        .map_err(|e| e.into_api())?;
    tracing::info!("Registered codebase {} at {}", codebase.name, codebase.root_path.display());
    Ok((StatusCode::CREATED, Json(codebase)))
}

/// GET /codebases - List registered codebases
pub async fn list(State(state): State<AppState>) -> Json<Vec<Codebase>> {
    Json(state.settings.list())
}

/// DELETE /codebases/{id} - Remove a codebase, its settings, run
/// history, and index data
pub async fn remove(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    state.settings.get(id).map_err(|e| e.into_api())?;

    if state.runs.current_run(id).is_some() {
        return Err((
            StatusCode::CONFLICT,
            "an indexing run is active; cancel it before deleting the codebase".to_string(),
        ));
    }

    state.settings.remove(id).map_err(|e| e.into_api())?;
    state.runs.remove_codebase(id);
    if let Err(e) = state.store.clear(id) {
        tracing::warn!("Failed to remove index data for {id}: {e}");
    }

    Ok(StatusCode::NO_CONTENT)
}
