use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::error::IndexError;
use crate::models::{
    IndexSettings, IndexStatistics, IndexingRun, IndexingStatus, IndexingStatusResponse,
    RunStatus, SettingsUpdate, TriggerRequest, TriggerResponse,
};
use crate::orchestrator::{self, TriggerOptions};
use crate::state::AppState;

/// GET /codebases/{id}/indexing/settings
pub async fn get_settings(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<IndexSettings>, (StatusCode, String)> {
    let settings = state.settings.get_settings(id).map_err(|e| e.into_api())?;
    Ok(Json(settings))
}

/// PATCH /codebases/{id}/indexing/settings - Partial update, validated;
/// 400 on configuration errors, prior settings intact
pub async fn update_settings(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<SettingsUpdate>,
) -> Result<Json<IndexSettings>, (StatusCode, String)> {
    let updated = state
        .settings
        .update_settings(id, patch)
        .map_err(|e| e.into_api())?;
    Ok(Json(updated))
}

/// GET /codebases/{id}/indexing/status - Settings, live run state, and
/// index statistics in one poll
pub async fn status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<IndexingStatusResponse>, (StatusCode, String)> {
    let settings = state.settings.get_settings(id).map_err(|e| e.into_api())?;

    let current_run_id = state.runs.current_run(id);
    let last_run = state.runs.last_run(id);
    let recent_runs = state.runs.recent(id, 10);

    let last_terminal = recent_runs.iter().find(|r| r.status.is_terminal());
    let statistics = IndexStatistics {
        total_embeddings: state.store.chunk_count(id),
        indexed_files: state.store.indexed_file_count(id),
        last_indexed_at: state.runs.last_completed(id).and_then(|r| r.end_time),
        last_index_status: last_terminal.map(|r| r.status),
    };

    Ok(Json(IndexingStatusResponse {
        settings,
        status: IndexingStatus {
            is_indexing_now: current_run_id.is_some(),
            current_run_id,
            last_run,
            recent_runs,
        },
        statistics,
    }))
}

/// POST /codebases/{id}/indexing/trigger - Start a run in the
/// background; 409 when one is already active
pub async fn trigger(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<TriggerRequest>,
) -> Result<(StatusCode, Json<TriggerResponse>), (StatusCode, String)> {
    let run = orchestrator::trigger(
        &state,
        id,
        TriggerOptions {
            is_full_index: req.is_full_index,
            priority_files: req.priority_files,
        },
    )
    .map_err(|e| e.into_api())?;

    Ok((
        StatusCode::ACCEPTED,
        Json(TriggerResponse {
            run_id: run.id,
            status: RunStatus::Pending,
            start_time: None,
        }),
    ))
}

/// GET /codebases/{id}/indexing/runs/{run_id} - Poll one run
pub async fn get_run(
    State(state): State<AppState>,
    Path((id, run_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<IndexingRun>, (StatusCode, String)> {
    let run = state
        .runs
        .get(run_id)
        .filter(|r| r.codebase_id == id)
        .ok_or_else(|| IndexError::NotFound(format!("run {run_id}")).into_api())?;
    Ok(Json(run))
}

/// POST /codebases/{id}/indexing/runs/{run_id}/cancel - Request
/// cooperative cancellation (honored between file iterations)
pub async fn cancel_run(
    State(state): State<AppState>,
    Path((id, run_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, (StatusCode, String)> {
    state
        .runs
        .get(run_id)
        .filter(|r| r.codebase_id == id)
        .ok_or_else(|| IndexError::NotFound(format!("run {run_id}")).into_api())?;
    state.runs.request_cancel(run_id).map_err(|e| e.into_api())?;
    Ok(StatusCode::ACCEPTED)
}

/// POST /codebases/{id}/indexing/commit-event - Webhook collaborator
/// signals new commits; the scheduler picks it up for `on_commit`
/// codebases on its next tick
pub async fn commit_event(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    state.settings.get(id).map_err(|e| e.into_api())?;
    state.commit_signals.set(id);
    tracing::debug!("Commit signal recorded for codebase {id}");
    Ok(StatusCode::ACCEPTED)
}
