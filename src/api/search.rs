use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::models::{SearchRequest, SearchResponse};
use crate::state::AppState;

/// POST /codebases/{id}/indexing/search - Embed the query and rank
/// indexed chunks by cosine similarity
pub async fn search(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, (StatusCode, String)> {
    let response = crate::search::search(&state, id, req)
        .await
        .map_err(|e| e.into_api())?;
    Ok(Json(response))
}
