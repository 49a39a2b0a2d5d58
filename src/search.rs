use uuid::Uuid;

use crate::embedding;
use crate::error::{IndexError, Result};
use crate::models::{SearchRequest, SearchResponse, SearchResult, SearchResultMetadata};
use crate::state::AppState;

/// Embed a query and rank the codebase's chunks by cosine similarity.
///
/// An index with zero chunks is `NotIndexedError`, distinct from an
/// empty result set produced by an over-restrictive filter. Reads only
/// the store's read lock, so searches run concurrently with an active
/// indexing run and may observe a partially updated index.
pub async fn search(
    state: &AppState,
    codebase_id: Uuid,
    request: SearchRequest,
) -> Result<SearchResponse> {
    state.settings.get(codebase_id)?;

    let query = request.query.trim().to_string();
    if query.is_empty() {
        return Err(IndexError::Configuration("query is required".to_string()));
    }

    if state.store.chunk_count(codebase_id) == 0 {
        return Err(IndexError::NotIndexed);
    }

    // Embed with the model the index was built with, so the query
    // vector matches the stored dimension.
    let model = match state.store.embedding_model(codebase_id) {
        Some(model) => model,
        None => state.settings.get_settings(codebase_id)?.embedding_model,
    };

    let texts = vec![query.clone()];
    let vectors = embedding::embed_with_retry(
        state.embedder.as_ref(),
        &model,
        &texts,
        state.config.embed_max_attempts,
    )
    .await?;
    let vector = vectors
        .into_iter()
        .next()
        .ok_or_else(|| IndexError::EmbeddingProvider("no embedding returned for query".into()))?;

    let hits = state.store.query(
        codebase_id,
        &vector,
        request.limit,
        request.threshold,
        &request.file_patterns,
        &request.exclude_patterns,
    )?;

    let results: Vec<SearchResult> = hits
        .into_iter()
        .map(|(chunk, score)| SearchResult {
            chunk_id: chunk.chunk_id(),
            file_path: chunk.file_path,
            content: chunk.content,
            similarity_score: score,
            metadata: SearchResultMetadata {
                language: chunk.language,
                start_line: chunk.start_line,
                end_line: chunk.end_line,
                extracted_elements: chunk.extracted_elements,
                run_id: chunk.run_id,
            },
        })
        .collect();

    Ok(SearchResponse {
        query,
        result_count: results.len(),
        results,
    })
}
