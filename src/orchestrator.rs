use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use uuid::Uuid;

use crate::chunking;
use crate::embedding;
use crate::error::{IndexError, Result};
use crate::globs;
use crate::models::{Codebase, CodeChunk, IndexSettings, IndexingRun};
use crate::scanner::{self, FileRef};
use crate::state::AppState;

#[derive(Debug, Clone, Default)]
pub struct TriggerOptions {
    pub is_full_index: bool,
    /// Extra priority patterns for this run only.
    pub priority_files: Vec<String>,
}

/// Start an indexing run for a codebase.
///
/// Creates the pending run and claims the codebase's active slot
/// synchronously (so a conflicting trigger fails fast with
/// `ConflictError` and no run row), then executes the pipeline on a
/// background task. The caller gets the pending run back immediately.
pub fn trigger(state: &AppState, codebase_id: Uuid, opts: TriggerOptions) -> Result<IndexingRun> {
    let codebase = state.settings.get(codebase_id)?;
    let settings = state.settings.get_settings(codebase_id)?;
    globs::build(&opts.priority_files)
        .map_err(|e| IndexError::Configuration(format!("invalid priority_files pattern: {e}")))?;

    let run = state.runs.begin(codebase_id, opts.is_full_index)?;

    let state = state.clone();
    let run_id = run.id;
    tokio::spawn(async move {
        run_indexing(state, codebase, settings, run_id, opts).await;
    });

    Ok(run)
}

async fn run_indexing(
    state: AppState,
    codebase: Codebase,
    settings: IndexSettings,
    run_id: Uuid,
    opts: TriggerOptions,
) {
    state.runs.mark_running(run_id);
    tracing::info!(
        "Indexing run {run_id} started for {} (full: {})",
        codebase.name,
        opts.is_full_index
    );

    match execute_run(&state, &codebase, &settings, run_id, &opts).await {
        Ok(()) => {
            state.runs.complete(run_id);
            tracing::info!("Indexing run {run_id} completed for {}", codebase.name);
        }
        Err(e) => {
            tracing::error!("Indexing run {run_id} failed for {}: {e}", codebase.name);
            state.runs.fail(run_id, e.to_string());
        }
    }
}

enum FileOutcome {
    Indexed,
    Unchanged,
}

async fn execute_run(
    state: &AppState,
    codebase: &Codebase,
    settings: &IndexSettings,
    run_id: Uuid,
    opts: &TriggerOptions,
) -> Result<()> {
    // An incremental run against an index built with a different model
    // would mix embedding dimensions; escalate to a full reindex.
    let mut full = opts.is_full_index;
    if !full {
        if let Some(indexed_model) = state.store.embedding_model(codebase.id) {
            if indexed_model != settings.embedding_model {
                tracing::info!(
                    "Embedding model changed ({indexed_model} -> {}), escalating to full reindex",
                    settings.embedding_model
                );
                full = true;
            }
        }
    }

    if full {
        state.store.clear(codebase.id)?;
    }
    let prior_hashes = state.store.file_hashes(codebase.id);

    let root = codebase.root_path.clone();
    let scan_settings = settings.clone();
    let extra_priority = opts.priority_files.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        scanner::scan(&root, &scan_settings, &extra_priority)
    })
    .await
    .map_err(|e| IndexError::Scan(format!("scan task failed: {e}")))??;

    tracing::info!(
        "Scan of {} found {} candidate files ({} skipped)",
        codebase.name,
        outcome.files.len(),
        outcome.skipped.len()
    );

    let mut processed = 0usize;
    let mut indexed = 0usize;
    let mut skipped = 0usize;

    // Files the scanner could not keep still count in the statistics.
    for skip in &outcome.skipped {
        tracing::debug!("Scan skipped {} ({:?})", skip.relative_path, skip.reason);
        processed += 1;
        skipped += 1;
    }
    state.runs.record_progress(run_id, processed, indexed, skipped);

    // Previously-indexed paths the scanner no longer returns were
    // deleted from the tree; drop their chunks.
    if !full {
        let scanned: HashSet<&str> = outcome
            .files
            .iter()
            .map(|f| f.relative_path.as_str())
            .collect();
        for path in prior_hashes.keys().filter(|p| !scanned.contains(p.as_str())) {
            state.store.delete_file(codebase.id, path)?;
            tracing::info!("Removed deleted file {path} from index");
        }
    }

    let semaphore = Arc::new(Semaphore::new(state.config.embed_concurrency));
    for file in &outcome.files {
        // Cancellation is cooperative: checked between files, so
        // in-flight batches for the current file always complete.
        if state.runs.is_cancel_requested(run_id) {
            state.runs.record_progress(run_id, processed, indexed, skipped);
            return Err(IndexError::Cancelled);
        }

        processed += 1;
        match index_one_file(state, codebase, settings, run_id, file, &prior_hashes, full, &semaphore)
            .await
        {
            Ok(FileOutcome::Indexed) => indexed += 1,
            Ok(FileOutcome::Unchanged) => skipped += 1,
            Err(IndexError::Storage(message)) => {
                // Persistence failures are fatal to the run.
                state.runs.record_progress(run_id, processed, indexed, skipped);
                return Err(IndexError::Storage(message));
            }
            Err(e) => {
                skipped += 1;
                tracing::warn!("Skipping {}: {e}", file.relative_path);
            }
        }
        state.runs.record_progress(run_id, processed, indexed, skipped);
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn index_one_file(
    state: &AppState,
    codebase: &Codebase,
    settings: &IndexSettings,
    run_id: Uuid,
    file: &FileRef,
    prior_hashes: &HashMap<String, String>,
    full: bool,
    semaphore: &Arc<Semaphore>,
) -> Result<FileOutcome> {
    let content = std::fs::read_to_string(&file.path)
        .map_err(|e| IndexError::Scan(format!("read {}: {e}", file.relative_path)))?;
    let content_hash = sha256_hex(&content);

    if !full && prior_hashes.get(&file.relative_path) == Some(&content_hash) {
        return Ok(FileOutcome::Unchanged);
    }

    let windows = chunking::split(
        &content,
        settings.chunk_size,
        settings.chunk_overlap,
        settings.include_comments,
        &file.language,
    );

    if windows.is_empty() {
        // The file emptied out; replacing with nothing removes stale
        // chunks from earlier runs.
        state.store.upsert_file(codebase.id, &file.relative_path, Vec::new())?;
        return Ok(FileOutcome::Indexed);
    }

    // Prepend the path so the embedding carries file context.
    let texts: Vec<String> = windows
        .iter()
        .map(|w| format!("File: {}\n{}", file.relative_path, w.text))
        .collect();
    let vectors = embed_batched(state, &settings.embedding_model, texts, semaphore).await?;

    let now = chrono::Utc::now();
    let chunks: Vec<CodeChunk> = windows
        .into_iter()
        .zip(vectors)
        .enumerate()
        .map(|(i, (window, vector))| CodeChunk {
            codebase_id: codebase.id,
            file_path: file.relative_path.clone(),
            chunk_index: i,
            start_line: window.start_line,
            end_line: window.end_line,
            extracted_elements: chunking::elements::extract(&window.text, &file.language),
            content: window.text,
            content_hash: content_hash.clone(),
            vector,
            embedding_model: settings.embedding_model.clone(),
            language: file.language.clone(),
            run_id,
            created_at: now,
        })
        .collect();

    state
        .store
        .upsert_file(codebase.id, &file.relative_path, chunks)?;
    Ok(FileOutcome::Indexed)
}

/// Embed a file's chunk texts in fixed-size batches with bounded
/// parallelism, reassembling vectors in input order.
async fn embed_batched(
    state: &AppState,
    model: &str,
    texts: Vec<String>,
    semaphore: &Arc<Semaphore>,
) -> Result<Vec<Vec<f32>>> {
    let expected = texts.len();
    let batches: Vec<Vec<String>> = texts
        .chunks(state.config.embed_batch_size.max(1))
        .map(|batch| batch.to_vec())
        .collect();
    let batch_count = batches.len();

    let mut join_set = JoinSet::new();
    for (batch_index, batch) in batches.into_iter().enumerate() {
        let semaphore = semaphore.clone();
        let embedder = state.embedder.clone();
        let model = model.to_string();
        let max_attempts = state.config.embed_max_attempts;
        join_set.spawn(async move {
            let _permit = semaphore.acquire_owned().await.map_err(|_| {
                IndexError::EmbeddingProvider("embedding semaphore closed".to_string())
            })?;
            let vectors =
                embedding::embed_with_retry(embedder.as_ref(), &model, &batch, max_attempts)
                    .await?;
            Ok::<(usize, Vec<Vec<f32>>), IndexError>((batch_index, vectors))
        });
    }

    let mut parts: Vec<Option<Vec<Vec<f32>>>> = vec![None; batch_count];
    while let Some(joined) = join_set.join_next().await {
        let (batch_index, vectors) = joined
            .map_err(|e| IndexError::EmbeddingProvider(format!("embedding task failed: {e}")))??;
        parts[batch_index] = Some(vectors);
    }

    let mut out = Vec::with_capacity(expected);
    for part in parts {
        match part {
            Some(vectors) => out.extend(vectors),
            None => {
                return Err(IndexError::EmbeddingProvider(
                    "missing embedding batch result".to_string(),
                ))
            }
        }
    }
    Ok(out)
}

pub fn sha256_hex(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}
