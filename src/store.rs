use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::{IndexError, Result};
use crate::globs;
use crate::models::CodeChunk;

/// All chunks for one codebase.
#[derive(Debug, Default, Serialize, Deserialize)]
struct CodebaseIndex {
    chunks: Vec<CodeChunk>,
}

/// Persisted chunk + vector store with per-file atomic replacement and
/// cosine similarity queries.
///
/// Mutations hold the write lock for their whole critical section, so a
/// concurrent reader observes a file's old chunk set or its complete
/// new one, never a partial state.
pub struct IndexStore {
    codebases: RwLock<HashMap<Uuid, CodebaseIndex>>,
    index_dir: PathBuf,
}

impl IndexStore {
    pub fn open_or_create(index_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(index_dir)
            .map_err(|e| IndexError::Storage(format!("create {}: {e}", index_dir.display())))?;

        let mut codebases = HashMap::new();
        let entries = std::fs::read_dir(index_dir)
            .map_err(|e| IndexError::Storage(format!("read {}: {e}", index_dir.display())))?;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(id) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| Uuid::parse_str(s).ok())
            else {
                continue;
            };
            match std::fs::read_to_string(&path) {
                Ok(data) => match serde_json::from_str::<CodebaseIndex>(&data) {
                    Ok(index) => {
                        codebases.insert(id, index);
                    }
                    Err(e) => tracing::warn!("Skipping corrupt index file {}: {e}", path.display()),
                },
                Err(e) => tracing::warn!("Failed to read index file {}: {e}", path.display()),
            }
        }

        Ok(Self {
            codebases: RwLock::new(codebases),
            index_dir: index_dir.to_path_buf(),
        })
    }

    fn index_path(&self, codebase_id: Uuid) -> PathBuf {
        self.index_dir.join(format!("{codebase_id}.json"))
    }

    /// Persist one codebase's chunks (atomic write via temp file +
    /// rename). Called with the write lock held.
    fn persist(&self, codebase_id: Uuid, index: &CodebaseIndex) -> Result<()> {
        let path = self.index_path(codebase_id);
        let data = serde_json::to_string(index)
            .map_err(|e| IndexError::Storage(format!("serialize index: {e}")))?;
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, data)
            .map_err(|e| IndexError::Storage(format!("write {}: {e}", tmp_path.display())))?;
        std::fs::rename(&tmp_path, &path)
            .map_err(|e| IndexError::Storage(format!("rename {}: {e}", path.display())))?;
        Ok(())
    }

    /// Atomically replace all chunks for a file with the new set. An
    /// empty `chunks` clears the file's entries (an emptied file).
    ///
    /// Rejects vectors whose dimension disagrees with the rest of the
    /// codebase's index; one embedding model/dimension per codebase.
    pub fn upsert_file(
        &self,
        codebase_id: Uuid,
        file_path: &str,
        chunks: Vec<CodeChunk>,
    ) -> Result<()> {
        let mut map = self.codebases.write();
        let index = map.entry(codebase_id).or_default();

        if let Some(new_dim) = chunks.first().map(|c| c.vector.len()) {
            if chunks.iter().any(|c| c.vector.len() != new_dim) {
                return Err(IndexError::Storage(format!(
                    "mixed vector dimensions within chunk set for {file_path}"
                )));
            }
            if let Some(existing) = index.chunks.iter().find(|c| c.file_path != file_path) {
                if existing.vector.len() != new_dim {
                    return Err(IndexError::Storage(format!(
                        "vector dimension {new_dim} for {file_path} conflicts with \
                         existing index dimension {}",
                        existing.vector.len()
                    )));
                }
            }
        }

        index.chunks.retain(|c| c.file_path != file_path);
        index.chunks.extend(chunks);
        self.persist(codebase_id, index)
    }

    /// Remove all chunks for a file (the file was deleted from the
    /// tree).
    pub fn delete_file(&self, codebase_id: Uuid, file_path: &str) -> Result<()> {
        let mut map = self.codebases.write();
        let Some(index) = map.get_mut(&codebase_id) else {
            return Ok(());
        };
        index.chunks.retain(|c| c.file_path != file_path);
        self.persist(codebase_id, index)
    }

    /// Remove all chunks for a codebase (full reindex or cleanup).
    pub fn clear(&self, codebase_id: Uuid) -> Result<()> {
        let mut map = self.codebases.write();
        map.remove(&codebase_id);
        let path = self.index_path(codebase_id);
        if path.exists() {
            std::fs::remove_file(&path)
                .map_err(|e| IndexError::Storage(format!("remove {}: {e}", path.display())))?;
        }
        Ok(())
    }

    /// Rank chunks by cosine similarity against a query vector. Glob
    /// filters apply to `file_path` before ranking; only scores at or
    /// above `threshold` are returned, at most `limit` of them,
    /// descending.
    pub fn query(
        &self,
        codebase_id: Uuid,
        vector: &[f32],
        limit: usize,
        threshold: f32,
        file_patterns: &[String],
        exclude_patterns: &[String],
    ) -> Result<Vec<(CodeChunk, f32)>> {
        let include = globs::build(file_patterns)
            .map_err(|e| IndexError::Configuration(format!("invalid file pattern: {e}")))?;
        let exclude = globs::build(exclude_patterns)
            .map_err(|e| IndexError::Configuration(format!("invalid exclude pattern: {e}")))?;

        let map = self.codebases.read();
        let Some(index) = map.get(&codebase_id) else {
            return Ok(Vec::new());
        };

        let mut scored: Vec<(f32, &CodeChunk)> = index
            .chunks
            .iter()
            .filter(|c| file_patterns.is_empty() || include.is_match(&c.file_path))
            .filter(|c| !exclude.is_match(&c.file_path))
            .map(|c| (cosine_similarity(vector, &c.vector), c))
            .filter(|(score, _)| *score >= threshold)
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);

        Ok(scored
            .into_iter()
            .map(|(score, c)| (c.clone(), score))
            .collect())
    }

    /// Latest indexed content hash per file path.
    pub fn file_hashes(&self, codebase_id: Uuid) -> HashMap<String, String> {
        let map = self.codebases.read();
        let mut hashes = HashMap::new();
        if let Some(index) = map.get(&codebase_id) {
            for chunk in &index.chunks {
                hashes
                    .entry(chunk.file_path.clone())
                    .or_insert_with(|| chunk.content_hash.clone());
            }
        }
        hashes
    }

    /// The embedding model the codebase's index was built with, if any
    /// chunks exist.
    pub fn embedding_model(&self, codebase_id: Uuid) -> Option<String> {
        let map = self.codebases.read();
        map.get(&codebase_id)
            .and_then(|index| index.chunks.first())
            .map(|c| c.embedding_model.clone())
    }

    pub fn chunk_count(&self, codebase_id: Uuid) -> usize {
        let map = self.codebases.read();
        map.get(&codebase_id).map(|i| i.chunks.len()).unwrap_or(0)
    }

    pub fn indexed_file_count(&self, codebase_id: Uuid) -> usize {
        let map = self.codebases.read();
        map.get(&codebase_id)
            .map(|index| {
                let mut paths: Vec<&str> =
                    index.chunks.iter().map(|c| c.file_path.as_str()).collect();
                paths.sort_unstable();
                paths.dedup();
                paths.len()
            })
            .unwrap_or(0)
    }

    /// All chunks for a codebase, for tests and diagnostics.
    pub fn chunks(&self, codebase_id: Uuid) -> Vec<CodeChunk> {
        let map = self.codebases.read();
        map.get(&codebase_id)
            .map(|i| i.chunks.clone())
            .unwrap_or_default()
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for i in 0..a.len() {
        dot += a[i] * b[i];
        norm_a += a[i] * a[i];
        norm_b += b[i] * b[i];
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}
