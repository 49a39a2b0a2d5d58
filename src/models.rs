use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use crate::error::{IndexError, Result};
use crate::globs;

/// A registered codebase (a local source tree the service indexes).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Codebase {
    pub id: Uuid,
    pub name: String,
    pub root_path: PathBuf,
    pub created_at: DateTime<Utc>,
}

/// How often the scheduler triggers a new indexing run for a codebase.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Manual,
    OnCommit,
    Hourly,
    Daily,
    Weekly,
}

impl Frequency {
    /// Fixed re-index interval, or None for policies that are not
    /// time-driven (`manual`, `on_commit`).
    pub fn interval(&self) -> Option<chrono::Duration> {
        match self {
            Frequency::Manual | Frequency::OnCommit => None,
            Frequency::Hourly => Some(chrono::Duration::hours(1)),
            Frequency::Daily => Some(chrono::Duration::days(1)),
            Frequency::Weekly => Some(chrono::Duration::weeks(1)),
        }
    }
}

/// Per-codebase indexing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexSettings {
    pub codebase_id: Uuid,
    pub is_enabled: bool,
    pub frequency: Frequency,
    pub excluded_patterns: Vec<String>,
    pub priority_patterns: Vec<String>,
    pub embedding_model: String,
    /// Window size in characters.
    pub chunk_size: usize,
    /// Overlap between consecutive windows, in characters. Always less
    /// than `chunk_size`.
    pub chunk_overlap: usize,
    pub include_comments: bool,
    pub max_files_per_run: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl IndexSettings {
    pub fn new(codebase_id: Uuid, embedding_model: &str) -> Self {
        let now = Utc::now();
        Self {
            codebase_id,
            is_enabled: true,
            frequency: Frequency::Manual,
            excluded_patterns: Vec::new(),
            priority_patterns: Vec::new(),
            embedding_model: embedding_model.to_string(),
            chunk_size: 1500,
            chunk_overlap: 200,
            include_comments: true,
            max_files_per_run: 2000,
            created_at: now,
            updated_at: now,
        }
    }

    /// Validate the settings. Violations are configuration errors, never
    /// silently clamped.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(IndexError::Configuration(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(IndexError::Configuration(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.embedding_model.trim().is_empty() {
            return Err(IndexError::Configuration(
                "embedding_model must not be empty".to_string(),
            ));
        }
        if self.max_files_per_run == 0 {
            return Err(IndexError::Configuration(
                "max_files_per_run must be greater than zero".to_string(),
            ));
        }
        globs::build(&self.excluded_patterns)
            .map_err(|e| IndexError::Configuration(format!("invalid excluded pattern: {e}")))?;
        globs::build(&self.priority_patterns)
            .map_err(|e| IndexError::Configuration(format!("invalid priority pattern: {e}")))?;
        Ok(())
    }

    /// Apply a partial update, returning the merged settings. The caller
    /// validates the result before persisting.
    pub fn apply(&self, patch: SettingsUpdate) -> IndexSettings {
        let mut merged = self.clone();
        if let Some(is_enabled) = patch.is_enabled {
            merged.is_enabled = is_enabled;
        }
        if let Some(frequency) = patch.frequency {
            merged.frequency = frequency;
        }
        if let Some(excluded_patterns) = patch.excluded_patterns {
            merged.excluded_patterns = excluded_patterns;
        }
        if let Some(priority_patterns) = patch.priority_patterns {
            merged.priority_patterns = priority_patterns;
        }
        if let Some(embedding_model) = patch.embedding_model {
            merged.embedding_model = embedding_model;
        }
        if let Some(chunk_size) = patch.chunk_size {
            merged.chunk_size = chunk_size;
        }
        if let Some(chunk_overlap) = patch.chunk_overlap {
            merged.chunk_overlap = chunk_overlap;
        }
        if let Some(include_comments) = patch.include_comments {
            merged.include_comments = include_comments;
        }
        if let Some(max_files_per_run) = patch.max_files_per_run {
            merged.max_files_per_run = max_files_per_run;
        }
        merged.updated_at = Utc::now();
        merged
    }
}

/// Partial settings update (PATCH body). Absent fields keep their value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsUpdate {
    pub is_enabled: Option<bool>,
    pub frequency: Option<Frequency>,
    pub excluded_patterns: Option<Vec<String>>,
    pub priority_patterns: Option<Vec<String>>,
    pub embedding_model: Option<String>,
    pub chunk_size: Option<usize>,
    pub chunk_overlap: Option<usize>,
    pub include_comments: Option<bool>,
    pub max_files_per_run: Option<usize>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }
}

/// One execution of the indexing pipeline over a codebase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingRun {
    pub id: Uuid,
    pub codebase_id: Uuid,
    pub status: RunStatus,
    pub is_full_index: bool,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub files_processed: usize,
    pub files_indexed: usize,
    pub files_skipped: usize,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Lightweight symbols extracted from a chunk's text.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExtractedElements {
    pub functions: Vec<String>,
    pub classes: Vec<String>,
    pub variables: Vec<String>,
}

impl ExtractedElements {
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty() && self.classes.is_empty() && self.variables.is_empty()
    }
}

/// The index record: one embedded window of one file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeChunk {
    pub codebase_id: Uuid,
    pub file_path: String,
    pub chunk_index: usize,
    /// 1-based line span in the original file.
    pub start_line: usize,
    pub end_line: usize,
    pub content: String,
    /// sha256 of the whole file this chunk came from. All chunks of a
    /// file share the same hash.
    pub content_hash: String,
    pub vector: Vec<f32>,
    pub embedding_model: String,
    pub language: String,
    pub extracted_elements: ExtractedElements,
    /// The run that produced this chunk.
    pub run_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl CodeChunk {
    /// Stable identifier derived from the chunk key
    /// `(file_path, chunk_range)`.
    pub fn chunk_id(&self) -> String {
        format!("{}#{}-{}", self.file_path, self.start_line, self.end_line)
    }
}

// ─── Request / response types ────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterCodebaseRequest {
    pub name: String,
    pub root_path: PathBuf,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TriggerRequest {
    #[serde(default)]
    pub is_full_index: bool,
    /// Extra priority patterns for this run only.
    #[serde(default)]
    pub priority_files: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TriggerResponse {
    pub run_id: Uuid,
    pub status: RunStatus,
    pub start_time: Option<DateTime<Utc>>,
}

/// Search request (ephemeral, not persisted).
#[derive(Debug, Clone, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Minimum cosine similarity for a chunk to be returned.
    #[serde(default)]
    pub threshold: f32,
    #[serde(default)]
    pub file_patterns: Vec<String>,
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
}

fn default_limit() -> usize {
    10
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResultMetadata {
    pub language: String,
    pub start_line: usize,
    pub end_line: usize,
    pub extracted_elements: ExtractedElements,
    pub run_id: Uuid,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub file_path: String,
    pub chunk_id: String,
    pub content: String,
    pub similarity_score: f32,
    pub metadata: SearchResultMetadata,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub result_count: usize,
    pub results: Vec<SearchResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexingStatus {
    pub is_indexing_now: bool,
    pub current_run_id: Option<Uuid>,
    pub last_run: Option<IndexingRun>,
    pub recent_runs: Vec<IndexingRun>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexStatistics {
    pub total_embeddings: usize,
    pub indexed_files: usize,
    pub last_indexed_at: Option<DateTime<Utc>>,
    pub last_index_status: Option<RunStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexingStatusResponse {
    pub settings: IndexSettings,
    pub status: IndexingStatus,
    pub statistics: IndexStatistics,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frequency_serializes_to_snake_case() {
        let json = serde_json::to_value(Frequency::OnCommit).unwrap();
        assert_eq!(json, "on_commit");
    }

    #[test]
    fn test_run_status_round_trips() {
        let status = RunStatus::Running;
        let json = serde_json::to_string(&status).unwrap();
        let back: RunStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, RunStatus::Running);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!RunStatus::Pending.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
        assert!(RunStatus::Completed.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
    }

    #[test]
    fn test_validate_rejects_overlap_not_less_than_size() {
        let mut settings = IndexSettings::new(Uuid::new_v4(), "nomic-embed-text");
        settings.chunk_size = 100;
        settings.chunk_overlap = 100;
        assert!(settings.validate().is_err());

        settings.chunk_overlap = 99;
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_model() {
        let mut settings = IndexSettings::new(Uuid::new_v4(), "nomic-embed-text");
        settings.embedding_model = "  ".to_string();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_glob() {
        let mut settings = IndexSettings::new(Uuid::new_v4(), "nomic-embed-text");
        settings.excluded_patterns = vec!["src/[".to_string()];
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_apply_patch_keeps_absent_fields() {
        let settings = IndexSettings::new(Uuid::new_v4(), "nomic-embed-text");
        let merged = settings.apply(SettingsUpdate {
            chunk_size: Some(800),
            ..Default::default()
        });
        assert_eq!(merged.chunk_size, 800);
        assert_eq!(merged.chunk_overlap, settings.chunk_overlap);
        assert_eq!(merged.embedding_model, settings.embedding_model);
        assert!(merged.updated_at >= settings.updated_at);
    }

    #[test]
    fn test_chunk_id_derives_from_path_and_range() {
        let chunk = CodeChunk {
            codebase_id: Uuid::new_v4(),
            file_path: "src/main.rs".to_string(),
            chunk_index: 0,
            start_line: 1,
            end_line: 40,
            content: String::new(),
            content_hash: String::new(),
            vector: vec![],
            embedding_model: "m".to_string(),
            language: "rust".to_string(),
            extracted_elements: ExtractedElements::default(),
            run_id: Uuid::new_v4(),
            created_at: Utc::now(),
        };
        assert_eq!(chunk.chunk_id(), "src/main.rs#1-40");
    }
}
