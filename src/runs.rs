use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::{IndexError, Result};
use crate::models::{IndexingRun, RunStatus};

/// Append-only run history plus the per-codebase active slot that
/// enforces at most one non-terminal run per codebase.
///
/// The active slot is the lock object the status endpoint inspects;
/// there is no process-wide "indexing" flag.
pub struct RunRegistry {
    runs: RwLock<Vec<IndexingRun>>,
    /// codebase_id → run_id of the current non-terminal run.
    active: Mutex<HashMap<Uuid, Uuid>>,
    /// Run ids with a pending cancellation request.
    cancelled: Mutex<HashSet<Uuid>>,
    persist_path: PathBuf,
}

impl RunRegistry {
    pub fn open_or_create(persist_path: &Path) -> Result<Self> {
        let mut runs: Vec<IndexingRun> = if persist_path.exists() {
            let data = std::fs::read_to_string(persist_path)
                .map_err(|e| IndexError::Storage(format!("read run history: {e}")))?;
            serde_json::from_str(&data).unwrap_or_default()
        } else {
            Vec::new()
        };

        // Runs left non-terminal by a previous process can never finish.
        for run in runs.iter_mut().filter(|r| !r.status.is_terminal()) {
            run.status = RunStatus::Failed;
            run.end_time = Some(Utc::now());
            run.error_message = Some("interrupted by service restart".to_string());
        }

        Ok(Self {
            runs: RwLock::new(runs),
            active: Mutex::new(HashMap::new()),
            cancelled: Mutex::new(HashSet::new()),
            persist_path: persist_path.to_path_buf(),
        })
    }

    /// Persist run history to disk (atomic write via temp file +
    /// rename). Best effort: history persistence never fails a run.
    fn persist(&self) {
        let runs = self.runs.read();
        match serde_json::to_string(&*runs) {
            Ok(data) => {
                let tmp_path = self.persist_path.with_extension("json.tmp");
                if let Err(e) = std::fs::write(&tmp_path, data)
                    .and_then(|_| std::fs::rename(&tmp_path, &self.persist_path))
                {
                    tracing::warn!("Failed to persist run history: {e}");
                }
            }
            Err(e) => tracing::warn!("Failed to serialize run history: {e}"),
        }
    }

    /// Create a pending run and claim the codebase's active slot in one
    /// critical section. Fails with `ConflictError` without creating a
    /// run row when a non-terminal run already exists.
    pub fn begin(&self, codebase_id: Uuid, is_full_index: bool) -> Result<IndexingRun> {
        let mut active = self.active.lock();
        if let Some(run_id) = active.get(&codebase_id) {
            return Err(IndexError::Conflict(format!(
                "indexing run {run_id} is already active for this codebase"
            )));
        }

        let run = IndexingRun {
            id: Uuid::new_v4(),
            codebase_id,
            status: RunStatus::Pending,
            is_full_index,
            start_time: None,
            end_time: None,
            files_processed: 0,
            files_indexed: 0,
            files_skipped: 0,
            error_message: None,
            created_at: Utc::now(),
        };
        active.insert(codebase_id, run.id);
        self.runs.write().push(run.clone());
        drop(active);

        self.persist();
        Ok(run)
    }

    pub fn mark_running(&self, run_id: Uuid) {
        {
            let mut runs = self.runs.write();
            if let Some(run) = runs.iter_mut().find(|r| r.id == run_id) {
                run.status = RunStatus::Running;
                run.start_time = Some(Utc::now());
            }
        }
        self.persist();
    }

    /// Update live statistics. Written mid-loop so a status poll shows
    /// progress; not persisted on every call.
    pub fn record_progress(&self, run_id: Uuid, processed: usize, indexed: usize, skipped: usize) {
        let mut runs = self.runs.write();
        if let Some(run) = runs.iter_mut().find(|r| r.id == run_id) {
            run.files_processed = processed;
            run.files_indexed = indexed;
            run.files_skipped = skipped;
        }
    }

    pub fn complete(&self, run_id: Uuid) {
        self.finish(run_id, RunStatus::Completed, None);
    }

    pub fn fail(&self, run_id: Uuid, message: String) {
        self.finish(run_id, RunStatus::Failed, Some(message));
    }

    fn finish(&self, run_id: Uuid, status: RunStatus, error_message: Option<String>) {
        let codebase_id = {
            let mut runs = self.runs.write();
            match runs.iter_mut().find(|r| r.id == run_id) {
                Some(run) => {
                    run.status = status;
                    run.end_time = Some(Utc::now());
                    run.error_message = error_message;
                    Some(run.codebase_id)
                }
                None => None,
            }
        };

        if let Some(codebase_id) = codebase_id {
            let mut active = self.active.lock();
            if active.get(&codebase_id) == Some(&run_id) {
                active.remove(&codebase_id);
            }
        }
        self.cancelled.lock().remove(&run_id);
        self.persist();
    }

    /// Request cooperative cancellation; the orchestrator honors it
    /// between file iterations.
    pub fn request_cancel(&self, run_id: Uuid) -> Result<()> {
        let runs = self.runs.read();
        let run = runs
            .iter()
            .find(|r| r.id == run_id)
            .ok_or_else(|| IndexError::NotFound(format!("run {run_id}")))?;
        if run.status.is_terminal() {
            return Err(IndexError::Conflict(format!(
                "run {run_id} has already finished"
            )));
        }
        drop(runs);
        self.cancelled.lock().insert(run_id);
        Ok(())
    }

    pub fn is_cancel_requested(&self, run_id: Uuid) -> bool {
        self.cancelled.lock().contains(&run_id)
    }

    pub fn get(&self, run_id: Uuid) -> Option<IndexingRun> {
        self.runs.read().iter().find(|r| r.id == run_id).cloned()
    }

    /// The run currently holding the codebase's active slot.
    pub fn current_run(&self, codebase_id: Uuid) -> Option<Uuid> {
        self.active.lock().get(&codebase_id).copied()
    }

    /// Most recently created run for the codebase, any status.
    pub fn last_run(&self, codebase_id: Uuid) -> Option<IndexingRun> {
        self.runs
            .read()
            .iter()
            .filter(|r| r.codebase_id == codebase_id)
            .max_by_key(|r| r.created_at)
            .cloned()
    }

    /// Most recent successfully completed run for the codebase.
    pub fn last_completed(&self, codebase_id: Uuid) -> Option<IndexingRun> {
        self.runs
            .read()
            .iter()
            .filter(|r| r.codebase_id == codebase_id && r.status == RunStatus::Completed)
            .max_by_key(|r| r.created_at)
            .cloned()
    }

    /// Latest runs for the codebase, newest first.
    pub fn recent(&self, codebase_id: Uuid, limit: usize) -> Vec<IndexingRun> {
        let runs = self.runs.read();
        let mut recent: Vec<IndexingRun> = runs
            .iter()
            .filter(|r| r.codebase_id == codebase_id)
            .cloned()
            .collect();
        recent.sort_by_key(|r| std::cmp::Reverse(r.created_at));
        recent.truncate(limit);
        recent
    }

    /// Drop a codebase's history (codebase deletion).
    pub fn remove_codebase(&self, codebase_id: Uuid) {
        self.runs.write().retain(|r| r.codebase_id != codebase_id);
        self.persist();
    }
}
