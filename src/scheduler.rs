use chrono::Utc;
use std::time::Duration;
use uuid::Uuid;

use crate::error::IndexError;
use crate::models::{Frequency, IndexSettings};
use crate::orchestrator::{self, TriggerOptions};
use crate::runs::RunRegistry;
use crate::state::{AppState, CommitSignals};

/// Periodic scheduling loop. Each tick examines every enabled codebase
/// with a non-manual frequency policy and triggers an incremental run
/// when it is due. A `ConflictError` from the trigger means a run is
/// already active; it is swallowed and the codebase is reconsidered on
/// the next tick.
pub async fn run(state: AppState) {
    let mut tick = tokio::time::interval(Duration::from_secs(state.config.scheduler_tick_secs));
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tick.tick().await;

        for (codebase, settings) in state.settings.schedulable() {
            if !is_due(&state.runs, &state.commit_signals, codebase.id, &settings) {
                continue;
            }

            match orchestrator::trigger(&state, codebase.id, TriggerOptions::default()) {
                Ok(run) => {
                    state.commit_signals.clear(codebase.id);
                    tracing::info!(
                        "Scheduler triggered run {} for {} ({:?})",
                        run.id,
                        codebase.name,
                        settings.frequency
                    );
                }
                Err(IndexError::Conflict(_)) => {
                    tracing::debug!(
                        "Run already active for {}, retrying next tick",
                        codebase.name
                    );
                }
                Err(e) => {
                    tracing::warn!("Scheduler failed to trigger run for {}: {e}", codebase.name);
                }
            }
        }
    }
}

/// Both interval policies and `on_commit` reduce to the same "due"
/// check: elapsed time since the last completed run, or a pending
/// commit signal.
fn is_due(
    runs: &RunRegistry,
    signals: &CommitSignals,
    codebase_id: Uuid,
    settings: &IndexSettings,
) -> bool {
    match settings.frequency {
        Frequency::Manual => false,
        Frequency::OnCommit => signals.is_set(codebase_id),
        Frequency::Hourly | Frequency::Daily | Frequency::Weekly => {
            let Some(interval) = settings.frequency.interval() else {
                return false;
            };
            match runs.last_completed(codebase_id) {
                // Never indexed successfully: due immediately.
                None => true,
                Some(run) => match run.end_time {
                    Some(end) => Utc::now() - end >= interval,
                    None => true,
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IndexSettings;

    fn registry(dir: &tempfile::TempDir) -> RunRegistry {
        RunRegistry::open_or_create(&dir.path().join("runs.json")).unwrap()
    }

    fn settings_with(frequency: Frequency) -> IndexSettings {
        let mut settings = IndexSettings::new(Uuid::new_v4(), "m");
        settings.frequency = frequency;
        settings
    }

    #[test]
    fn test_manual_is_never_due() {
        let dir = tempfile::tempdir().unwrap();
        let runs = registry(&dir);
        let signals = CommitSignals::default();
        let settings = settings_with(Frequency::Manual);
        assert!(!is_due(&runs, &signals, settings.codebase_id, &settings));
    }

    #[test]
    fn test_interval_due_with_no_completed_run() {
        let dir = tempfile::tempdir().unwrap();
        let runs = registry(&dir);
        let signals = CommitSignals::default();
        let settings = settings_with(Frequency::Hourly);
        assert!(is_due(&runs, &signals, settings.codebase_id, &settings));
    }

    #[test]
    fn test_interval_not_due_right_after_completion() {
        let dir = tempfile::tempdir().unwrap();
        let runs = registry(&dir);
        let signals = CommitSignals::default();
        let settings = settings_with(Frequency::Hourly);

        let run = runs.begin(settings.codebase_id, false).unwrap();
        runs.mark_running(run.id);
        runs.complete(run.id);

        assert!(!is_due(&runs, &signals, settings.codebase_id, &settings));
    }

    #[test]
    fn test_failed_run_does_not_reset_the_clock() {
        let dir = tempfile::tempdir().unwrap();
        let runs = registry(&dir);
        let signals = CommitSignals::default();
        let settings = settings_with(Frequency::Daily);

        let run = runs.begin(settings.codebase_id, false).unwrap();
        runs.mark_running(run.id);
        runs.fail(run.id, "boom".to_string());

        // Only completed runs count; still due.
        assert!(is_due(&runs, &signals, settings.codebase_id, &settings));
    }

    #[test]
    fn test_on_commit_follows_the_signal() {
        let dir = tempfile::tempdir().unwrap();
        let runs = registry(&dir);
        let signals = CommitSignals::default();
        let settings = settings_with(Frequency::OnCommit);

        assert!(!is_due(&runs, &signals, settings.codebase_id, &settings));
        signals.set(settings.codebase_id);
        assert!(is_due(&runs, &signals, settings.codebase_id, &settings));
        signals.clear(settings.codebase_id);
        assert!(!is_due(&runs, &signals, settings.codebase_id, &settings));
    }
}
