use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::{IndexError, Result};
use crate::models::{Codebase, IndexSettings, SettingsUpdate};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CodebaseRecord {
    codebase: Codebase,
    settings: IndexSettings,
}

/// Codebase registry and per-codebase indexing settings, persisted as
/// one JSON document. Updates validate before they persist; an invalid
/// patch leaves the prior settings intact. The scheduler reads through
/// this store directly, so changes are visible on its next tick.
pub struct SettingsStore {
    records: RwLock<Vec<CodebaseRecord>>,
    persist_path: PathBuf,
}

impl SettingsStore {
    pub fn open_or_create(persist_path: &Path) -> Result<Self> {
        let records = if persist_path.exists() {
            let data = std::fs::read_to_string(persist_path)
                .map_err(|e| IndexError::Storage(format!("read codebase registry: {e}")))?;
            serde_json::from_str(&data).unwrap_or_default()
        } else {
            Vec::new()
        };

        Ok(Self {
            records: RwLock::new(records),
            persist_path: persist_path.to_path_buf(),
        })
    }

    /// Persist the registry (atomic write via temp file + rename).
    fn persist(&self) -> Result<()> {
        let records = self.records.read();
        let data = serde_json::to_string_pretty(&*records)
            .map_err(|e| IndexError::Storage(format!("serialize codebase registry: {e}")))?;
        let tmp_path = self.persist_path.with_extension("json.tmp");
        std::fs::write(&tmp_path, data)
            .map_err(|e| IndexError::Storage(format!("write codebase registry: {e}")))?;
        std::fs::rename(&tmp_path, &self.persist_path)
            .map_err(|e| IndexError::Storage(format!("rename codebase registry: {e}")))?;
        Ok(())
    }

    /// Register a codebase and create its default settings.
    pub fn register(
        &self,
        name: &str,
        root_path: &Path,
        default_model: &str,
    ) -> Result<Codebase> {
        let name = name.trim();
        if name.is_empty() {
            return Err(IndexError::Configuration("name is required".to_string()));
        }
        if !root_path.is_dir() {
            return Err(IndexError::Configuration(format!(
                "root_path {} is not a directory",
                root_path.display()
            )));
        }

        {
            let records = self.records.read();
            if records.iter().any(|r| r.codebase.root_path == root_path) {
                return Err(IndexError::Conflict(
                    "a codebase with this root path is already registered".to_string(),
                ));
            }
        }

        let codebase = Codebase {
            id: Uuid::new_v4(),
            name: name.to_string(),
            root_path: root_path.to_path_buf(),
            created_at: Utc::now(),
        };
        let settings = IndexSettings::new(codebase.id, default_model);

        self.records.write().push(CodebaseRecord {
            codebase: codebase.clone(),
            settings,
        });
        self.persist()?;
        Ok(codebase)
    }

    pub fn list(&self) -> Vec<Codebase> {
        self.records
            .read()
            .iter()
            .map(|r| r.codebase.clone())
            .collect()
    }

    pub fn get(&self, codebase_id: Uuid) -> Result<Codebase> {
        self.records
            .read()
            .iter()
            .find(|r| r.codebase.id == codebase_id)
            .map(|r| r.codebase.clone())
            .ok_or_else(|| IndexError::NotFound(format!("codebase {codebase_id}")))
    }

    pub fn remove(&self, codebase_id: Uuid) -> Result<()> {
        let mut records = self.records.write();
        let before = records.len();
        records.retain(|r| r.codebase.id != codebase_id);
        if records.len() == before {
            return Err(IndexError::NotFound(format!("codebase {codebase_id}")));
        }
        drop(records);
        self.persist()
    }

    pub fn get_settings(&self, codebase_id: Uuid) -> Result<IndexSettings> {
        self.records
            .read()
            .iter()
            .find(|r| r.codebase.id == codebase_id)
            .map(|r| r.settings.clone())
            .ok_or_else(|| IndexError::NotFound(format!("codebase {codebase_id}")))
    }

    /// Apply a partial update. The merged settings are validated before
    /// anything is stored; on `ConfigurationError` the prior settings
    /// remain in effect.
    pub fn update_settings(
        &self,
        codebase_id: Uuid,
        patch: SettingsUpdate,
    ) -> Result<IndexSettings> {
        let merged = {
            let records = self.records.read();
            let record = records
                .iter()
                .find(|r| r.codebase.id == codebase_id)
                .ok_or_else(|| IndexError::NotFound(format!("codebase {codebase_id}")))?;
            record.settings.apply(patch)
        };
        merged.validate()?;

        {
            let mut records = self.records.write();
            if let Some(record) = records.iter_mut().find(|r| r.codebase.id == codebase_id) {
                record.settings = merged.clone();
            }
        }
        self.persist()?;
        Ok(merged)
    }

    /// Codebases the scheduler should consider: enabled, with a
    /// non-manual frequency policy.
    pub fn schedulable(&self) -> Vec<(Codebase, IndexSettings)> {
        self.records
            .read()
            .iter()
            .filter(|r| {
                r.settings.is_enabled
                    && r.settings.frequency != crate::models::Frequency::Manual
            })
            .map(|r| (r.codebase.clone(), r.settings.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Frequency;

    fn store(dir: &tempfile::TempDir) -> SettingsStore {
        SettingsStore::open_or_create(&dir.path().join("codebases.json")).unwrap()
    }

    #[test]
    fn test_register_creates_default_settings() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(&dir);

        let codebase = s.register("demo", dir.path(), "nomic-embed-text").unwrap();
        let settings = s.get_settings(codebase.id).unwrap();
        assert_eq!(settings.codebase_id, codebase.id);
        assert_eq!(settings.embedding_model, "nomic-embed-text");
        assert_eq!(settings.frequency, Frequency::Manual);
        assert!(settings.chunk_overlap < settings.chunk_size);
    }

    #[test]
    fn test_register_rejects_duplicate_root() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(&dir);

        s.register("one", dir.path(), "m").unwrap();
        let err = s.register("two", dir.path(), "m").unwrap_err();
        assert!(matches!(err, IndexError::Conflict(_)));
    }

    #[test]
    fn test_register_rejects_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(&dir);
        let err = s
            .register("ghost", &dir.path().join("missing"), "m")
            .unwrap_err();
        assert!(matches!(err, IndexError::Configuration(_)));
    }

    #[test]
    fn test_get_unknown_codebase_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(&dir);
        assert!(matches!(
            s.get_settings(Uuid::new_v4()),
            Err(IndexError::NotFound(_))
        ));
    }

    #[test]
    fn test_update_validates_and_keeps_prior_on_error() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(&dir);
        let codebase = s.register("demo", dir.path(), "m").unwrap();

        let err = s
            .update_settings(
                codebase.id,
                SettingsUpdate {
                    chunk_size: Some(100),
                    chunk_overlap: Some(100),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, IndexError::Configuration(_)));

        // Prior settings unchanged.
        let settings = s.get_settings(codebase.id).unwrap();
        assert_eq!(settings.chunk_size, 1500);
        assert_eq!(settings.chunk_overlap, 200);
    }

    #[test]
    fn test_update_applies_valid_patch() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(&dir);
        let codebase = s.register("demo", dir.path(), "m").unwrap();

        let updated = s
            .update_settings(
                codebase.id,
                SettingsUpdate {
                    frequency: Some(Frequency::Hourly),
                    excluded_patterns: Some(vec!["**/*.lock".to_string()]),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.frequency, Frequency::Hourly);
        assert_eq!(updated.excluded_patterns, vec!["**/*.lock".to_string()]);
    }

    #[test]
    fn test_schedulable_filters_manual_and_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let sub_a = dir.path().join("a");
        let sub_b = dir.path().join("b");
        let sub_c = dir.path().join("c");
        for p in [&sub_a, &sub_b, &sub_c] {
            std::fs::create_dir(p).unwrap();
        }

        let s = store(&dir);
        let manual = s.register("manual", &sub_a, "m").unwrap();
        let hourly = s.register("hourly", &sub_b, "m").unwrap();
        let disabled = s.register("disabled", &sub_c, "m").unwrap();

        s.update_settings(
            hourly.id,
            SettingsUpdate {
                frequency: Some(Frequency::Hourly),
                ..Default::default()
            },
        )
        .unwrap();
        s.update_settings(
            disabled.id,
            SettingsUpdate {
                frequency: Some(Frequency::Daily),
                is_enabled: Some(false),
                ..Default::default()
            },
        )
        .unwrap();

        let scheduled = s.schedulable();
        assert_eq!(scheduled.len(), 1);
        assert_eq!(scheduled[0].0.id, hourly.id);
        let _ = manual;
    }

    #[test]
    fn test_registry_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let id = {
            let s = store(&dir);
            s.register("demo", dir.path(), "m").unwrap().id
        };
        let reopened = store(&dir);
        assert_eq!(reopened.get(id).unwrap().name, "demo");
    }
}
