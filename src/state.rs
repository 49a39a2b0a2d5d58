use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::Config;
use crate::embedding::{EmbeddingProvider, HttpEmbedder};
use crate::runs::RunRegistry;
use crate::settings::SettingsStore;
use crate::store::IndexStore;

/// Per-codebase "commit received" flags for the `on_commit` frequency
/// policy. Set by the webhook endpoint, cleared on successful trigger.
#[derive(Default)]
pub struct CommitSignals {
    received: RwLock<HashSet<Uuid>>,
}

impl CommitSignals {
    pub fn set(&self, codebase_id: Uuid) {
        self.received.write().insert(codebase_id);
    }

    pub fn is_set(&self, codebase_id: Uuid) -> bool {
        self.received.read().contains(&codebase_id)
    }

    pub fn clear(&self, codebase_id: Uuid) {
        self.received.write().remove(&codebase_id);
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub settings: Arc<SettingsStore>,
    pub store: Arc<IndexStore>,
    pub runs: Arc<RunRegistry>,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub commit_signals: Arc<CommitSignals>,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .timeout(std::time::Duration::from_secs(config.embed_timeout_secs))
            .build()?;
        let embedder = Arc::new(HttpEmbedder::new(http_client, config.embedder.clone()));
        Self::with_embedder(config, embedder)
    }

    /// Build state around an explicit provider implementation. Tests
    /// inject deterministic stubs through this seam.
    pub fn with_embedder(
        config: Config,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;
        std::fs::create_dir_all(config.index_dir())?;

        let settings = SettingsStore::open_or_create(&config.codebases_path())?;
        let store = IndexStore::open_or_create(&config.index_dir())?;
        let runs = RunRegistry::open_or_create(&config.runs_path())?;

        Ok(Self {
            config,
            settings: Arc::new(settings),
            store: Arc::new(store),
            runs: Arc::new(runs),
            embedder,
            commit_signals: Arc::new(CommitSignals::default()),
        })
    }
}
