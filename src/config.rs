use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Where codebase registry, run history, and index data are stored
    pub data_dir: PathBuf,
    /// Server bind address
    pub bind_addr: String,
    /// Embedding provider configuration
    pub embedder: EmbedderConfig,
    /// Per-call timeout for embedding HTTP requests, in seconds
    pub embed_timeout_secs: u64,
    /// Retry cap for embedding calls (bounded exponential backoff)
    pub embed_max_attempts: u32,
    /// Chunk texts per embedding request
    pub embed_batch_size: usize,
    /// Concurrent in-flight embedding batches per run
    pub embed_concurrency: usize,
    /// Scheduler tick interval in seconds
    pub scheduler_tick_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedderConfig {
    /// "ollama" or "openai"
    pub provider: String,
    /// Base URL for the embedding API
    pub base_url: String,
    /// API key (only needed for cloud providers)
    pub api_key: Option<String>,
    /// Model assigned to newly registered codebases
    pub default_model: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            bind_addr: "127.0.0.1:8080".to_string(),
            embedder: EmbedderConfig::default(),
            embed_timeout_secs: 120,
            embed_max_attempts: 3,
            embed_batch_size: 32,
            embed_concurrency: 4,
            scheduler_tick_secs: 60,
        }
    }
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            base_url: "http://localhost:11434".to_string(),
            api_key: None,
            default_model: "nomic-embed-text".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("CODE_INDEX_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(addr) = std::env::var("CODE_INDEX_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Ok(provider) = std::env::var("EMBEDDINGS_PROVIDER") {
            config.embedder.provider = provider;
        }
        if let Ok(url) = std::env::var("EMBEDDINGS_BASE_URL") {
            config.embedder.base_url = url;
        }
        if let Ok(key) = std::env::var("EMBEDDINGS_API_KEY") {
            config.embedder.api_key = Some(key);
        }
        if let Ok(model) = std::env::var("EMBEDDINGS_MODEL") {
            config.embedder.default_model = model;
        }
        if let Ok(val) = std::env::var("EMBEDDINGS_TIMEOUT_SECS") {
            if let Ok(v) = val.parse() {
                config.embed_timeout_secs = v;
            }
        }
        if let Ok(val) = std::env::var("EMBEDDINGS_MAX_ATTEMPTS") {
            if let Ok(v) = val.parse() {
                config.embed_max_attempts = v;
            }
        }
        if let Ok(val) = std::env::var("EMBEDDINGS_BATCH_SIZE") {
            if let Ok(v) = val.parse() {
                config.embed_batch_size = v;
            }
        }
        if let Ok(val) = std::env::var("EMBEDDINGS_CONCURRENCY") {
            if let Ok(v) = val.parse() {
                config.embed_concurrency = v;
            }
        }
        if let Ok(val) = std::env::var("CODE_INDEX_SCHEDULER_TICK_SECS") {
            if let Ok(v) = val.parse() {
                config.scheduler_tick_secs = v;
            }
        }

        config
    }

    pub fn index_dir(&self) -> PathBuf {
        self.data_dir.join("index")
    }

    pub fn codebases_path(&self) -> PathBuf {
        self.data_dir.join("codebases.json")
    }

    pub fn runs_path(&self) -> PathBuf {
        self.data_dir.join("runs.json")
    }
}
