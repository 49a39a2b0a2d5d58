//! # codebase-index
//!
//! A Rust web service for indexing local codebases and searching them
//! semantically: files are split into overlapping chunks, embedded
//! through a pluggable provider, persisted with their vectors, and
//! ranked by cosine similarity at query time. Re-indexing is
//! incremental (content-hash diffing) and can run on a schedule.
//!
//! ## Architecture
//!
//! ```text
//!            ┌───────────┐   ┌────────────────┐
//!            │ Scheduler │   │ POST /trigger  │
//!            │  (tick)   │   │  (HTTP call)   │
//!            └─────┬─────┘   └───────┬────────┘
//!                  └────────┬────────┘
//!                           ▼
//!                 ┌──────────────────┐
//!                 │ Run Orchestrator │  one active run per codebase
//!                 └────────┬─────────┘
//!                          │
//!          ┌───────────────┼────────────────────┐
//!          ▼               ▼                    ▼
//!   ┌────────────┐  ┌────────────┐   ┌───────────────────┐
//!   │  Scanner   │→ │  Chunker   │ → │ Embedding Provider │
//!   │ (globs,    │  │ (windows,  │   │  (HTTP, batched,   │
//!   │  priority) │  │  overlap)  │   │   retried)         │
//!   └────────────┘  └────────────┘   └─────────┬─────────┘
//!                                              │
//!                                              ▼
//!                                    ┌──────────────────┐
//!                                    │   Index Store    │
//!                                    │ (atomic per-file │
//!                                    │  replace, cosine │
//!                                    │  query)          │
//!                                    └────────┬─────────┘
//!                                             │
//!                                             ▼
//!                                    ┌──────────────────┐
//!                                    │  Search Engine   │
//!                                    │ (POST /search)   │
//!                                    └──────────────────┘
//! ```
//!
//! ## Module Overview
//!
//! - [`config`] - Environment-based configuration for server, data dir, and embedding provider
//! - [`error`] - The `IndexError` taxonomy and its HTTP status mapping
//! - [`models`] - Shared data types: `Codebase`, `IndexSettings`, `IndexingRun`, `CodeChunk`, request/response types
//! - [`settings`] - Codebase registry + validated per-codebase settings, JSON-persisted
//! - [`scanner`] - Codebase tree walking with exclude globs, priority ordering, and a per-run cap
//! - [`chunking`] - Character-window chunking with overlap, comment stripping, and symbol extraction
//! - [`embedding`] - `EmbeddingProvider` trait, Ollama/OpenAI HTTP adapters, bounded-backoff retry
//! - [`store`] - Chunk + vector store with atomic per-file replacement and cosine similarity queries
//! - [`runs`] - Run history and the per-codebase active slot (one non-terminal run at a time)
//! - [`orchestrator`] - The Scan → Chunk → Embed → Store pipeline as a background task
//! - [`scheduler`] - Periodic tick evaluating frequency policies and commit signals
//! - [`search`] - Query embedding + store ranking
//! - [`api`] - Axum HTTP handlers
//! - [`state`] - Shared application state

pub mod api;
pub mod chunking;
pub mod config;
pub mod embedding;
pub mod error;
pub mod globs;
pub mod models;
pub mod orchestrator;
pub mod runs;
pub mod scanner;
pub mod scheduler;
pub mod search;
pub mod settings;
pub mod state;
pub mod store;
