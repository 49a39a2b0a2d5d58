//! Axum HTTP handlers: thin glue over the settings store, orchestrator,
//! and search engine.

pub mod codebases;
pub mod indexing;
pub mod search;
