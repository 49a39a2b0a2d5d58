use axum::http::StatusCode;
use thiserror::Error;

/// Error taxonomy for the indexing pipeline.
///
/// Per-file `Scan` and `EmbeddingProvider` errors (after retries) are
/// recovered inside a run: the file is skipped and the loop continues.
/// `Storage` errors are fatal to the enclosing run. `Configuration` and
/// `Conflict` are surfaced synchronously to API callers and never start
/// a run.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("scan failed: {0}")]
    Scan(String),

    #[error("embedding provider error: {0}")]
    EmbeddingProvider(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("{0}")]
    Conflict(String),

    #[error("codebase has no indexed chunks")]
    NotIndexed,

    #[error("{0} not found")]
    NotFound(String),

    #[error("run cancelled by request")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, IndexError>;

impl IndexError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            IndexError::Configuration(_) => StatusCode::BAD_REQUEST,
            IndexError::NotFound(_) | IndexError::NotIndexed => StatusCode::NOT_FOUND,
            IndexError::Conflict(_) => StatusCode::CONFLICT,
            IndexError::EmbeddingProvider(_) => StatusCode::BAD_GATEWAY,
            IndexError::Scan(_) | IndexError::Storage(_) | IndexError::Cancelled => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Convert into the `(status, message)` rejection form used by the API
    /// handlers.
    pub fn into_api(self) -> (StatusCode, String) {
        (self.status_code(), self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_maps_to_409() {
        let err = IndexError::Conflict("an indexing run is already active".to_string());
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_not_indexed_is_distinct_from_empty_results() {
        let err = IndexError::NotIndexed;
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert!(err.to_string().contains("no indexed chunks"));
    }

    #[test]
    fn test_configuration_maps_to_400() {
        let err = IndexError::Configuration("chunk_overlap must be less than chunk_size".into());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }
}
