use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::EmbedderConfig;
use crate::error::{IndexError, Result};

/// Maximum characters to send per text to the embedding API. Embedding
/// models have bounded context; dense content (JSON blobs, minified JS)
/// can tokenize at ~2.3 tokens/char, and 3 000 chars stays safely under
/// an 8 192-token context even then.
const MAX_EMBED_CHARS: usize = 3_000;

/// First retry delay; doubles on each subsequent attempt.
const INITIAL_BACKOFF: Duration = Duration::from_millis(500);

/// Maps batches of texts to fixed-dimension vectors. The core never
/// depends on a concrete provider; adapters implement this trait.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed each text, returning one vector per input in the same
    /// order. Upstream failures (rate-limit, auth, timeout) surface as
    /// `EmbeddingProviderError`.
    async fn embed(&self, model: &str, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Call the provider with bounded exponential backoff. After
/// `max_attempts` the last error propagates to the caller.
pub async fn embed_with_retry(
    provider: &dyn EmbeddingProvider,
    model: &str,
    texts: &[String],
    max_attempts: u32,
) -> Result<Vec<Vec<f32>>> {
    let mut delay = INITIAL_BACKOFF;
    let mut attempt = 1u32;
    loop {
        match provider.embed(model, texts).await {
            Ok(vectors) => {
                if vectors.len() != texts.len() {
                    return Err(IndexError::EmbeddingProvider(format!(
                        "provider returned {} vectors for {} inputs",
                        vectors.len(),
                        texts.len()
                    )));
                }
                return Ok(vectors);
            }
            Err(e) => {
                if attempt >= max_attempts {
                    return Err(e);
                }
                tracing::warn!(
                    "Embedding attempt {attempt}/{max_attempts} failed: {e}; retrying in {delay:?}"
                );
                tokio::time::sleep(delay).await;
                delay = delay.saturating_mul(2);
                attempt += 1;
            }
        }
    }
}

/// Truncate `text` to at most `MAX_EMBED_CHARS` bytes, splitting on a
/// UTF-8 char boundary.
fn truncate_for_embedding(text: &str) -> &str {
    if text.len() <= MAX_EMBED_CHARS {
        return text;
    }
    let mut end = MAX_EMBED_CHARS;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// HTTP adapter speaking the Ollama and OpenAI-compatible embedding
/// wire formats.
pub struct HttpEmbedder {
    client: reqwest::Client,
    config: EmbedderConfig,
}

impl HttpEmbedder {
    pub fn new(client: reqwest::Client, config: EmbedderConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbedder {
    async fn embed(&self, model: &str, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let truncated: Vec<String> = texts
            .iter()
            .map(|t| truncate_for_embedding(t).to_string())
            .collect();

        match self.config.provider.as_str() {
            "ollama" => embed_ollama(&self.client, &self.config, model, truncated).await,
            "openai" => embed_openai(&self.client, &self.config, model, truncated).await,
            other => Err(IndexError::EmbeddingProvider(format!(
                "unknown embedding provider: {other}"
            ))),
        }
    }
}

// ─── Ollama ──────────────────────────────────────────────

#[derive(Serialize)]
struct OllamaEmbedRequest {
    model: String,
    input: Vec<String>,
    /// Ask Ollama to silently truncate inputs that exceed the model's
    /// context length instead of returning a 400 error.
    truncate: bool,
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

async fn embed_ollama(
    client: &reqwest::Client,
    config: &EmbedderConfig,
    model: &str,
    input: Vec<String>,
) -> Result<Vec<Vec<f32>>> {
    let url = format!("{}/api/embed", config.base_url);
    let req = OllamaEmbedRequest {
        model: model.to_string(),
        input,
        truncate: true,
    };

    let resp = client
        .post(&url)
        .json(&req)
        .send()
        .await
        .map_err(|e| IndexError::EmbeddingProvider(format!("Ollama embed call failed: {e}")))?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        return Err(IndexError::EmbeddingProvider(format!(
            "Ollama embed API returned {status}: {body}"
        )));
    }

    let body: OllamaEmbedResponse = resp.json().await.map_err(|e| {
        IndexError::EmbeddingProvider(format!("failed to parse Ollama embed response: {e}"))
    })?;

    Ok(body.embeddings)
}

// ─── OpenAI-compatible ───────────────────────────────────

#[derive(Serialize)]
struct OpenAiEmbedRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct OpenAiEmbedResponse {
    data: Vec<OpenAiEmbedData>,
}

#[derive(Deserialize)]
struct OpenAiEmbedData {
    embedding: Vec<f32>,
}

async fn embed_openai(
    client: &reqwest::Client,
    config: &EmbedderConfig,
    model: &str,
    input: Vec<String>,
) -> Result<Vec<Vec<f32>>> {
    let url = format!("{}/v1/embeddings", config.base_url);
    let api_key = config.api_key.as_deref().unwrap_or_default();

    let req = OpenAiEmbedRequest {
        model: model.to_string(),
        input,
    };

    let resp = client
        .post(&url)
        .header("Authorization", format!("Bearer {api_key}"))
        .json(&req)
        .send()
        .await
        .map_err(|e| IndexError::EmbeddingProvider(format!("OpenAI embed call failed: {e}")))?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        return Err(IndexError::EmbeddingProvider(format!(
            "OpenAI embed API returned {status}: {body}"
        )));
    }

    let body: OpenAiEmbedResponse = resp.json().await.map_err(|e| {
        IndexError::EmbeddingProvider(format!("failed to parse OpenAI embed response: {e}"))
    })?;

    Ok(body.data.into_iter().map(|d| d.embedding).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_truncate_short_text_unchanged() {
        assert_eq!(truncate_for_embedding("hello"), "hello");
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        // 'é' is two bytes; an odd byte limit must not split it.
        let text: String = std::iter::repeat('é').take(MAX_EMBED_CHARS).collect();
        let out = truncate_for_embedding(&text);
        assert!(out.len() <= MAX_EMBED_CHARS);
        assert!(out.chars().all(|c| c == 'é'));
    }

    struct CountingProvider {
        calls: AtomicU32,
        fail_first: u32,
    }

    #[async_trait]
    impl EmbeddingProvider for CountingProvider {
        async fn embed(&self, _model: &str, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.fail_first {
                return Err(IndexError::EmbeddingProvider("upstream 500".to_string()));
            }
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }
    }

    #[tokio::test]
    async fn test_retry_recovers_within_cap() {
        let provider = CountingProvider {
            calls: AtomicU32::new(0),
            fail_first: 2,
        };
        let texts = vec!["a".to_string()];
        let vectors = embed_with_retry(&provider, "m", &texts, 3).await.unwrap();
        assert_eq!(vectors.len(), 1);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_propagates_after_cap() {
        let provider = CountingProvider {
            calls: AtomicU32::new(0),
            fail_first: u32::MAX,
        };
        let texts = vec!["a".to_string()];
        let err = embed_with_retry(&provider, "m", &texts, 3).await.unwrap_err();
        assert!(matches!(err, IndexError::EmbeddingProvider(_)));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    struct WrongArityProvider;

    #[async_trait]
    impl EmbeddingProvider for WrongArityProvider {
        async fn embed(&self, _model: &str, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(vec![vec![1.0]])
        }
    }

    #[tokio::test]
    async fn test_vector_count_mismatch_is_an_error() {
        let texts = vec!["a".to_string(), "b".to_string()];
        let err = embed_with_retry(&WrongArityProvider, "m", &texts, 1)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("1 vectors for 2 inputs"));
    }
}
