
use std::fmt::Write as _;
use std::time::Duration;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, warn};
use url::Url;

use crate::config::Config;
use crate::embeddings::cache::EmbeddingCache;
use crate::{CodevecError, Result};

/// Pause inserted between batch groups so a large indexing run cannot
/// monopolize the embedding provider.
const INTER_BATCH_DELAY: Duration = Duration::from_millis(100);

const EMBEDDINGS_ENDPOINT: &str = "/v1/embeddings";

/// Async client for an OpenAI-compatible embedding endpoint.
///
/// Wraps a content-addressed cache, a per-request timeout, and bounded
/// concurrent batching. Cloning the client shares the cache.
#[derive(Debug, Clone)]
pub struct EmbeddingClient {
    base_url: Url,
    model: String,
    batch_size: usize,
    dimension: usize,
    client: reqwest::Client,
    cache: EmbeddingCache,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    input: &'a str,
    model: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedData>,
}

#[derive(Debug, Deserialize)]
struct EmbedData {
    embedding: Vec<f32>,
}

impl EmbeddingClient {
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        let base_url = config
            .embedding
            .provider_url()
            .map_err(|e| CodevecError::Config(e.to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.embedding.timeout_seconds))
            .build()
            .map_err(|e| CodevecError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url,
            model: config.embedding.model.clone(),
            batch_size: config.embedding.batch_size,
            dimension: config.embedding.dimension,
            client,
            cache: EmbeddingCache::new(config.embedding.cache_capacity),
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CodevecError::Config(format!("Failed to build HTTP client: {e}")))?;
        Ok(self)
    }

    #[inline]
    pub fn cache(&self) -> &EmbeddingCache {
        &self.cache
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Embed a single text, consulting the cache first.
    ///
    /// A cache hit performs no network call. On a miss the provider is asked
    /// once, with the configured timeout; a successful vector is cached under
    /// the text's content key before it is returned.
    #[inline]
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let key = EmbeddingCache::content_key(text);
        if let Some(hit) = self.cache.get(&key) {
            debug!("Embedding cache hit for {key}");
            return Ok(hit);
        }

        let embedding = self.request_embedding(text).await?;
        self.cache.insert(key, embedding.clone());
        Ok(embedding)
    }

    /// Embed many texts, preserving input order.
    ///
    /// Texts are processed in groups of the configured batch size; every
    /// request within a group is issued concurrently, and groups are
    /// separated by a short pause as backpressure against the provider. A
    /// failed item yields an `Err` in its slot without affecting the rest.
    #[inline]
    pub async fn embed_batch(&self, texts: &[String]) -> Vec<Result<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());

        for (group_index, group) in texts.chunks(self.batch_size.max(1)).enumerate() {
            if group_index > 0 {
                sleep(INTER_BATCH_DELAY).await;
            }

            let in_flight: Vec<_> = group.iter().map(|text| self.embed(text)).collect();
            let outcomes = join_all(in_flight).await;

            for (outcome, text) in outcomes.iter().zip(group) {
                if let Err(error) = outcome {
                    warn!("Failed to embed text ({} bytes): {error}", text.len());
                }
            }
            results.extend(outcomes);
        }

        results
    }

    /// Embed a code fragment with a language/context header, matching the
    /// input shape the provider expects for code semantics.
    #[inline]
    pub async fn embed_code(
        &self,
        code: &str,
        language: &str,
        context: Option<&str>,
    ) -> Result<Vec<f32>> {
        self.embed(&code_input(code, language, context)).await
    }

    async fn request_embedding(&self, text: &str) -> Result<Vec<f32>> {
        let url = self
            .base_url
            .join(EMBEDDINGS_ENDPOINT)
            .map_err(|e| CodevecError::Config(format!("Failed to build embeddings URL: {e}")))?;

        let request = EmbedRequest {
            input: text,
            model: &self.model,
        };

        debug!("Requesting embedding for {} bytes of text", text.len());

        let response = self
            .client
            .post(url)
            .json(&request)
            .send()
            .await
            .map_err(|e| CodevecError::EmbeddingUnavailable(describe_transport_error(&e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CodevecError::EmbeddingUnavailable(format!(
                "provider returned HTTP {status}"
            )));
        }

        let body: EmbedResponse = response
            .json()
            .await
            .map_err(|e| CodevecError::EmbeddingMalformed(e.to_string()))?;

        let embedding = body
            .data
            .into_iter()
            .next()
            .ok_or_else(|| {
                CodevecError::EmbeddingMalformed("response contained no embeddings".to_string())
            })?
            .embedding;

        if embedding.len() != self.dimension {
            return Err(CodevecError::EmbeddingMalformed(format!(
                "expected a {}-dimension vector, got {}",
                self.dimension,
                embedding.len()
            )));
        }

        Ok(embedding)
    }
}

fn describe_transport_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        "request timed out".to_string()
    } else if error.is_connect() {
        format!("connection failed: {error}")
    } else {
        error.to_string()
    }
}

/// Format a code fragment for embedding, prefixing language and optional
/// context so semantically equal code in different languages stays distinct.
#[inline]
pub fn code_input(code: &str, language: &str, context: Option<&str>) -> String {
    let mut formatted = format!("Language: {language}\n");
    if let Some(context) = context {
        let _ = writeln!(formatted, "Context: {context}");
    }
    formatted.push_str("Code:\n");
    formatted.push_str(code);
    formatted
}

/// Cosine similarity of two vectors, in `[-1, 1]`.
///
/// Mismatched lengths, empty vectors, and zero-norm vectors all score 0.0
/// rather than erroring.
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denominator = norm_a.sqrt() * norm_b.sqrt();
    if denominator == 0.0 {
        0.0
    } else {
        dot / denominator
    }
}
