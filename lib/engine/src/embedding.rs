//! Text-embedding capability
//!
//! The engine treats the embedding model as opaque: text in, floats out.
//! The output length may differ from the index dimension; the
//! [`QueryEncoder`](crate::encoder::QueryEncoder) reconciles it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Text in, vector out.
#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    fn model_name(&self) -> &str;
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedData>,
}

#[derive(Deserialize)]
struct EmbedData {
    embedding: Vec<f32>,
}

/// Client for an OpenAI-compatible `/v1/embeddings` endpoint.
pub struct HttpEmbeddingModel {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl HttpEmbeddingModel {
    /// `base_url` is the server root, e.g. `http://localhost:8080`.
    pub fn new(
        base_url: &str,
        model: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, EmbeddingError> {
        let base = base_url.trim().trim_end_matches('/');
        if base.is_empty() {
            return Err(EmbeddingError::Config("embedding URL is empty".to_string()));
        }
        let endpoint = if base.ends_with("/embeddings") {
            base.to_string()
        } else {
            format!("{}/v1/embeddings", base)
        };
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint,
            model: model.into(),
            api_key: api_key.filter(|k| !k.is_empty()),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl EmbeddingModel for HttpEmbeddingModel {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut request = self.client.post(&self.endpoint).json(&EmbedRequest {
            model: &self.model,
            input: text,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, endpoint = %self.endpoint, "Embedding request failed");
            return Err(EmbeddingError::Api(format!("{}: {}", status, body)));
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::InvalidResponse(e.to_string()))?;
        let vector = parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| EmbeddingError::InvalidResponse("no embedding in response".into()))?;

        debug!(model = %self.model, dim = vector.len(), "Embedded query");
        Ok(vector)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Deterministic feature-hashing embedder.
///
/// Character trigrams add 1.0 and whole words add 2.0 to the bucket their
/// hash selects; the result is L2-normalized. Needs no network and gives
/// identical vectors for identical text, which makes it usable offline and
/// in tests.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dim: usize,
}

impl HashingEmbedder {
    pub fn new(dim: usize) -> Result<Self, EmbeddingError> {
        if dim == 0 {
            return Err(EmbeddingError::Config("dimension must be positive".to_string()));
        }
        Ok(Self { dim })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Synchronous form of [`EmbeddingModel::embed`], also used to prepare
    /// entity vectors for offline catalogs.
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dim];
        let text = text.to_lowercase();

        let chars: Vec<char> = text.chars().collect();
        for window in chars.windows(3) {
            vector[self.bucket(window)] += 1.0;
        }
        for word in text.split(|c: char| c.is_whitespace() || c == ',') {
            if !word.is_empty() {
                vector[self.bucket(word)] += 2.0;
            }
        }

        resrank_core::vector::normalize_in_place(&mut vector);
        vector
    }

    fn bucket<T: Hash + ?Sized>(&self, item: &T) -> usize {
        let mut hasher = DefaultHasher::new();
        item.hash(&mut hasher);
        (hasher.finish() % self.dim as u64) as usize
    }
}

#[async_trait]
impl EmbeddingModel for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(self.embed_text(text))
    }

    fn model_name(&self) -> &str {
        "feature-hashing"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hashing_embedder_deterministic() {
        let embedder = HashingEmbedder::new(64).unwrap();
        let a = embedder.embed_text("battery recycling");
        let b = embedder.embed_text("Battery Recycling");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_hashing_embedder_related_text_is_closer() {
        let embedder = HashingEmbedder::new(256).unwrap();
        let query = embedder.embed_text("lithium battery materials");
        let near = embedder.embed_text("battery materials for lithium cells");
        let far = embedder.embed_text("medieval poetry");
        let dot = |a: &[f32], b: &[f32]| a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>();
        assert!(dot(&query, &near) > dot(&query, &far));
    }

    #[test]
    fn test_hashing_embedder_empty_text() {
        let embedder = HashingEmbedder::new(8).unwrap();
        assert!(embedder.embed_text("").iter().all(|&x| x == 0.0));
        assert!(HashingEmbedder::new(0).is_err());
    }

    #[test]
    fn test_http_endpoint_resolution() {
        let timeout = Duration::from_secs(1);
        let model = HttpEmbeddingModel::new("http://localhost:8080/", "e5", None, timeout).unwrap();
        assert_eq!(model.endpoint(), "http://localhost:8080/v1/embeddings");

        let model =
            HttpEmbeddingModel::new("http://host/v1/embeddings", "e5", None, timeout).unwrap();
        assert_eq!(model.endpoint(), "http://host/v1/embeddings");
        assert_eq!(model.model_name(), "e5");

        assert!(HttpEmbeddingModel::new("  ", "e5", None, timeout).is_err());
    }
}
