//! Embedding Encoder
//!
//! Maps query text into the index's vector space. Model output is
//! reconciled to the index dimension by truncation or zero padding rather
//! than rejected, so a model swap with a different width keeps serving.

use crate::embedding::EmbeddingModel;
use crate::error::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Truncate to the first `dim` components, or right-pad with zeros.
pub fn reconcile_dimension(mut raw: Vec<f32>, dim: usize) -> Vec<f32> {
    raw.resize(dim, 0.0);
    raw
}

/// Encodes query text to vectors of the index dimension.
#[derive(Clone)]
pub struct QueryEncoder {
    model: Arc<dyn EmbeddingModel>,
    dim: usize,
    timeout: Option<Duration>,
}

impl std::fmt::Debug for QueryEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryEncoder")
            .field("model", &self.model.model_name())
            .field("dim", &self.dim)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl QueryEncoder {
    /// Fails with [`Error::EncoderUnavailable`] when no model is configured.
    pub fn new(model: Option<Arc<dyn EmbeddingModel>>, dim: usize) -> Result<Self> {
        let model = model.ok_or(Error::EncoderUnavailable)?;
        if dim == 0 {
            return Err(Error::InvalidConfig("index dimension must be positive".into()));
        }
        Ok(Self {
            model,
            dim,
            timeout: None,
        })
    }

    /// Bound every `encode` call by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }

    /// Embed `text` and reconcile the result to the index dimension.
    pub async fn encode(&self, text: &str) -> Result<Vec<f32>> {
        self.encode_to(text, self.dim).await
    }

    /// Embed `text` and reconcile the result to `dim`, for callers holding
    /// a catalog whose dimension changed after a reload.
    pub async fn encode_to(&self, text: &str, dim: usize) -> Result<Vec<f32>> {
        let raw = match self.timeout {
            Some(after) => tokio::time::timeout(after, self.model.embed(text))
                .await
                .map_err(|_| Error::Timeout {
                    stage: "embedding",
                    after,
                })??,
            None => self.model.embed(text).await?,
        };

        if raw.len() != dim {
            debug!(
                model_dim = raw.len(),
                index_dim = dim,
                "Reconciling query embedding dimension"
            );
        }
        Ok(reconcile_dimension(raw, dim))
    }
}
