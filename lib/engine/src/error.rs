use crate::embedding::EmbeddingError;
use crate::generation::GenerationError;
use crate::source::SourceError;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] resrank_core::Error),

    /// No text-embedding capability was configured
    #[error("Encoder unavailable: no embedding model is configured")]
    EncoderUnavailable,

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Rationale generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("{stage} timed out after {after:?}")]
    Timeout { stage: &'static str, after: Duration },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Startup conditions that abort initialization and are never retried.
    pub fn is_startup_fatal(&self) -> bool {
        matches!(
            self,
            Error::EncoderUnavailable
                | Error::InvalidConfig(_)
                | Error::Core(resrank_core::Error::EmptyIndex)
                | Error::Core(resrank_core::Error::InvalidConfig(_))
        )
    }
}
