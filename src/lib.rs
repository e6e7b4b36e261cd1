//! # resrank
//!
//! Researcher recommendation engine: dense-vector retrieval combined with
//! keyword and impact heuristics, with a natural-language rationale for
//! every result.
//!
//! A request runs in two phases. A cheap coarse filter over-fetches nearest
//! neighbors by cosine similarity and drops those below a threshold; only
//! the `top_k` survivors are enriched with supporting documents, scored and
//! explained.
//!
//! ## Quick Start
//!
//! ### As a Server
//!
//! ```bash
//! resrank --entities researchers.json --embedding-url http://localhost:8080 serve --port 8000
//! curl -X POST localhost:8000/recommend -H 'content-type: application/json' \
//!      -d '{"query": "solid state battery", "top_k": 3}'
//! ```
//!
//! ### As a Library
//!
//! ```rust
//! use resrank::prelude::*;
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> resrank::engine::Result<()> {
//! let embedder = HashingEmbedder::new(64).unwrap();
//! let records = vec![
//!     EntityRecord::new(
//!         "r1",
//!         "Dr. Kim",
//!         Vector::new(embedder.embed_text("battery electrolyte")),
//!         KeywordSets::new(vec!["battery".into()], vec![]),
//!     ),
//!     EntityRecord::new(
//!         "r2",
//!         "Dr. Lee",
//!         Vector::new(embedder.embed_text("medieval poetry")),
//!         KeywordSets::new(vec!["poetry".into()], vec![]),
//!     ),
//! ];
//!
//! let store = EntityStore::init(Arc::new(InMemoryEntitySource::new(records)), IndexOptions::exact())?;
//! let config = RecommenderConfig { similarity_threshold: 0.0, ..Default::default() };
//! let recommender = Recommender::new(Arc::new(store), Some(Arc::new(embedder)), config)?;
//!
//! let results = recommender.recommend("battery", Some(1)).await?;
//! assert_eq!(results[0].entity_id.as_str(), "r1");
//! # Ok(())
//! # }
//! ```
//!
//! ## Crate Structure
//!
//! - `resrank-core` - entity records, vectors, SIMD dot product, similarity index (exact / HNSW)
//! - `resrank-scoring` - keyword handling, candidate scorer, rationale prompt and fallback
//! - `resrank-engine` - sources, embedding and generation clients, catalog store, orchestrator
//! - `resrank-api` - REST API

pub use resrank_core as core;
pub use resrank_engine as engine;
pub use resrank_scoring as scoring;

pub use resrank_core::{
    BackendKind, EntityId, EntityRecord, HnswParams, IndexOptions, KeywordSets, SimilarityIndex,
    Vector,
};
pub use resrank_engine::{Error, Recommender, RecommenderConfig, Result};
pub use resrank_scoring::{Recommendation, RecommendationStats};

pub use resrank_api::RestApi;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        BackendKind, EntityId, EntityRecord, HnswParams, IndexOptions, KeywordSets, Recommendation,
        Recommender, RecommenderConfig, RestApi, SimilarityIndex, Vector,
    };
    pub use resrank_engine::{
        EmbeddingModel, EnrichmentSource, EntitySource, EntityStore, HashingEmbedder,
        HttpEmbeddingModel, InMemoryEnrichmentSource, InMemoryEntitySource, JsonFileEntitySource,
        NoEnrichment, RationaleGenerator,
    };
}

/// SIMD-optimized vector operations
pub mod simd {
    pub use resrank_core::simd::{dot_product_simd, norm_simd};
}
