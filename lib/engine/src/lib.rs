//! # resrank Engine
//!
//! The recommendation pipeline and its external boundaries.
//!
//! - [`EntityStore`] - owns the current entity catalog, with `init` / `reload`
//! - [`QueryEncoder`] - embeds query text and reconciles it to the index dimension
//! - [`Recommender`] - coarse filter, threshold, truncation, enrichment, rationale
//!
//! Boundary traits with their bundled implementations:
//!
//! | Trait | Implementations |
//! |-------|-----------------|
//! | [`EntitySource`] | [`JsonFileEntitySource`], [`InMemoryEntitySource`] |
//! | [`EnrichmentSource`] | [`InMemoryEnrichmentSource`], [`NoEnrichment`] |
//! | [`EmbeddingModel`] | [`HttpEmbeddingModel`], [`HashingEmbedder`] |
//! | [`RationaleGenerator`] | [`ChatRationaleGenerator`] |
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use resrank_core::{EntityRecord, IndexOptions, KeywordSets, Vector};
//! use resrank_engine::{
//!     EntityStore, HashingEmbedder, InMemoryEntitySource, Recommender, RecommenderConfig,
//! };
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> resrank_engine::Result<()> {
//! let embedder = HashingEmbedder::new(64).unwrap();
//! let records = vec![EntityRecord::new(
//!     "r1",
//!     "Dr. Kim",
//!     Vector::new(embedder.embed_text("solid state battery electrolyte")),
//!     KeywordSets::new(vec!["battery".into()], vec![]),
//! )];
//!
//! let store = EntityStore::init(
//!     Arc::new(InMemoryEntitySource::new(records)),
//!     IndexOptions::exact(),
//! )?;
//! let config = RecommenderConfig { similarity_threshold: 0.0, ..Default::default() };
//! let recommender = Recommender::new(Arc::new(store), Some(Arc::new(embedder)), config)?;
//!
//! let results = recommender.recommend("battery electrolyte", None).await?;
//! assert_eq!(results[0].name, "Dr. Kim");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod embedding;
pub mod encoder;
pub mod error;
pub mod generation;
pub mod recommender;
pub mod source;
pub mod store;

pub use config::RecommenderConfig;
pub use embedding::{EmbeddingError, EmbeddingModel, HashingEmbedder, HttpEmbeddingModel};
pub use encoder::{reconcile_dimension, QueryEncoder};
pub use error::{Error, Result};
pub use generation::{ChatRationaleGenerator, GenerationError, RationaleGenerator};
pub use recommender::{apply_threshold, Recommender};
pub use source::{
    EnrichmentSource, EntitySource, InMemoryEnrichmentSource, InMemoryEntitySource,
    JsonFileEntitySource, NoEnrichment, SourceError,
};
pub use store::{Catalog, EntityStore};
