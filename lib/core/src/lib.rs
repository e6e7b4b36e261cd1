//! # resrank Core
//!
//! Core library for the resrank recommendation engine.
//!
//! This crate provides the fundamental data structures and algorithms:
//!
//! - [`EntityRecord`] - An entity (researcher) with its embedding and keyword sets
//! - [`Vector`] - Dense vector representation with SIMD operations
//! - [`SimilarityIndex`] - Row-normalized matrix answering top-k cosine queries
//! - [`HnswBackend`] - HNSW approximate nearest neighbor backend
//!
//! ## Example
//!
//! ```rust
//! use resrank_core::{EntityId, IndexOptions, SimilarityIndex};
//!
//! let ids = vec![EntityId::from("a"), EntityId::from("b")];
//! let vectors = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
//! let built = SimilarityIndex::build(
//!     ids.iter().zip(vectors.iter().map(|v| v.as_slice())),
//!     &IndexOptions::exact(),
//! ).unwrap();
//!
//! let hits = built.index.query(&[1.0, 0.1], 1).unwrap();
//! assert_eq!(built.index.id(hits[0].position).unwrap().as_str(), "a");
//! ```

pub mod entity;
pub mod error;
pub mod hnsw;
pub mod index;
pub mod vector;

/// SIMD-optimized vector operations
///
/// Provides hardware-accelerated dot products:
/// - AVX2/FMA on x86_64
/// - NEON on ARM64/Apple Silicon
pub mod simd;

pub use entity::{EntityId, EntityRecord, KeywordSets};
pub use error::{Error, Result};
pub use hnsw::{HnswBackend, HnswParams};
pub use index::{
    BackendKind, ExactBackend, Hit, IndexBuild, IndexOptions, IndexSnapshot,
    NearestNeighborBackend, RejectedVector, SimilarityIndex,
};
pub use vector::Vector;
