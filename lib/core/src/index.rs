//! Similarity Index
//!
//! Holds a row-normalized matrix of every entity embedding and answers
//! top-k cosine similarity queries through a [`NearestNeighborBackend`].
//! The backend is chosen once in [`SimilarityIndex::build`]; nothing else
//! in the crate inspects which variant is running.

use crate::entity::EntityId;
use crate::hnsw::{HnswBackend, HnswParams};
use crate::vector::normalize_in_place;
use crate::{Error, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Rows scanned in parallel once the matrix holds at least this many entries.
const PARALLEL_SCAN_MIN_ROWS: usize = 8192;

/// Nearest-neighbor backend selected at build time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Brute-force dot product against every row
    #[default]
    Exact,
    /// HNSW graph walk (approximate)
    Hnsw,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Exact => f.write_str("exact"),
            BackendKind::Hnsw => f.write_str("hnsw"),
        }
    }
}

impl std::str::FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "exact" | "flat" | "brute-force" => Ok(BackendKind::Exact),
            "hnsw" => Ok(BackendKind::Hnsw),
            other => Err(Error::InvalidConfig(format!("unknown index backend: {}", other))),
        }
    }
}

/// Options controlling index construction
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexOptions {
    #[serde(default)]
    pub backend: BackendKind,
    #[serde(default)]
    pub hnsw: HnswParams,
}

impl IndexOptions {
    pub fn exact() -> Self {
        Self::default()
    }

    pub fn hnsw(params: HnswParams) -> Self {
        Self {
            backend: BackendKind::Hnsw,
            hnsw: params,
        }
    }
}

/// One scored row of the index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    /// Load-order position of the entity (row of the matrix)
    pub position: usize,
    /// Cosine similarity in [-1, 1]
    pub similarity: f32,
}

/// Highest similarity first, lower load position first on ties.
#[inline]
pub fn rank_order(a: &Hit, b: &Hit) -> Ordering {
    b.similarity
        .total_cmp(&a.similarity)
        .then_with(|| a.position.cmp(&b.position))
}

/// Immutable row-normalized matrix plus the parallel id list.
///
/// Row `i` of `rows` always belongs to `ids[i]`.
#[derive(Debug)]
pub struct IndexSnapshot {
    rows: Vec<f32>,
    ids: Vec<EntityId>,
    dim: usize,
}

impl IndexSnapshot {
    #[inline]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }

    #[inline]
    pub fn ids(&self) -> &[EntityId] {
        &self.ids
    }

    #[inline(always)]
    pub fn row(&self, position: usize) -> &[f32] {
        let start = position * self.dim;
        &self.rows[start..start + self.dim]
    }

    #[inline(always)]
    pub fn similarity(&self, query: &[f32], position: usize) -> f32 {
        crate::simd::dot_product_simd(query, self.row(position))
    }
}

/// Capability shared by the exact and accelerated search paths.
///
/// Implementations receive an already-normalized query of the snapshot's
/// dimension and must return at most `k` hits in [`rank_order`].
pub trait NearestNeighborBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    fn search(&self, query: &[f32], k: usize) -> Vec<Hit>;
}

/// Brute-force backend: one dot product per row.
pub struct ExactBackend {
    snapshot: Arc<IndexSnapshot>,
}

impl ExactBackend {
    pub fn new(snapshot: Arc<IndexSnapshot>) -> Self {
        Self { snapshot }
    }
}

impl NearestNeighborBackend for ExactBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Exact
    }

    fn search(&self, query: &[f32], k: usize) -> Vec<Hit> {
        exact_top_k(&self.snapshot, query, k)
    }
}

/// Score every row and keep the best `k` in [`rank_order`].
pub fn exact_top_k(snapshot: &IndexSnapshot, query: &[f32], k: usize) -> Vec<Hit> {
    let n = snapshot.len();
    if n == 0 || k == 0 {
        return Vec::new();
    }

    let score = |position: usize| Hit {
        position,
        similarity: snapshot.similarity(query, position),
    };
    let mut hits: Vec<Hit> = if n >= PARALLEL_SCAN_MIN_ROWS {
        (0..n).into_par_iter().map(score).collect()
    } else {
        (0..n).map(score).collect()
    };

    if k < n {
        hits.select_nth_unstable_by(k - 1, rank_order);
        hits.truncate(k);
    }
    hits.sort_unstable_by(rank_order);
    hits
}

/// An entry rejected during [`SimilarityIndex::build`].
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedVector {
    /// Position of the entry in the input sequence
    pub input_position: usize,
    pub id: EntityId,
    pub expected_dim: usize,
    pub actual_dim: usize,
}

/// Outcome of building an index.
pub struct IndexBuild {
    pub index: SimilarityIndex,
    /// Input positions of accepted entries, in row order
    pub accepted: Vec<usize>,
    pub rejected: Vec<RejectedVector>,
}

/// Read-only index answering k-nearest-neighbor queries by cosine similarity.
///
/// Safe to query from many threads at once; nothing mutates after build.
pub struct SimilarityIndex {
    snapshot: Arc<IndexSnapshot>,
    backend: Box<dyn NearestNeighborBackend>,
}

impl std::fmt::Debug for SimilarityIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimilarityIndex")
            .field("len", &self.len())
            .field("dim", &self.dim())
            .field("backend", &self.backend.kind())
            .finish()
    }
}

impl SimilarityIndex {
    /// Build an index from `(id, raw vector)` entries.
    ///
    /// The first non-empty vector fixes the dimension; later entries of a
    /// different length (and zero-length entries) are rejected individually.
    /// Fails with [`Error::EmptyIndex`] when nothing is accepted.
    pub fn build<'a, I>(entries: I, options: &IndexOptions) -> Result<IndexBuild>
    where
        I: IntoIterator<Item = (&'a EntityId, &'a [f32])>,
    {
        let mut rows: Vec<f32> = Vec::new();
        let mut ids: Vec<EntityId> = Vec::new();
        let mut accepted = Vec::new();
        let mut rejected = Vec::new();
        let mut dim = 0usize;

        for (input_position, (id, raw)) in entries.into_iter().enumerate() {
            if dim == 0 && !raw.is_empty() {
                dim = raw.len();
            }
            if raw.is_empty() || raw.len() != dim {
                debug!(entity_id = %id, expected = dim, actual = raw.len(), "rejecting vector");
                rejected.push(RejectedVector {
                    input_position,
                    id: id.clone(),
                    expected_dim: dim,
                    actual_dim: raw.len(),
                });
                continue;
            }

            let start = rows.len();
            rows.extend_from_slice(raw);
            normalize_in_place(&mut rows[start..]);
            ids.push(id.clone());
            accepted.push(input_position);
        }

        if ids.is_empty() {
            return Err(Error::EmptyIndex);
        }
        if !rejected.is_empty() {
            warn!(
                rejected = rejected.len(),
                dim, "rejected vectors whose dimension does not match the index"
            );
        }

        let snapshot = Arc::new(IndexSnapshot { rows, ids, dim });
        let backend = Self::select_backend(snapshot.clone(), options);
        info!(
            entities = snapshot.len(),
            dim,
            backend = %backend.kind(),
            "similarity index built"
        );

        Ok(IndexBuild {
            index: SimilarityIndex { snapshot, backend },
            accepted,
            rejected,
        })
    }

    fn select_backend(
        snapshot: Arc<IndexSnapshot>,
        options: &IndexOptions,
    ) -> Box<dyn NearestNeighborBackend> {
        match options.backend {
            BackendKind::Exact => Box::new(ExactBackend::new(snapshot)),
            BackendKind::Hnsw => match HnswBackend::build(snapshot.clone(), &options.hnsw) {
                Ok(hnsw) => Box::new(hnsw),
                Err(e) => {
                    warn!(error = %e, "HNSW backend unavailable, falling back to exact search");
                    Box::new(ExactBackend::new(snapshot))
                }
            },
        }
    }

    /// Return the `k` entities most similar to `vector`.
    ///
    /// The query is normalized first. When `k >= len()` every entity is
    /// returned, sorted by similarity descending with ties in load order.
    pub fn query(&self, vector: &[f32], k: usize) -> Result<Vec<Hit>> {
        if vector.len() != self.dim() {
            return Err(Error::InvalidDimension {
                expected: self.dim(),
                actual: vector.len(),
            });
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut query = vector.to_vec();
        normalize_in_place(&mut query);
        Ok(self.backend.search(&query, k.min(self.len())))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.snapshot.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.snapshot.is_empty()
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.snapshot.dim()
    }

    #[inline]
    pub fn id(&self, position: usize) -> Option<&EntityId> {
        self.snapshot.ids().get(position)
    }

    #[inline]
    pub fn snapshot(&self) -> &IndexSnapshot {
        &self.snapshot
    }

    /// Backend actually serving queries (after any fallback)
    #[inline]
    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }
}
