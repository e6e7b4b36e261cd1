//! Entity catalog state
//!
//! A [`Catalog`] is one immutable snapshot: entity records plus the
//! similarity index built over their embeddings, row `i` of the index
//! belonging to `entities()[i]`. [`EntityStore`] owns the current snapshot
//! and swaps it whole on reload, so readers never see a torn catalog.

use crate::error::Result;
use crate::source::EntitySource;
use parking_lot::RwLock;
use resrank_core::{
    BackendKind, EntityId, EntityRecord, IndexOptions, RejectedVector, SimilarityIndex,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

#[derive(Debug)]
pub struct Catalog {
    entities: Vec<EntityRecord>,
    by_id: HashMap<EntityId, usize>,
    index: SimilarityIndex,
    rejected: Vec<RejectedVector>,
}

impl Catalog {
    /// Index `records`, dropping those whose embedding does not fit the
    /// index dimension.
    pub fn build(records: Vec<EntityRecord>, options: &IndexOptions) -> Result<Self> {
        let built = SimilarityIndex::build(
            records.iter().map(|r| (&r.id, r.embedding.as_slice())),
            options,
        )?;

        let mut slots: Vec<Option<EntityRecord>> = records.into_iter().map(Some).collect();
        let entities: Vec<EntityRecord> = built
            .accepted
            .iter()
            .filter_map(|&position| slots[position].take())
            .collect();

        let mut by_id = HashMap::with_capacity(entities.len());
        for (row, entity) in entities.iter().enumerate() {
            if by_id.insert(entity.id.clone(), row).is_some() {
                warn!(entity_id = %entity.id, "Duplicate entity id; lookups resolve to the last row");
            }
        }

        for rejected in &built.rejected {
            warn!(
                entity_id = %rejected.id,
                expected = rejected.expected_dim,
                actual = rejected.actual_dim,
                "Entity rejected: embedding dimension mismatch"
            );
        }

        Ok(Self {
            entities,
            by_id,
            index: built.index,
            rejected: built.rejected,
        })
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.index.dim()
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.index.backend_kind()
    }

    pub fn index(&self) -> &SimilarityIndex {
        &self.index
    }

    /// Entity at index row `position`
    pub fn entity_at(&self, position: usize) -> Option<&EntityRecord> {
        self.entities.get(position)
    }

    pub fn entity(&self, id: &EntityId) -> Option<&EntityRecord> {
        self.by_id.get(id).and_then(|&row| self.entities.get(row))
    }

    pub fn entities(&self) -> &[EntityRecord] {
        &self.entities
    }

    /// Records left out of the index
    pub fn rejected(&self) -> &[RejectedVector] {
        &self.rejected
    }

    /// Entities whose display name contains `fragment`, ignoring case, in
    /// load order. A blank fragment matches nothing.
    pub fn search_by_name(&self, fragment: &str, limit: usize) -> Vec<&EntityRecord> {
        let needle = fragment.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        self.entities
            .iter()
            .filter(|e| e.display_name.to_lowercase().contains(&needle))
            .take(limit)
            .collect()
    }
}

/// Owner of the current [`Catalog`] with an `init` / `reload` lifecycle.
pub struct EntityStore {
    source: Arc<dyn EntitySource>,
    options: IndexOptions,
    current: RwLock<Arc<Catalog>>,
}

impl std::fmt::Debug for EntityStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityStore")
            .field("source", &self.source.describe())
            .field("options", &self.options)
            .field("entities", &self.current.read().len())
            .finish()
    }
}

impl EntityStore {
    /// Load the source and build the first catalog.
    ///
    /// An empty source fails with `EmptyIndex`, which callers treat as a
    /// fatal startup condition.
    pub fn init(source: Arc<dyn EntitySource>, options: IndexOptions) -> Result<Self> {
        let catalog = Self::load_catalog(source.as_ref(), &options)?;
        Ok(Self {
            source,
            options,
            current: RwLock::new(Arc::new(catalog)),
        })
    }

    /// Rebuild from the source and swap the snapshot in one step.
    ///
    /// On failure the previous catalog stays in service.
    pub fn reload(&self) -> Result<Arc<Catalog>> {
        let catalog = Arc::new(Self::load_catalog(self.source.as_ref(), &self.options)?);
        *self.current.write() = catalog.clone();
        Ok(catalog)
    }

    /// The catalog in service right now
    pub fn snapshot(&self) -> Arc<Catalog> {
        self.current.read().clone()
    }

    pub fn options(&self) -> &IndexOptions {
        &self.options
    }

    fn load_catalog(source: &dyn EntitySource, options: &IndexOptions) -> Result<Catalog> {
        let start = Instant::now();
        let records = source.load()?;
        let loaded = records.len();
        let catalog = Catalog::build(records, options)?;
        info!(
            source = %source.describe(),
            loaded,
            indexed = catalog.len(),
            rejected = catalog.rejected().len(),
            dim = catalog.dim(),
            backend = %catalog.backend_kind(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Entity catalog ready"
        );
        Ok(catalog)
    }
}
