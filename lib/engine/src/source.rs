//! Entity and enrichment sources
//!
//! [`EntitySource`] is the bulk read performed at startup and on reload.
//! [`EnrichmentSource`] is the per-candidate document lookup performed for
//! each recommendation that survives the coarse filter.

use async_trait::async_trait;
use resrank_core::{EntityId, EntityRecord, KeywordSets, Vector};
use resrank_scoring::EnrichmentDocument;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Source unavailable: {0}")]
    Unavailable(String),
}

impl From<serde_json::Error> for SourceError {
    fn from(e: serde_json::Error) -> Self {
        SourceError::Parse(e.to_string())
    }
}

/// Bulk read of every entity.
pub trait EntitySource: Send + Sync {
    fn load(&self) -> Result<Vec<EntityRecord>, SourceError>;

    /// Human-readable description for logs
    fn describe(&self) -> String;
}

/// Fixed set of records, mostly for tests and embedded use.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEntitySource {
    records: Vec<EntityRecord>,
}

impl InMemoryEntitySource {
    pub fn new(records: Vec<EntityRecord>) -> Self {
        Self { records }
    }
}

impl EntitySource for InMemoryEntitySource {
    fn load(&self) -> Result<Vec<EntityRecord>, SourceError> {
        Ok(self.records.clone())
    }

    fn describe(&self) -> String {
        format!("in-memory ({} records)", self.records.len())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(u64),
}

impl RawId {
    fn into_string(self) -> String {
        match self {
            RawId::Text(s) => s,
            RawId::Number(n) => n.to_string(),
        }
    }
}

impl From<RawId> for EntityId {
    fn from(raw: RawId) -> Self {
        EntityId::new(raw.into_string())
    }
}

/// Embeddings arrive either as a JSON array or as that array encoded in a
/// string (pgvector text form), sometimes with single quotes.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawEmbedding {
    Values(Vec<f32>),
    Encoded(String),
}

impl RawEmbedding {
    fn decode(self) -> Result<Vec<f32>, SourceError> {
        match self {
            RawEmbedding::Values(v) => Ok(v),
            RawEmbedding::Encoded(s) => serde_json::from_str(&s)
                .or_else(|_| serde_json::from_str(&s.replace('\'', "\"")))
                .map_err(SourceError::from),
        }
    }
}

#[derive(Deserialize)]
struct RawEntity {
    #[serde(alias = "researcher_id")]
    id: RawId,
    #[serde(alias = "display_name")]
    name: String,
    embedding: RawEmbedding,
    #[serde(default, alias = "research_keywords", alias = "thesis_keywords")]
    primary_keywords: Option<Vec<Option<String>>>,
    #[serde(default, alias = "patent_keywords")]
    secondary_keywords: Option<Vec<Option<String>>>,
}

fn flatten_keywords(raw: Option<Vec<Option<String>>>) -> Vec<String> {
    raw.unwrap_or_default().into_iter().flatten().collect()
}

impl RawEntity {
    fn into_record(self) -> Result<EntityRecord, SourceError> {
        let embedding = self.embedding.decode()?;
        Ok(EntityRecord::new(
            self.id,
            self.name,
            Vector::new(embedding),
            KeywordSets::new(
                flatten_keywords(self.primary_keywords),
                flatten_keywords(self.secondary_keywords),
            ),
        ))
    }
}

/// Reads a JSON array of entity records from disk on every `load`.
///
/// Malformed records are logged and skipped; the rest of the file still
/// loads. A file that is not a JSON array fails as a whole.
#[derive(Debug, Clone)]
pub struct JsonFileEntitySource {
    path: PathBuf,
}

impl JsonFileEntitySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EntitySource for JsonFileEntitySource {
    fn load(&self) -> Result<Vec<EntityRecord>, SourceError> {
        let text = std::fs::read_to_string(&self.path)?;
        let values: Vec<serde_json::Value> = serde_json::from_str(&text)?;

        let mut records = Vec::with_capacity(values.len());
        for (position, value) in values.into_iter().enumerate() {
            match serde_json::from_value::<RawEntity>(value)
                .map_err(SourceError::from)
                .and_then(RawEntity::into_record)
            {
                Ok(record) => records.push(record),
                Err(e) => warn!(position, error = %e, "Skipping malformed entity record"),
            }
        }

        info!(path = %self.path.display(), loaded = records.len(), "Read entity file");
        Ok(records)
    }

    fn describe(&self) -> String {
        format!("json file {}", self.path.display())
    }
}

/// Per-entity supporting documents, highest impact first.
#[async_trait]
pub trait EnrichmentSource: Send + Sync {
    /// At most `limit` documents for `entity_id`, ordered by impact descending.
    async fn documents(
        &self,
        entity_id: &EntityId,
        limit: usize,
    ) -> Result<Vec<EnrichmentDocument>, SourceError>;

    fn name(&self) -> &str;
}

/// Enrichment disabled: every entity has no documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEnrichment;

#[async_trait]
impl EnrichmentSource for NoEnrichment {
    async fn documents(
        &self,
        _entity_id: &EntityId,
        _limit: usize,
    ) -> Result<Vec<EnrichmentDocument>, SourceError> {
        Ok(Vec::new())
    }

    fn name(&self) -> &str {
        "none"
    }
}

#[derive(Deserialize)]
struct RawDocument {
    #[serde(alias = "thesis_id")]
    id: RawId,
    title: String,
    #[serde(default, alias = "impact_factor")]
    impact: Option<f64>,
    #[serde(default)]
    keywords: Option<Vec<Option<String>>>,
    #[serde(default, alias = "journal", alias = "journal_name")]
    venue: Option<String>,
}

impl From<RawDocument> for EnrichmentDocument {
    fn from(raw: RawDocument) -> Self {
        EnrichmentDocument {
            id: raw.id.into_string(),
            title: raw.title,
            impact: raw.impact.unwrap_or(0.0),
            keywords: flatten_keywords(raw.keywords),
            venue: raw.venue,
        }
    }
}

/// Documents held in memory, keyed by entity id.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEnrichmentSource {
    documents: HashMap<EntityId, Vec<EnrichmentDocument>>,
}

impl InMemoryEnrichmentSource {
    pub fn new(documents: HashMap<EntityId, Vec<EnrichmentDocument>>) -> Self {
        let documents = documents
            .into_iter()
            .map(|(id, mut docs)| {
                // Stable: equal impact keeps insertion order.
                docs.sort_by(|a, b| b.effective_impact().total_cmp(&a.effective_impact()));
                (id, docs)
            })
            .collect();
        Self { documents }
    }

    /// Load a JSON object mapping entity id to an array of documents.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let raw: HashMap<String, Vec<RawDocument>> = serde_json::from_str(&text)?;
        let documents = raw
            .into_iter()
            .map(|(id, docs)| {
                (
                    EntityId::new(id),
                    docs.into_iter().map(EnrichmentDocument::from).collect(),
                )
            })
            .collect();
        Ok(Self::new(documents))
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[async_trait]
impl EnrichmentSource for InMemoryEnrichmentSource {
    async fn documents(
        &self,
        entity_id: &EntityId,
        limit: usize,
    ) -> Result<Vec<EnrichmentDocument>, SourceError> {
        Ok(self
            .documents
            .get(entity_id)
            .map(|docs| docs.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    fn name(&self) -> &str {
        "in-memory"
    }
}
