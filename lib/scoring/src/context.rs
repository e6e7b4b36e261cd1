//! Enrichment context attached to a candidate

use serde::{Deserialize, Serialize};

/// A document associated with an entity (a paper in the default deployment).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentDocument {
    pub id: String,
    pub title: String,
    /// Per-document impact metric (journal impact factor by default)
    #[serde(default)]
    pub impact: f64,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub venue: Option<String>,
}

impl EnrichmentDocument {
    /// Impact floored at zero; missing or invalid metrics count as 0.
    #[inline]
    pub fn effective_impact(&self) -> f64 {
        if self.impact.is_finite() {
            self.impact.max(0.0)
        } else {
            0.0
        }
    }

    /// `title (venue, IF x.xx)` as used in rationale prompts
    pub fn summary(&self) -> String {
        format!(
            "{} ({}, IF {:.2})",
            self.title,
            self.venue.as_deref().unwrap_or(""),
            self.effective_impact()
        )
    }
}

/// Supporting documents fetched for one candidate, highest impact first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentContext {
    pub documents: Vec<EnrichmentDocument>,
}

impl EnrichmentContext {
    pub fn new(documents: Vec<EnrichmentDocument>) -> Self {
        Self { documents }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Sum of per-document impact
    pub fn aggregate_impact(&self) -> f64 {
        self.documents.iter().map(EnrichmentDocument::effective_impact).sum()
    }

    pub fn top(&self, n: usize) -> &[EnrichmentDocument] {
        &self.documents[..n.min(self.documents.len())]
    }
}
