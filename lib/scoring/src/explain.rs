//! Explained recommendation output
//!
//! The public result shape: final score plus each term that produced it,
//! the keywords used, supporting documents and a rationale.

use crate::context::EnrichmentDocument;
use crate::rationale::RationaleSource;
use crate::scorer::{round2, ScoredCandidate};
use resrank_core::EntityId;
use serde::{Deserialize, Serialize};

/// One ranked recommendation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub entity_id: EntityId,
    pub name: String,
    /// Composite score, rounded to two decimals
    pub score: f64,
    pub base_score: f64,
    pub impact_bonus: f64,
    pub keyword_bonus: f64,
    /// Raw cosine similarity from the coarse filter
    pub similarity: f32,
    pub primary_keywords: Vec<String>,
    pub secondary_keywords: Vec<String>,
    pub rationale: String,
    pub rationale_source: RationaleSource,
    pub top_documents: Vec<EnrichmentDocument>,
    /// Ids of every enrichment document consulted
    pub references: Vec<String>,
}

impl Recommendation {
    pub fn from_candidate(
        candidate: ScoredCandidate,
        rationale: String,
        rationale_source: RationaleSource,
        top_documents: usize,
    ) -> Self {
        let b = candidate.breakdown;
        let references = candidate.context.documents.iter().map(|d| d.id.clone()).collect();
        let top_documents = candidate.context.top(top_documents).to_vec();
        Self {
            entity_id: candidate.entity_id,
            name: candidate.name,
            score: round2(b.score),
            base_score: round2(b.base_score),
            impact_bonus: round2(b.impact_bonus),
            keyword_bonus: round2(b.keyword_bonus),
            similarity: candidate.similarity,
            primary_keywords: candidate.primary_keywords,
            secondary_keywords: candidate.secondary_keywords,
            rationale,
            rationale_source,
            top_documents,
            references,
        }
    }
}

/// Summary statistics for one recommendation request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecommendationStats {
    /// Hits returned by the coarse filter (before the threshold)
    pub candidates_count: usize,
    /// Hits at or above the similarity threshold
    pub eligible_count: usize,
    pub results_count: usize,
    pub avg_score: f64,
    pub best_score: f64,
    pub fallback_rationales: usize,
}

impl RecommendationStats {
    /// Compute stats from results sorted best first
    pub fn compute(results: &[Recommendation], candidates_count: usize, eligible_count: usize) -> Self {
        if results.is_empty() {
            return Self {
                candidates_count,
                eligible_count,
                results_count: 0,
                avg_score: 0.0,
                best_score: 0.0,
                fallback_rationales: 0,
            };
        }

        let avg_score = results.iter().map(|r| r.score).sum::<f64>() / results.len() as f64;
        Self {
            candidates_count,
            eligible_count,
            results_count: results.len(),
            avg_score,
            best_score: results[0].score,
            fallback_rationales: results
                .iter()
                .filter(|r| r.rationale_source == RationaleSource::Fallback)
                .count(),
        }
    }
}
