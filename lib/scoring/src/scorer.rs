//! Candidate Scorer
//!
//! Turns a raw similarity hit into a scored candidate:
//!
//! ```text
//! score = round(max(sim, 0) * 100, 2)     base
//!       + impact_weight  * Σ impact         impact bonus
//!       + keyword_weight * |tokens ∩ kws|   keyword bonus
//! ```
//!
//! Every term is non-negative, so the composite is monotonic in each.

use crate::context::EnrichmentContext;
use crate::keywords::{dedupe_and_order_keywords, LanguagePriority, QueryTokens};
use ahash::AHashSet;
use resrank_core::{EntityId, KeywordSets};
use serde::{Deserialize, Serialize};

/// Weights of the two bonus terms
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    /// Multiplier for the summed impact of enrichment documents
    pub impact_weight: f64,
    /// Bonus per query token found among the entity's keywords
    pub keyword_weight: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            impact_weight: 0.2,
            keyword_weight: 0.3,
        }
    }
}

/// Round half away from zero to two decimals.
#[inline]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Map cosine similarity onto the 0-100 base score.
///
/// Negative similarity is floored to zero before scaling.
#[inline]
pub fn similarity_to_score(similarity: f32) -> f64 {
    round2(f64::from(similarity.max(0.0)) * 100.0)
}

/// `weight` times the number of distinct query tokens that equal one of the
/// entity's keywords, case-insensitively.
pub fn keyword_bonus<'a, I>(tokens: &QueryTokens, keywords: I, weight: f64) -> f64
where
    I: IntoIterator<Item = &'a String>,
{
    let folded: AHashSet<String> = keywords.into_iter().map(|kw| kw.to_lowercase()).collect();
    let overlaps = tokens
        .as_slice()
        .iter()
        .filter(|t| folded.contains(t.as_str()))
        .count();
    overlaps as f64 * weight
}

/// `weight` times the summed impact of the enrichment documents.
#[inline]
pub fn impact_bonus(context: &EnrichmentContext, weight: f64) -> f64 {
    context.aggregate_impact() * weight
}

#[inline]
pub fn compose(base: f64, impact_bonus: f64, keyword_bonus: f64) -> f64 {
    base + impact_bonus + keyword_bonus
}

/// Score terms of one candidate, unrounded
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub base_score: f64,
    pub impact_bonus: f64,
    pub keyword_bonus: f64,
    pub score: f64,
}

/// A candidate after enrichment and scoring, before a rationale is attached.
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub entity_id: EntityId,
    pub name: String,
    /// Raw cosine similarity from the index
    pub similarity: f32,
    pub breakdown: ScoreBreakdown,
    /// Deduplicated, language-ordered primary keywords
    pub primary_keywords: Vec<String>,
    /// Deduplicated, language-ordered secondary keywords
    pub secondary_keywords: Vec<String>,
    pub context: EnrichmentContext,
}

impl ScoredCandidate {
    /// Primary keywords followed by secondary keywords
    pub fn keywords(&self) -> impl Iterator<Item = &String> {
        self.primary_keywords.iter().chain(self.secondary_keywords.iter())
    }
}

/// Combines base similarity, impact and keyword bonuses.
#[derive(Debug, Clone, Default)]
pub struct CandidateScorer {
    weights: ScoringWeights,
    language_priority: LanguagePriority,
}

impl CandidateScorer {
    pub fn new(weights: ScoringWeights, language_priority: LanguagePriority) -> Self {
        Self {
            weights,
            language_priority,
        }
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    pub fn language_priority(&self) -> &LanguagePriority {
        &self.language_priority
    }

    pub fn order_keywords(&self, keywords: &[String]) -> Vec<String> {
        dedupe_and_order_keywords(keywords, &self.language_priority)
    }

    pub fn breakdown(
        &self,
        similarity: f32,
        tokens: &QueryTokens,
        keywords: &KeywordSets,
        context: &EnrichmentContext,
    ) -> ScoreBreakdown {
        let base_score = similarity_to_score(similarity);
        let impact_bonus = impact_bonus(context, self.weights.impact_weight);
        let keyword_bonus = keyword_bonus(tokens, keywords.iter(), self.weights.keyword_weight);
        ScoreBreakdown {
            base_score,
            impact_bonus,
            keyword_bonus,
            score: compose(base_score, impact_bonus, keyword_bonus),
        }
    }

    pub fn score(
        &self,
        entity_id: &EntityId,
        name: &str,
        keywords: &KeywordSets,
        similarity: f32,
        tokens: &QueryTokens,
        context: EnrichmentContext,
    ) -> ScoredCandidate {
        let breakdown = self.breakdown(similarity, tokens, keywords, &context);
        ScoredCandidate {
            entity_id: entity_id.clone(),
            name: name.to_string(),
            similarity,
            breakdown,
            primary_keywords: self.order_keywords(&keywords.primary),
            secondary_keywords: self.order_keywords(&keywords.secondary),
            context,
        }
    }
}
