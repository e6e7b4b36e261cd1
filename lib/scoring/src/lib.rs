//! # resrank Scoring
//!
//! Turns similarity hits into explained, ranked recommendations.
//!
//! ## Features
//!
//! - **Keyword handling**: case-insensitive de-duplication and language-priority ordering
//! - **Composite score**: base similarity score plus impact and keyword bonuses
//! - **Rationale**: prompt construction for a text generator and a deterministic fallback
//! - **Explainability**: every result carries the terms that produced its score
//!
//! ## Example
//!
//! ```rust
//! use resrank_core::{EntityId, KeywordSets};
//! use resrank_scoring::{CandidateScorer, EnrichmentContext, QueryTokens};
//!
//! let scorer = CandidateScorer::default();
//! let keywords = KeywordSets::new(vec!["battery".into()], vec![]);
//! let candidate = scorer.score(
//!     &EntityId::from("r1"),
//!     "Dr. Kim",
//!     &keywords,
//!     0.8,
//!     &QueryTokens::parse("battery recycling"),
//!     EnrichmentContext::empty(),
//! );
//! assert_eq!(candidate.breakdown.base_score, 80.0);
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌────────────────┐
//! │  Index hit  │────>│   Scorer    │────>│ ScoredCandidate│
//! │ (sim, row)  │     │ base+bonus  │     │                │
//! └─────────────┘     └─────────────┘     └────────────────┘
//!                            ▲                    │
//!                     ┌─────────────┐     ┌────────────────┐
//!                     │ Enrichment  │     │   Rationale    │
//!                     │  context    │     │ prompt/fallback│
//!                     └─────────────┘     └────────────────┘
//!                                                 │
//!                                         ┌────────────────┐
//!                                         │ Recommendation │
//!                                         └────────────────┘
//! ```

pub mod context;
pub mod explain;
pub mod keywords;
pub mod rationale;
pub mod scorer;

pub use context::{EnrichmentContext, EnrichmentDocument};
pub use explain::{Recommendation, RecommendationStats};
pub use keywords::{dedupe_and_order_keywords, LanguageClass, LanguagePriority, QueryTokens};
pub use rationale::{fallback_rationale, RationalePrompt, RationaleSource};
pub use scorer::{
    compose, impact_bonus, keyword_bonus, round2, similarity_to_score, CandidateScorer,
    ScoreBreakdown, ScoredCandidate, ScoringWeights,
};
