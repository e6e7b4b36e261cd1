//! Rationale text for a recommendation
//!
//! Two sources: a prompt handed to an external text generator, and a
//! deterministic template used whenever generation is unavailable or fails.

use crate::keywords::QueryTokens;
use crate::scorer::ScoredCandidate;
use serde::{Deserialize, Serialize};

/// Keywords named in a fallback rationale
const FALLBACK_KEYWORD_LIMIT: usize = 5;

/// Documents summarized in a prompt
const PROMPT_DOCUMENT_LIMIT: usize = 3;

/// Where a rationale came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RationaleSource {
    Generated,
    Fallback,
}

/// Structured input for the text generator.
#[derive(Debug, Clone, PartialEq)]
pub struct RationalePrompt {
    pub query: String,
    pub entity_name: String,
    pub primary_keywords: Vec<String>,
    pub secondary_keywords: Vec<String>,
    /// `title (venue, IF x.xx)` lines, at most three
    pub document_summaries: Vec<String>,
    pub base_score: f64,
    pub impact_bonus: f64,
    pub keyword_bonus: f64,
    /// Language the paragraph should be written in
    pub language: String,
    /// Upper bound on paragraph length, in characters
    pub max_chars: usize,
}

impl RationalePrompt {
    pub fn for_candidate(
        query: &str,
        candidate: &ScoredCandidate,
        language: &str,
        max_chars: usize,
    ) -> Self {
        Self {
            query: query.to_string(),
            entity_name: candidate.name.clone(),
            primary_keywords: candidate.primary_keywords.clone(),
            secondary_keywords: candidate.secondary_keywords.clone(),
            document_summaries: candidate
                .context
                .top(PROMPT_DOCUMENT_LIMIT)
                .iter()
                .map(|d| d.summary())
                .collect(),
            base_score: candidate.breakdown.base_score,
            impact_bonus: candidate.breakdown.impact_bonus,
            keyword_bonus: candidate.breakdown.keyword_bonus,
            language: language.to_string(),
            max_chars,
        }
    }

    pub fn system_message(&self) -> String {
        format!(
            "You are an expert researcher recommendation system. Write only a polite, concise \
             paragraph in {} of at most {} characters.",
            self.language, self.max_chars
        )
    }

    pub fn user_message(&self) -> String {
        format!(
            "You are a researcher recommendation system. Using the information below, write a short \
             natural-language paragraph in {language}. Stay within {max} characters and use plain \
             sentences only: no markdown, lists or special symbols.\n\n\
             User query: {query}\n\
             Researcher: {name}\n\
             Research keywords: {primary}\n\
             Other keywords: {secondary}\n\
             Representative papers: {papers}\n\
             Numeric context (for your judgement only, do not mention any score): \
             base={base:.2}, impact_bonus={impact:.2}, keyword_bonus={keyword:.2}\n\n\
             Guidance: do not mention scores. Explain concretely how the user's request overlaps \
             with the researcher's topics and keywords, add one or two representative results, and \
             avoid needless enumeration.",
            language = self.language,
            max = self.max_chars,
            query = self.query,
            name = self.entity_name,
            primary = join_or_none(&self.primary_keywords),
            secondary = join_or_none(&self.secondary_keywords),
            papers = join_or_none(&self.document_summaries),
            base = self.base_score,
            impact = self.impact_bonus,
            keyword = self.keyword_bonus,
        )
    }
}

fn join_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(", ")
    }
}

/// Deterministic rationale built from the candidate's keywords.
///
/// Names up to five keywords that match a query token (equal or containing
/// it); when none match, the first five keywords; when the entity has no
/// keywords at all, a generic sentence.
pub fn fallback_rationale(candidate: &ScoredCandidate, tokens: &QueryTokens) -> String {
    let matched: Vec<&str> = candidate
        .keywords()
        .filter(|kw| tokens.touches(kw))
        .take(FALLBACK_KEYWORD_LIMIT)
        .map(String::as_str)
        .collect();
    let named: Vec<&str> = if matched.is_empty() {
        candidate
            .keywords()
            .take(FALLBACK_KEYWORD_LIMIT)
            .map(String::as_str)
            .collect()
    } else {
        matched
    };

    if named.is_empty() {
        return format!(
            "{}'s overall research profile is close to your request, although no related \
             keywords were recorded. Recommended on the basis of profile similarity.",
            candidate.name
        );
    }

    format!(
        "{}'s research meets your request on topics such as '{}'. Recommended on the basis of \
         related research keywords and representative work.",
        candidate.name,
        named.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{EnrichmentContext, EnrichmentDocument};
    use crate::scorer::CandidateScorer;
    use resrank_core::{EntityId, KeywordSets};

    fn candidate(primary: &[&str], secondary: &[&str], docs: usize) -> ScoredCandidate {
        let keywords = KeywordSets::new(
            primary.iter().map(|s| s.to_string()).collect(),
            secondary.iter().map(|s| s.to_string()).collect(),
        );
        let context = EnrichmentContext::new(
            (0..docs)
                .map(|i| EnrichmentDocument {
                    id: i.to_string(),
                    title: format!("Paper {}", i),
                    impact: 10.0 - i as f64,
                    keywords: Vec::new(),
                    venue: Some("Joule".into()),
                })
                .collect(),
        );
        CandidateScorer::default().score(
            &EntityId::from("r1"),
            "Dr. Lee",
            &keywords,
            0.8,
            &QueryTokens::parse("battery"),
            context,
        )
    }

    #[test]
    fn test_fallback_names_matching_keywords() {
        let c = candidate(&["sensors", "battery materials", "AI"], &[], 0);
        let text = fallback_rationale(&c, &QueryTokens::parse("battery"));
        assert!(text.contains("battery materials"));
        assert!(!text.contains("sensors"));
    }

    #[test]
    fn test_fallback_uses_first_keywords_when_nothing_matches() {
        let c = candidate(&["a1", "a2", "a3", "a4", "a5", "a6"], &[], 0);
        let text = fallback_rationale(&c, &QueryTokens::parse("zzz"));
        assert!(text.contains("a1, a2, a3, a4, a5"));
        assert!(!text.contains("a6"));
    }

    #[test]
    fn test_fallback_uses_secondary_keywords() {
        let c = candidate(&[], &["patent keyword"], 0);
        let text = fallback_rationale(&c, &QueryTokens::parse("zzz"));
        assert!(text.contains("patent keyword"));
    }

    #[test]
    fn test_fallback_without_keywords_is_non_empty() {
        let c = candidate(&[], &[], 0);
        let text = fallback_rationale(&c, &QueryTokens::parse("battery"));
        assert!(text.starts_with("Dr. Lee"));
    }

    #[test]
    fn test_prompt_contents() {
        let c = candidate(&["battery"], &[], 5);
        let prompt = RationalePrompt::for_candidate("solid-state battery", &c, "English", 500);
        assert_eq!(prompt.document_summaries.len(), 3);

        let user = prompt.user_message();
        assert!(user.contains("User query: solid-state battery"));
        assert!(user.contains("Other keywords: none"));
        assert!(user.contains("Paper 0 (Joule, IF 10.00)"));
        assert!(user.contains("do not mention any score"));
        assert!(prompt.system_message().contains("500 characters"));
    }
}
