//! Recommender configuration
//!
//! Loaded once at process start and read-only afterwards. Index
//! construction options are owned by [`EntityStore`](crate::EntityStore),
//! not by this struct.

use crate::error::{Error, Result};
use resrank_scoring::{LanguagePriority, ScoringWeights};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommenderConfig {
    /// Results returned when a request does not specify `top_k`
    pub top_k: usize,
    /// Candidates below this cosine similarity are dropped
    pub similarity_threshold: f32,
    /// Coarse filter retrieves `top_k * over_fetch_factor` hits
    pub over_fetch_factor: usize,
    pub impact_weight: f64,
    pub keyword_weight: f64,
    /// Language class codes (`ko`, `en`, `ja`, `zh`), earliest first
    pub keyword_language_priority: Vec<String>,
    /// Documents fetched per candidate
    pub enrichment_limit: usize,
    /// Documents attached to each result
    pub top_documents: usize,
    /// Generation budget; the completion request is capped at 350 tokens
    pub rationale_max_tokens: u32,
    /// Paragraph length asked of the generator, in characters
    pub rationale_max_chars: usize,
    pub rationale_language: String,
    #[serde(with = "millis")]
    pub embed_timeout: Duration,
    #[serde(with = "millis")]
    pub enrichment_timeout: Duration,
    #[serde(with = "millis")]
    pub rationale_timeout: Duration,
}

impl Default for RecommenderConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            similarity_threshold: 0.3,
            over_fetch_factor: 10,
            impact_weight: 0.2,
            keyword_weight: 0.3,
            keyword_language_priority: vec!["ko".to_string(), "en".to_string()],
            enrichment_limit: 5,
            top_documents: 3,
            rationale_max_tokens: 500,
            rationale_max_chars: 500,
            rationale_language: "English".to_string(),
            embed_timeout: Duration::from_secs(10),
            enrichment_timeout: Duration::from_secs(5),
            rationale_timeout: Duration::from_secs(20),
        }
    }
}

impl RecommenderConfig {
    pub fn validate(&self) -> Result<()> {
        if self.over_fetch_factor == 0 {
            return Err(Error::InvalidConfig("over_fetch_factor must be at least 1".into()));
        }
        if !self.similarity_threshold.is_finite() {
            return Err(Error::InvalidConfig("similarity_threshold must be finite".into()));
        }
        for (name, weight) in [
            ("impact_weight", self.impact_weight),
            ("keyword_weight", self.keyword_weight),
        ] {
            if !weight.is_finite() || weight < 0.0 {
                return Err(Error::InvalidConfig(format!(
                    "{} must be a non-negative number, got {}",
                    name, weight
                )));
            }
        }
        for (name, timeout) in [
            ("embed_timeout", self.embed_timeout),
            ("enrichment_timeout", self.enrichment_timeout),
            ("rationale_timeout", self.rationale_timeout),
        ] {
            if timeout.is_zero() {
                return Err(Error::InvalidConfig(format!("{} must be positive", name)));
            }
        }
        Ok(())
    }

    pub fn scoring_weights(&self) -> ScoringWeights {
        ScoringWeights {
            impact_weight: self.impact_weight,
            keyword_weight: self.keyword_weight,
        }
    }

    /// Parsed language priority; unknown codes are logged and ignored.
    pub fn language_priority(&self) -> LanguagePriority {
        let (priority, unknown) = LanguagePriority::parse(&self.keyword_language_priority.join(","));
        if !unknown.is_empty() {
            warn!(codes = ?unknown, "Ignoring unknown keyword language codes");
        }
        priority
    }

    /// Hits requested from the index for a request of `top_k`
    pub fn fetch_size(&self, top_k: usize) -> usize {
        top_k.saturating_mul(self.over_fetch_factor).max(top_k)
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resrank_scoring::LanguageClass;

    #[test]
    fn test_defaults_are_valid() {
        let config = RecommenderConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.fetch_size(5), 50);
        assert_eq!(config.fetch_size(0), 0);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: RecommenderConfig =
            serde_json::from_str(r#"{"top_k": 3, "rationale_timeout": 1500}"#).unwrap();
        assert_eq!(config.top_k, 3);
        assert_eq!(config.rationale_timeout, Duration::from_millis(1500));
        assert_eq!(config.similarity_threshold, 0.3);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = RecommenderConfig {
            over_fetch_factor: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = RecommenderConfig {
            keyword_weight: -1.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = RecommenderConfig {
            embed_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_language_priority_ignores_unknown() {
        let config = RecommenderConfig {
            keyword_language_priority: vec!["en".into(), "xx".into(), "ja".into()],
            ..Default::default()
        };
        assert_eq!(
            config.language_priority().classes(),
            &[LanguageClass::English, LanguageClass::Japanese]
        );
    }
}
