//! Query tokenization and keyword ordering
//!
//! Keywords arrive in several scripts (Korean and English in the default
//! deployment). Display order follows a configured language priority while
//! matching is always case-insensitive.

use ahash::AHashSet;
use serde::{Deserialize, Serialize};

/// Script class a keyword can be assigned to for ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LanguageClass {
    /// Contains at least one Hangul syllable
    Korean,
    /// Pure ASCII
    English,
    /// Contains hiragana or katakana
    Japanese,
    /// Contains a CJK unified ideograph
    Chinese,
}

impl LanguageClass {
    /// Parse an ISO-639-1 style code (`ko`, `en`, `ja`, `zh`)
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_lowercase().as_str() {
            "ko" | "kr" => Some(LanguageClass::Korean),
            "en" => Some(LanguageClass::English),
            "ja" | "jp" => Some(LanguageClass::Japanese),
            "zh" | "cn" => Some(LanguageClass::Chinese),
            _ => None,
        }
    }

    pub fn matches(&self, word: &str) -> bool {
        match self {
            LanguageClass::Korean => word.chars().any(|c| ('가'..='힣').contains(&c)),
            LanguageClass::English => word.is_ascii(),
            LanguageClass::Japanese => word
                .chars()
                .any(|c| ('\u{3040}'..='\u{30FF}').contains(&c)),
            LanguageClass::Chinese => word
                .chars()
                .any(|c| ('\u{4E00}'..='\u{9FFF}').contains(&c)),
        }
    }
}

/// Ordered list of language classes; earlier classes sort first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguagePriority(Vec<LanguageClass>);

impl Default for LanguagePriority {
    fn default() -> Self {
        Self(vec![LanguageClass::Korean, LanguageClass::English])
    }
}

impl LanguagePriority {
    pub fn new(classes: Vec<LanguageClass>) -> Self {
        if classes.is_empty() {
            return Self::default();
        }
        Self(classes)
    }

    /// Parse a comma-separated code list such as `"ko,en"`.
    ///
    /// Returns the priority plus any codes that were not recognized.
    pub fn parse(codes: &str) -> (Self, Vec<String>) {
        let mut classes = Vec::new();
        let mut unknown = Vec::new();
        for code in codes.split(',').map(str::trim).filter(|c| !c.is_empty()) {
            match LanguageClass::from_code(code) {
                Some(class) if !classes.contains(&class) => classes.push(class),
                Some(_) => {}
                None => unknown.push(code.to_string()),
            }
        }
        (Self::new(classes), unknown)
    }

    pub fn classes(&self) -> &[LanguageClass] {
        &self.0
    }

    /// Index of the first matching class, or `len()` when none match.
    pub fn rank(&self, word: &str) -> usize {
        self.0
            .iter()
            .position(|class| class.matches(word))
            .unwrap_or(self.0.len())
    }
}

/// Distinct, case-folded tokens of a query, in first-seen order.
///
/// The query is split on whitespace and commas.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryTokens(Vec<String>);

impl QueryTokens {
    pub fn parse(query: &str) -> Self {
        let mut seen = AHashSet::new();
        let tokens = query
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
            .filter(|t| seen.insert(t.clone()))
            .collect();
        Self(tokens)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when the keyword equals a token or contains one (case-insensitive).
    pub fn touches(&self, keyword: &str) -> bool {
        let lower = keyword.to_lowercase();
        self.0.iter().any(|t| lower == *t || lower.contains(t.as_str()))
    }
}

/// Case-insensitive de-duplication keeping the first casing, then a stable
/// sort by language priority.
pub fn dedupe_and_order_keywords(keywords: &[String], priority: &LanguagePriority) -> Vec<String> {
    let mut seen = AHashSet::new();
    let mut result: Vec<String> = keywords
        .iter()
        .map(|kw| kw.trim())
        .filter(|kw| !kw.is_empty() && seen.insert(kw.to_lowercase()))
        .map(str::to_string)
        .collect();
    result.sort_by_key(|kw| priority.rank(kw));
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_query_tokens_split_and_fold() {
        let tokens = QueryTokens::parse("Battery,  AI battery,ai\tSensor");
        assert_eq!(tokens.as_slice(), &strings(&["battery", "ai", "sensor"])[..]);
    }

    #[test]
    fn test_query_tokens_empty() {
        assert!(QueryTokens::parse(" , ,, ").is_empty());
    }

    #[test]
    fn test_dedupe_keeps_first_casing() {
        let out = dedupe_and_order_keywords(
            &strings(&["Deep Learning", "deep learning", "DEEP LEARNING", "  "]),
            &LanguagePriority::default(),
        );
        assert_eq!(out, strings(&["Deep Learning"]));
    }

    #[test]
    fn test_korean_sorts_before_english() {
        let out = dedupe_and_order_keywords(
            &strings(&["battery", "배터리", "ÉCOLE", "sensor", "센서"]),
            &LanguagePriority::default(),
        );
        // Non-ASCII Latin matches neither class and goes last
        assert_eq!(out, strings(&["배터리", "센서", "battery", "sensor", "ÉCOLE"]));
    }

    #[test]
    fn test_english_first_priority() {
        let (priority, unknown) = LanguagePriority::parse("en, ko, xx");
        assert_eq!(unknown, strings(&["xx"]));
        let out = dedupe_and_order_keywords(&strings(&["배터리", "battery"]), &priority);
        assert_eq!(out, strings(&["battery", "배터리"]));
    }

    #[test]
    fn test_empty_priority_defaults() {
        let (priority, _) = LanguagePriority::parse("");
        assert_eq!(priority, LanguagePriority::default());
    }

    #[test]
    fn test_touches_substring() {
        let tokens = QueryTokens::parse("battery");
        assert!(tokens.touches("Battery Materials"));
        assert!(!tokens.touches("Sensors"));
    }
}
