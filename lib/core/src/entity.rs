use serde::{Deserialize, Serialize};
use crate::vector::Vector;

/// Stable identifier of an entity (a researcher in the default deployment).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    #[inline]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        EntityId(s)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        EntityId(s.to_string())
    }
}

impl From<u64> for EntityId {
    fn from(i: u64) -> Self {
        EntityId(i.to_string())
    }
}

/// The two keyword collections attached to an entity.
///
/// `primary` holds research keywords (thesis keywords in the default
/// deployment), `secondary` holds keywords of other outputs such as patents.
/// Blank entries and exact duplicates are dropped on construction; the
/// case-insensitive, language-ordered view used for scoring is computed per
/// request by the scorer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "KeywordLists")]
pub struct KeywordSets {
    pub primary: Vec<String>,
    pub secondary: Vec<String>,
}

/// Wire form of [`KeywordSets`]; deserialization goes through `KeywordSets::new`.
#[derive(Deserialize)]
struct KeywordLists {
    #[serde(default)]
    primary: Vec<String>,
    #[serde(default)]
    secondary: Vec<String>,
}

impl From<KeywordLists> for KeywordSets {
    fn from(lists: KeywordLists) -> Self {
        KeywordSets::new(lists.primary, lists.secondary)
    }
}

impl KeywordSets {
    pub fn new(primary: Vec<String>, secondary: Vec<String>) -> Self {
        Self {
            primary: dedupe_exact(primary),
            secondary: dedupe_exact(secondary),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.primary.is_empty() && self.secondary.is_empty()
    }

    /// Primary keywords followed by secondary keywords.
    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.primary.iter().chain(self.secondary.iter())
    }
}

fn dedupe_exact(keywords: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(keywords.len());
    for kw in keywords {
        let trimmed = kw.trim();
        if trimmed.is_empty() || out.iter().any(|seen| seen == trimmed) {
            continue;
        }
        out.push(trimmed.to_string());
    }
    out
}

/// An entity loaded once at startup and read-only afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityRecord {
    pub id: EntityId,
    pub display_name: String,
    /// Raw embedding as stored; the index keeps its own normalized copy.
    pub embedding: Vector,
    #[serde(default)]
    pub keywords: KeywordSets,
}

impl EntityRecord {
    #[inline]
    #[must_use]
    pub fn new(
        id: impl Into<EntityId>,
        display_name: impl Into<String>,
        embedding: Vector,
        keywords: KeywordSets,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            embedding,
            keywords,
        }
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.embedding.dim()
    }
}
