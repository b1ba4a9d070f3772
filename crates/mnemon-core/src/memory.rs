//! The universal persisted record and its identity rules.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Recognized metadata keys. Anything outside this set is opaque user data.
pub mod meta_keys {
    pub const FILE: &str = "file";
    pub const LANGUAGE: &str = "language";
    pub const LINE_START: &str = "lineStart";
    pub const LINE_END: &str = "lineEnd";
    pub const SYMBOL_NAME: &str = "symbolName";
    pub const SYMBOL_KIND: &str = "symbolKind";
    pub const STRATEGY: &str = "strategy";
}

/// A stored memory. `content_hash` is its stable identity across machines:
/// two memories with the same hash are the same memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    /// Monotonically assigned integer, stable for the life of the database.
    pub id: i64,
    /// UTF-8 text, at most `MAX_CONTENT_CHARS` characters.
    pub content: String,
    /// Free tag classifying origin ("general" by default).
    pub context: String,
    /// Unit kind, e.g. "code", "note", "symbol" ("general" by default).
    pub kind: String,
    /// Ordered free-form tags.
    pub tags: Vec<String>,
    /// Opaque string-keyed mapping; see [`meta_keys`] for recognized keys.
    pub metadata: BTreeMap<String, String>,
    /// SHA-256 over content + canonicalized context, lowercase hex.
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Memory {
    /// Canonical form of a context tag: trimmed, lowercased, empty → "general".
    pub fn canonical_context(context: &str) -> String {
        let c = context.trim().to_lowercase();
        if c.is_empty() {
            "general".to_string()
        } else {
            c
        }
    }

    /// SHA-256 over `content` + "\n" + canonicalized context, lowercase hex.
    pub fn compute_content_hash(content: &str, context: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        hasher.update(b"\n");
        hasher.update(Self::canonical_context(context).as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl PartialEq for Memory {
    fn eq(&self, other: &Self) -> bool {
        self.content_hash == other.content_hash
    }
}

/// Parameters for inserting a memory.
#[derive(Debug, Clone, Default)]
pub struct NewMemory {
    pub content: String,
    pub context: String,
    pub kind: String,
    pub tags: Vec<String>,
    pub metadata: BTreeMap<String, String>,
}

impl NewMemory {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            context: "general".to_string(),
            kind: "general".to_string(),
            tags: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_metadata(mut self, metadata: BTreeMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn content_hash(&self) -> String {
        Memory::compute_content_hash(&self.content, &self.context)
    }
}

/// A recorded free-form interaction stream. Not part of search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: i64,
    pub assistant_name: String,
    pub started_at: DateTime<Utc>,
    pub context: BTreeMap<String, String>,
    pub messages: Vec<ConversationMessage>,
    pub outcomes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: String,
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_canonicalization() {
        assert_eq!(Memory::canonical_context("  General "), "general");
        assert_eq!(Memory::canonical_context(""), "general");
        assert_eq!(Memory::canonical_context("Code-Review"), "code-review");
    }

    #[test]
    fn content_hash_is_stable_under_context_case() {
        let a = Memory::compute_content_hash("hello", "General");
        let b = Memory::compute_content_hash("hello", "general ");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn content_hash_differs_by_context() {
        let a = Memory::compute_content_hash("hello", "general");
        let b = Memory::compute_content_hash("hello", "code");
        assert_ne!(a, b);
    }
}
