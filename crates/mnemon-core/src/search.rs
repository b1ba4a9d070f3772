//! Search request/response types shared between retrieval and the engine.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    Lexical,
    Vector,
    #[default]
    Hybrid,
}

impl SearchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMode::Lexical => "lexical",
            SearchMode::Vector => "vector",
            SearchMode::Hybrid => "hybrid",
        }
    }
}

/// Post-fusion result filters, matched against memory metadata.
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    /// Glob over the `file` metadata key.
    pub path: Option<String>,
    /// Exact match on the `language` metadata key.
    pub language: Option<String>,
    /// Substring match on the `symbolName` metadata key.
    pub symbol: Option<String>,
}

impl SearchFilters {
    pub fn is_empty(&self) -> bool {
        self.path.is_none() && self.language.is_none() && self.symbol.is_none()
    }
}

/// One ranked search hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: i64,
    /// Fused score (or the single-mode normalized score).
    pub score: f32,
    /// Normalized lexical component, when the id appeared in the BM25 list.
    pub lexical: Option<f32>,
    /// Normalized vector component, when the id appeared in the vector list.
    pub vector: Option<f32>,
    pub context: String,
    pub kind: String,
    /// Up to `preview_lines` lines with matched terms marked `«term»`.
    pub preview: String,
    pub metadata: BTreeMap<String, String>,
}

/// Per-candidate component scores recorded under `--trace`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEntry {
    pub id: i64,
    pub lexical_raw: Option<f32>,
    pub lexical_norm: Option<f32>,
    pub vector_similarity: Option<f32>,
    pub fused: f32,
}
