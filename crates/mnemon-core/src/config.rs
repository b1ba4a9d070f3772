//! Engine configuration. Everything here has a working default; nothing is
//! read from the environment except the embedding model id (see
//! [`crate::constants::EMBED_MODEL_ENV`]).

use serde::{Deserialize, Serialize};

use crate::constants;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MnemonConfig {
    pub search: SearchConfig,
    pub chunker: ChunkerConfig,
    pub embedding: EmbeddingConfig,
    pub store: StoreConfig,
}

impl Default for MnemonConfig {
    fn default() -> Self {
        Self {
            search: SearchConfig::default(),
            chunker: ChunkerConfig::default(),
            embedding: EmbeddingConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Lexical weight in hybrid fusion; vector weight is `1 - alpha`.
    pub alpha: f32,
    /// Each sub-search fetches `k * oversample` candidates before fusion.
    pub oversample: usize,
    /// BM25 per-column weights for (content, context, kind, tags). FTS5
    /// fixes k1 = 1.2 and b = 0.75; column weights are the tunable knob.
    pub bm25_weights: [f64; 4],
    /// Preview length when the caller does not pass one.
    pub default_preview_lines: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            alpha: constants::DEFAULT_ALPHA,
            oversample: constants::HYBRID_OVERSAMPLE,
            bm25_weights: [1.0, 0.5, 0.5, 0.75],
            default_preview_lines: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkerConfig {
    /// Chunks longer than this are split at line boundaries.
    pub max_chunk_lines: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_chunk_lines: constants::DEFAULT_MAX_CHUNK_LINES,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Fixed output dimensionality (pinned per database on first insert).
    pub dimensions: usize,
    /// Model id override; `None` falls back to the environment variable and
    /// then to the deterministic hashed embedder.
    pub model: Option<String>,
    /// L1 embedding cache capacity (entries).
    pub l1_cache_size: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            dimensions: constants::DEFAULT_EMBEDDING_DIM,
            model: None,
            l1_cache_size: 2048,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Maximum characters per memory content.
    pub max_content_chars: usize,
    /// Additional secret-detection regexes, applied on top of the builtins.
    pub extra_secret_patterns: Vec<String>,
    /// Disable the builtin secret patterns (extra patterns still apply).
    pub disable_builtin_secret_patterns: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_content_chars: constants::MAX_CONTENT_CHARS,
            extra_secret_patterns: Vec::new(),
            disable_builtin_secret_patterns: false,
        }
    }
}
