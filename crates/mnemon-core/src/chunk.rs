//! Indexed units produced by the chunker.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::memory::meta_keys;

/// Closed language set, inferred from file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Typescript,
    Javascript,
    Python,
    Go,
    Java,
    Rust,
    Cpp,
    C,
    Other,
}

impl Language {
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_lowercase();
        match ext.as_str() {
            "ts" | "tsx" | "mts" | "cts" => Language::Typescript,
            "js" | "jsx" | "mjs" | "cjs" => Language::Javascript,
            "py" | "pyi" => Language::Python,
            "go" => Language::Go,
            "java" => Language::Java,
            "rs" => Language::Rust,
            "cpp" | "cc" | "cxx" | "hpp" | "hh" => Language::Cpp,
            "c" | "h" => Language::C,
            _ => Language::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Typescript => "typescript",
            Language::Javascript => "javascript",
            Language::Python => "python",
            Language::Go => "go",
            Language::Java => "java",
            Language::Rust => "rust",
            Language::Cpp => "cpp",
            Language::C => "c",
            Language::Other => "other",
        }
    }
}

/// How a chunk was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkStrategy {
    Ast,
    Fallback,
}

impl ChunkStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkStrategy::Ast => "ast",
            ChunkStrategy::Fallback => "fallback",
        }
    }
}

/// An addressable unit of indexed text: a whole file or one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    /// File path relative to the indexing root.
    pub file: String,
    pub language: Language,
    /// 1-based inclusive.
    pub line_start: u32,
    /// 1-based inclusive.
    pub line_end: u32,
    pub symbol_name: Option<String>,
    pub symbol_kind: Option<String>,
    pub strategy: ChunkStrategy,
}

impl Chunk {
    /// Render the chunk's provenance as a memory metadata map.
    pub fn to_metadata(&self) -> BTreeMap<String, String> {
        let mut m = BTreeMap::new();
        m.insert(meta_keys::FILE.to_string(), self.file.clone());
        m.insert(
            meta_keys::LANGUAGE.to_string(),
            self.language.as_str().to_string(),
        );
        m.insert(meta_keys::LINE_START.to_string(), self.line_start.to_string());
        m.insert(meta_keys::LINE_END.to_string(), self.line_end.to_string());
        if let Some(name) = &self.symbol_name {
            m.insert(meta_keys::SYMBOL_NAME.to_string(), name.clone());
        }
        if let Some(kind) = &self.symbol_kind {
            m.insert(meta_keys::SYMBOL_KIND.to_string(), kind.clone());
        }
        m.insert(
            meta_keys::STRATEGY.to_string(),
            self.strategy.as_str().to_string(),
        );
        m
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_from_extension() {
        assert_eq!(Language::from_path(Path::new("a/b.ts")), Language::Typescript);
        assert_eq!(Language::from_path(Path::new("b.jsx")), Language::Javascript);
        assert_eq!(Language::from_path(Path::new("x.py")), Language::Python);
        assert_eq!(Language::from_path(Path::new("x.md")), Language::Other);
        assert_eq!(Language::from_path(Path::new("Makefile")), Language::Other);
    }

    #[test]
    fn metadata_round_trip_keys() {
        let chunk = Chunk {
            text: "fn x() {}".into(),
            file: "src/lib.rs".into(),
            language: Language::Rust,
            line_start: 1,
            line_end: 1,
            symbol_name: Some("x".into()),
            symbol_kind: Some("function".into()),
            strategy: ChunkStrategy::Ast,
        };
        let meta = chunk.to_metadata();
        assert_eq!(meta.get(meta_keys::FILE).unwrap(), "src/lib.rs");
        assert_eq!(meta.get(meta_keys::STRATEGY).unwrap(), "ast");
        assert_eq!(meta.get(meta_keys::LINE_END).unwrap(), "1");
    }
}
