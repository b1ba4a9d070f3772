//! The chunker entry point.

use std::fs;
use std::path::Path;

use tree_sitter::Parser;

use mnemon_core::chunk::{Chunk, ChunkStrategy, Language};
use mnemon_core::config::ChunkerConfig;
use mnemon_core::MnemonResult;

use crate::languages::grammar_for;
use crate::split::enforce_limits;
use crate::symbols::collect_symbols;

pub struct Chunker {
    max_chunk_lines: usize,
}

impl Chunker {
    pub fn new(config: &ChunkerConfig) -> Self {
        Self {
            max_chunk_lines: config.max_chunk_lines,
        }
    }

    /// Chunk a file on disk. `root` anchors the relative `file` field.
    /// Binary files (NUL byte) and empty files produce no chunks.
    pub fn chunk_file(&self, path: &Path, root: &Path) -> MnemonResult<Vec<Chunk>> {
        let raw = fs::read(path)?;
        if raw.contains(&0u8) {
            tracing::debug!(path = %path.display(), "skipping binary file");
            return Ok(Vec::new());
        }
        let text = String::from_utf8_lossy(&raw);

        let rel = path
            .strip_prefix(root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/");
        let language = Language::from_path(path);
        Ok(self.chunk_source(&rel, language, path, &text))
    }

    /// Like [`Chunker::chunk_file`] but without symbol extraction: the file
    /// becomes (size-limited) whole-file fallback chunks.
    pub fn chunk_file_plain(&self, path: &Path, root: &Path) -> MnemonResult<Vec<Chunk>> {
        let raw = fs::read(path)?;
        if raw.contains(&0u8) {
            tracing::debug!(path = %path.display(), "skipping binary file");
            return Ok(Vec::new());
        }
        let text = String::from_utf8_lossy(&raw);
        if text.is_empty() {
            return Ok(Vec::new());
        }

        let rel = path
            .strip_prefix(root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/");
        let language = Language::from_path(path);
        Ok(enforce_limits(
            vec![fallback_chunk(&rel, language, &text)],
            self.max_chunk_lines,
        ))
    }

    /// Chunk in-memory source. Deterministic: identical input yields a
    /// byte-identical chunk sequence.
    pub fn chunk_source(
        &self,
        file: &str,
        language: Language,
        path: &Path,
        text: &str,
    ) -> Vec<Chunk> {
        if text.is_empty() {
            return Vec::new();
        }

        let chunks = match self.ast_chunks(file, language, path, text) {
            Some(chunks) if !chunks.is_empty() => chunks,
            _ => vec![fallback_chunk(file, language, text)],
        };
        enforce_limits(chunks, self.max_chunk_lines)
    }

    /// One chunk per symbol-set node, document order. `None` when no grammar
    /// is registered or parsing fails.
    fn ast_chunks(
        &self,
        file: &str,
        language: Language,
        path: &Path,
        text: &str,
    ) -> Option<Vec<Chunk>> {
        let grammar = grammar_for(path, language)?;
        let mut parser = Parser::new();
        parser.set_language(&grammar).ok()?;
        let tree = parser.parse(text, None)?;

        let lines: Vec<&str> = text.lines().collect();
        let symbols = collect_symbols(tree.root_node(), text, language);

        let chunks = symbols
            .into_iter()
            .filter(|s| s.start_row < lines.len())
            .map(|s| {
                let end = s.end_row.min(lines.len() - 1);
                Chunk {
                    text: lines[s.start_row..=end].join("\n"),
                    file: file.to_string(),
                    language,
                    line_start: (s.start_row + 1) as u32,
                    line_end: (end + 1) as u32,
                    symbol_name: Some(s.name),
                    symbol_kind: Some(s.kind.to_string()),
                    strategy: ChunkStrategy::Ast,
                }
            })
            .collect();
        Some(chunks)
    }
}

/// Whole-file chunk, lines 1..N, no symbol fields.
fn fallback_chunk(file: &str, language: Language, text: &str) -> Chunk {
    let line_count = text.lines().count().max(1);
    Chunk {
        text: text.trim_end_matches('\n').to_string(),
        file: file.to_string(),
        language,
        line_start: 1,
        line_end: line_count as u32,
        symbol_name: None,
        symbol_kind: None,
        strategy: ChunkStrategy::Fallback,
    }
}
