//! # mnemon-chunker
//!
//! Transforms a source file into an ordered sequence of symbol chunks,
//! using tree-sitter when a grammar is registered for the file's language
//! and a whole-file fallback otherwise. Chunk sequences are byte-identical
//! for identical input.

mod chunker;
mod languages;
mod split;
mod symbols;

pub use chunker::Chunker;
