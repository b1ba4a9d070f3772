//! Chunk size enforcement: line-boundary splitting with symbol fields
//! preserved on every piece, plus a hard character bound so every piece
//! stays insertable.

use mnemon_core::chunk::Chunk;
use mnemon_core::constants::MAX_CONTENT_CHARS;

/// Split any chunk exceeding `max_lines` (or the content character bound)
/// at line boundaries. Pieces keep the original symbol fields and strategy.
pub fn enforce_limits(chunks: Vec<Chunk>, max_lines: usize) -> Vec<Chunk> {
    let max_lines = max_lines.max(1);
    let mut out = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        if line_count(&chunk) <= max_lines && chunk.text.chars().count() <= MAX_CONTENT_CHARS {
            out.push(chunk);
            continue;
        }
        split_chunk(chunk, max_lines, &mut out);
    }
    out
}

fn line_count(chunk: &Chunk) -> usize {
    (chunk.line_end - chunk.line_start + 1) as usize
}

fn split_chunk(chunk: Chunk, max_lines: usize, out: &mut Vec<Chunk>) {
    let lines: Vec<&str> = chunk.text.split('\n').collect();
    let mut piece_lines: Vec<String> = Vec::new();
    let mut piece_start = chunk.line_start;
    let mut piece_chars = 0usize;
    let mut row = chunk.line_start;

    let flush = |piece_lines: &mut Vec<String>, piece_start: u32, row: u32, out: &mut Vec<Chunk>| {
        if piece_lines.is_empty() {
            return;
        }
        out.push(Chunk {
            text: piece_lines.join("\n"),
            file: chunk.file.clone(),
            language: chunk.language,
            line_start: piece_start,
            line_end: row - 1,
            symbol_name: chunk.symbol_name.clone(),
            symbol_kind: chunk.symbol_kind.clone(),
            strategy: chunk.strategy,
        });
        piece_lines.clear();
    };

    for line in lines {
        let line = clamp_line(line);
        let line_chars = line.chars().count();
        let over_lines = piece_lines.len() >= max_lines;
        let over_chars = !piece_lines.is_empty()
            && piece_chars + line_chars + 1 > MAX_CONTENT_CHARS;
        if over_lines || over_chars {
            flush(&mut piece_lines, piece_start, row, out);
            piece_start = row;
            piece_chars = 0;
        }
        piece_chars += line_chars + 1;
        piece_lines.push(line);
        row += 1;
    }
    flush(&mut piece_lines, piece_start, row, out);
}

/// A single line longer than the content bound cannot be split at a line
/// boundary; it is truncated deterministically instead.
fn clamp_line(line: &str) -> String {
    if line.chars().count() <= MAX_CONTENT_CHARS {
        line.to_string()
    } else {
        line.chars().take(MAX_CONTENT_CHARS - 1).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnemon_core::chunk::{ChunkStrategy, Language};

    fn chunk_of(lines: usize) -> Chunk {
        let text: Vec<String> = (0..lines).map(|i| format!("line {i}")).collect();
        Chunk {
            text: text.join("\n"),
            file: "x.ts".into(),
            language: Language::Typescript,
            line_start: 1,
            line_end: lines as u32,
            symbol_name: Some("big".into()),
            symbol_kind: Some("function".into()),
            strategy: ChunkStrategy::Ast,
        }
    }

    #[test]
    fn small_chunk_passes_through() {
        let out = enforce_limits(vec![chunk_of(10)], 400);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].line_end, 10);
    }

    #[test]
    fn oversized_chunk_splits_preserving_symbol() {
        let out = enforce_limits(vec![chunk_of(1000)], 400);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].line_start, 1);
        assert_eq!(out[0].line_end, 400);
        assert_eq!(out[1].line_start, 401);
        assert_eq!(out[2].line_end, 1000);
        for piece in &out {
            assert_eq!(piece.symbol_name.as_deref(), Some("big"));
            assert_eq!(piece.strategy, ChunkStrategy::Ast);
        }
    }

    #[test]
    fn pieces_reassemble_to_original_text() {
        let original = chunk_of(1000);
        let out = enforce_limits(vec![original.clone()], 400);
        let rejoined: Vec<String> = out.iter().map(|c| c.text.clone()).collect();
        assert_eq!(rejoined.join("\n"), original.text);
    }

    #[test]
    fn splitting_is_deterministic() {
        let a = enforce_limits(vec![chunk_of(987)], 123);
        let b = enforce_limits(vec![chunk_of(987)], 123);
        assert_eq!(a, b);
    }
}
