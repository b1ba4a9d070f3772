//! FTS5 full-text search. FTS5's BM25 uses k1 = 1.2 and b = 0.75; the
//! tunable knob is the per-column weight vector.

use rusqlite::Connection;

use mnemon_core::MnemonResult;

use crate::to_storage_err;

/// BM25-ranked search over (content, context, kind, tags).
/// Returns `(id, score)` pairs, best first; scores positive, higher better.
pub fn fts_search(
    conn: &Connection,
    query: &str,
    k: usize,
    weights: &[f64; 4],
) -> MnemonResult<Vec<(i64, f64)>> {
    let Some(expr) = fts_match_expr(query) else {
        return Ok(Vec::new());
    };

    let mut stmt = conn
        .prepare(
            "SELECT rowid, bm25(memories_fts, ?2, ?3, ?4, ?5) AS score
             FROM memories_fts
             WHERE memories_fts MATCH ?1
             ORDER BY score
             LIMIT ?6",
        )
        .map_err(|e| to_storage_err(e.to_string()))?;

    let rows = stmt
        .query_map(
            rusqlite::params![expr, weights[0], weights[1], weights[2], weights[3], k as i64],
            |row| {
                let id: i64 = row.get(0)?;
                let score: f64 = row.get(1)?;
                Ok((id, score))
            },
        )
        .map_err(|e| to_storage_err(e.to_string()))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| to_storage_err(e.to_string()))?;

    // bm25() reports better matches as more negative; flip the sign so
    // callers see positive, descending scores.
    Ok(rows.into_iter().map(|(id, s)| (id, -s)).collect())
}

/// Build a safe FTS5 MATCH expression: each alphanumeric term quoted and
/// OR-joined. Returns `None` when the query holds no searchable terms.
pub fn fts_match_expr(query: &str) -> Option<String> {
    let terms: Vec<String> = query
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|t| !t.is_empty())
        .map(|t| format!("\"{t}\""))
        .collect();
    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" OR "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_expr_quotes_and_joins() {
        assert_eq!(
            fts_match_expr("Foo bar-baz").as_deref(),
            Some("\"Foo\" OR \"bar\" OR \"baz\"")
        );
    }

    #[test]
    fn match_expr_strips_fts_syntax() {
        assert_eq!(
            fts_match_expr("NEAR(\"a\" OR *)").as_deref(),
            Some("\"NEAR\" OR \"a\" OR \"OR\"")
        );
        assert!(fts_match_expr("  **  ").is_none());
    }
}
