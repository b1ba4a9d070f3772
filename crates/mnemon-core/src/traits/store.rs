use crate::errors::MnemonResult;
use crate::memory::Memory;

/// Read-side storage surface the search engine depends on.
pub trait MemoryReader {
    /// BM25-ranked full-text search. Returns `(id, raw_bm25_score)` pairs,
    /// best first; scores are positive (higher is better).
    fn fts_search(&self, query: &str, k: usize) -> MnemonResult<Vec<(i64, f64)>>;

    fn get_memory(&self, id: i64) -> MnemonResult<Option<Memory>>;
}
