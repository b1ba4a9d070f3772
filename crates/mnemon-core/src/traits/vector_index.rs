use crate::errors::MnemonResult;
use crate::models::IndexStats;

/// Query options for [`VectorIndex::query`].
#[derive(Debug, Clone, Copy)]
pub struct QueryOpts {
    pub k: usize,
    /// Minimum similarity; results at or below this are dropped.
    pub threshold: f32,
}

impl QueryOpts {
    pub fn top_k(k: usize) -> Self {
        Self { k, threshold: 0.0 }
    }
}

/// A vector index backend. The in-process flat index is the reference
/// implementation and defines this contract; any native backend must agree
/// with it on the top-K set (ties broken by id ascending).
pub trait VectorIndex: Send {
    /// Idempotent initialization.
    fn init(&mut self) -> MnemonResult<()>;

    fn dimensions(&self) -> usize;

    /// Upsert. Input vectors are normalized by the backend.
    fn add(&mut self, id: i64, vector: &[f32]) -> MnemonResult<()>;

    fn remove(&mut self, id: i64) -> MnemonResult<()>;

    /// At most `k` results with cosine similarity strictly above
    /// `threshold`, sorted by similarity descending then id ascending.
    fn query(&self, vector: &[f32], opts: QueryOpts) -> MnemonResult<Vec<(i64, f32)>>;

    fn stats(&self) -> IndexStats;
}
