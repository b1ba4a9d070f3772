use crate::errors::MnemonResult;

/// Embedding generation provider. Offline-only: implementations must never
/// attempt network access under any configuration.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text into an L2-normalized vector of `dimensions()`.
    fn embed(&self, text: &str) -> MnemonResult<Vec<f32>>;

    /// Embed a batch; equivalent to repeated single calls.
    fn embed_batch(&self, texts: &[String]) -> MnemonResult<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    /// The fixed dimensionality of produced embeddings.
    fn dimensions(&self) -> usize;

    /// Human-readable provider name.
    fn name(&self) -> &str;

    /// Whether this provider can currently produce embeddings.
    fn is_available(&self) -> bool;
}
