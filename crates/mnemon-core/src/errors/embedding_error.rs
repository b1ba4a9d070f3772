/// Embedding adapter errors.
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("embedding model `{model}` unavailable under {path}")]
    ModelUnavailable { model: String, path: String },

    #[error("embedding inference failed: {reason}")]
    InferenceFailed { reason: String },
}
