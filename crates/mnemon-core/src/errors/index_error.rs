/// Vector index errors.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("vector has {got} dimensions; the index is fixed at {expected}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("vector backend `{backend}` unavailable: {reason}")]
    BackendUnavailable { backend: String, reason: String },
}
