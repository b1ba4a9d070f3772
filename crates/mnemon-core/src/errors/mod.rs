//! Error types for every subsystem, rolled up into [`MnemonError`].

mod bundle_error;
mod embedding_error;
mod index_error;
mod policy_error;
mod storage_error;

pub use bundle_error::BundleError;
pub use embedding_error::EmbeddingError;
pub use index_error::IndexError;
pub use policy_error::PolicyError;
pub use storage_error::StorageError;

/// Result alias used across the workspace.
pub type MnemonResult<T> = Result<T, MnemonError>;

/// Top-level error for the Mnemon engine.
#[derive(Debug, thiserror::Error)]
pub enum MnemonError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Bundle(#[from] BundleError),

    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    #[error("operation cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl MnemonError {
    /// Map an error to the process exit code contract:
    /// 0 success, 2 policy-blocked, 3 integrity failure, 4 input invalid,
    /// 5 internal error.
    pub fn exit_code(&self) -> i32 {
        match self {
            MnemonError::Policy(_) => 2,
            MnemonError::Storage(StorageError::KeyMismatch) => 3,
            MnemonError::Storage(StorageError::CorruptionDetected { .. }) => 3,
            MnemonError::Bundle(BundleError::IntegrityMismatch { .. }) => 3,
            MnemonError::Bundle(BundleError::SignatureInvalid { .. }) => 3,
            MnemonError::Storage(StorageError::SecretDetected { .. }) => 4,
            MnemonError::Storage(StorageError::InputTooLarge { .. }) => 4,
            MnemonError::Storage(StorageError::NotFound { .. }) => 4,
            MnemonError::Index(IndexError::DimensionMismatch { .. }) => 4,
            MnemonError::Embedding(EmbeddingError::ModelUnavailable { .. }) => 4,
            MnemonError::Bundle(BundleError::Malformed { .. }) => 4,
            MnemonError::InvalidInput { .. } => 4,
            _ => 5,
        }
    }

    /// A one-line remediation hint, when one is known.
    pub fn remediation(&self) -> Option<String> {
        match self {
            MnemonError::Policy(PolicyError::CommandBlocked { hint, .. }) => Some(hint.clone()),
            MnemonError::Policy(PolicyError::PathDenied { hint, .. }) => Some(hint.clone()),
            MnemonError::Policy(PolicyError::EgressBlocked { .. }) => {
                Some("run `policy trust egress --ttl <minutes>` to authorize egress".to_string())
            }
            MnemonError::Embedding(EmbeddingError::ModelUnavailable { model, path }) => Some(
                format!("place the `{model}` model files under {path}, or set MNEMON_EMBED_MODEL=hashed"),
            ),
            MnemonError::Storage(StorageError::CorruptionDetected { .. }) => {
                Some("run `db-doctor` to rebuild the database".to_string())
            }
            _ => None,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        MnemonError::Internal {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_match_contract() {
        let policy = MnemonError::Policy(PolicyError::CommandBlocked {
            command: "search".into(),
            hint: "policy allow-command search".into(),
        });
        assert_eq!(policy.exit_code(), 2);

        let integrity = MnemonError::Bundle(BundleError::IntegrityMismatch {
            file: "map.csv".into(),
            detail: "checksum".into(),
        });
        assert_eq!(integrity.exit_code(), 3);

        let input = MnemonError::Storage(StorageError::InputTooLarge {
            length: 20_000,
            max: 10_000,
        });
        assert_eq!(input.exit_code(), 4);

        assert_eq!(MnemonError::Cancelled.exit_code(), 5);
    }

    #[test]
    fn blocked_command_hint_surfaces() {
        let err = MnemonError::Policy(PolicyError::CommandBlocked {
            command: "search-code".into(),
            hint: "policy allow-command search-code".into(),
        });
        assert_eq!(
            err.remediation().as_deref(),
            Some("policy allow-command search-code")
        );
    }
}
