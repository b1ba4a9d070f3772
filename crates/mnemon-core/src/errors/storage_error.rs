/// Storage-layer errors for the encrypted SQLite store.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("database key mismatch: the on-disk MAC did not verify")]
    KeyMismatch,

    #[error("database corruption detected: {details}")]
    CorruptionDetected { details: String },

    #[error("content matched secret pattern `{pattern}`; refusing to store")]
    SecretDetected { pattern: String },

    #[error("content is {length} characters; the limit is {max}")]
    InputTooLarge { length: usize, max: usize },

    #[error("memory {id} not found")]
    NotFound { id: i64 },

    #[error("conflict: {reason}")]
    Conflict { reason: String },

    #[error("migration failed at version {version}: {reason}")]
    MigrationFailed { version: u32, reason: String },

    #[error("SQLite error: {message}")]
    Sqlite { message: String },
}
