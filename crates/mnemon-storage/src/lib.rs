//! # mnemon-storage
//!
//! Encrypted single-file SQLite persistence for the Mnemon engine:
//! SQLCipher-keyed pager, exclusive writer lock, versioned migrations,
//! content-addressed memory storage with FTS5, embedding blobs, secret
//! scanning, the file digest cache, and maintenance (gc / doctor).

pub mod crypto;
pub mod digest_cache;
pub mod lock;
pub mod migrations;
pub mod pool;
pub mod queries;
pub mod recovery;
pub mod retry;
pub mod secret_scan;
pub mod store;

pub use crypto::PassphraseSource;
pub use digest_cache::{DigestCache, DigestEntry};
pub use store::Store;

use mnemon_core::errors::{MnemonError, StorageError};

/// Wrap a low-level SQLite message into the storage error kind. Corruption
/// messages get their own kind so callers route to `db-doctor`.
pub(crate) fn to_storage_err(message: impl Into<String>) -> MnemonError {
    let message = message.into();
    let lowered = message.to_lowercase();
    if lowered.contains("malformed") || lowered.contains("corrupt") {
        return MnemonError::Storage(StorageError::CorruptionDetected { details: message });
    }
    MnemonError::Storage(StorageError::Sqlite { message })
}
