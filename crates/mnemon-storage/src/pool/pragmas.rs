//! Keying and PRAGMA configuration applied to every SQLite connection.
//!
//! The key pragmas must run before any page is read: SQLCipher stretches the
//! passphrase with PBKDF2-HMAC-SHA256 (200k iterations) over the random salt
//! stored in the first page, and authenticates every page with a MAC.
//! WAL mode, NORMAL sync, 5s busy_timeout, foreign_keys ON.

use rusqlite::Connection;

use mnemon_core::constants::KDF_ITERATIONS;
use mnemon_core::errors::{MnemonError, StorageError};

use crate::to_storage_err;

/// Key the pager and verify the key against the on-disk MAC.
/// A first read that fails to authenticate maps to `KeyMismatch`.
pub fn apply_key(conn: &Connection, passphrase: &str) -> Result<(), MnemonError> {
    // The passphrase is hex-derived upstream, so it never contains quotes.
    conn.execute_batch(&format!(
        "
        PRAGMA key = '{passphrase}';
        PRAGMA cipher_kdf_algorithm = PBKDF2_HMAC_SHA256;
        PRAGMA kdf_iter = {KDF_ITERATIONS};
        "
    ))
    .map_err(|e| to_storage_err(format!("keying pager: {e}")))?;

    conn.query_row("SELECT count(*) FROM sqlite_master", [], |row| {
        row.get::<_, i64>(0)
    })
    .map_err(|_| MnemonError::Storage(StorageError::KeyMismatch))?;
    Ok(())
}

/// Apply performance and safety pragmas to a keyed connection.
pub fn apply_pragmas(conn: &Connection) -> Result<(), MnemonError> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 5000;
        PRAGMA foreign_keys = ON;
        ",
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}
