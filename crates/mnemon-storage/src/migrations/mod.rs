//! Idempotent, versioned schema migrations recorded in the `meta` table.

mod v001_core_tables;
mod v002_conversations;

use rusqlite::Connection;

use mnemon_core::errors::{MnemonError, MnemonResult, StorageError};

use crate::to_storage_err;

type Migration = (u32, fn(&Connection) -> MnemonResult<()>);

const MIGRATIONS: &[Migration] = &[
    (1, v001_core_tables::migrate),
    (2, v002_conversations::migrate),
];

/// Run all pending migrations. Safe to call on every open.
pub fn run_migrations(conn: &Connection) -> MnemonResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS meta (key TEXT PRIMARY KEY, value TEXT NOT NULL)",
    )
    .map_err(|e| to_storage_err(e.to_string()))?;

    let current = schema_version(conn)?;
    for (version, migrate) in MIGRATIONS {
        if *version <= current {
            continue;
        }
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| to_storage_err(format!("migration begin: {e}")))?;
        migrate(&tx).map_err(|e| {
            MnemonError::Storage(StorageError::MigrationFailed {
                version: *version,
                reason: e.to_string(),
            })
        })?;
        tx.execute(
            "INSERT INTO meta (key, value) VALUES ('schema_version', ?1)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            [version.to_string()],
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
        tx.commit()
            .map_err(|e| to_storage_err(format!("migration commit: {e}")))?;
        tracing::debug!(version, "schema migration applied");
    }
    Ok(())
}

/// Current schema version (0 when the database is fresh).
pub fn schema_version(conn: &Connection) -> MnemonResult<u32> {
    let version: Option<String> = conn
        .query_row(
            "SELECT value FROM meta WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(to_storage_err(other.to_string())),
        })?;
    Ok(version.and_then(|v| v.parse().ok()).unwrap_or(0))
}
