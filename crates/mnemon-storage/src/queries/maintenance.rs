//! VACUUM, checkpoint, integrity check.

use rusqlite::Connection;

use mnemon_core::MnemonResult;

use crate::to_storage_err;

pub fn full_vacuum(conn: &Connection) -> MnemonResult<()> {
    conn.execute_batch("VACUUM")
        .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}

pub fn wal_checkpoint(conn: &Connection) -> MnemonResult<()> {
    conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE)")
        .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}

/// Run integrity check. Returns true if the database is healthy.
pub fn integrity_check(conn: &Connection) -> MnemonResult<bool> {
    let result: String = conn
        .query_row("PRAGMA integrity_check", [], |row| row.get(0))
        .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(result == "ok")
}
