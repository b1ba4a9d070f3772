//! v002: conversation recording stream.

use rusqlite::Connection;

use mnemon_core::errors::MnemonResult;

use crate::to_storage_err;

pub fn migrate(conn: &Connection) -> MnemonResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS conversations (
            id             INTEGER PRIMARY KEY AUTOINCREMENT,
            assistant_name TEXT NOT NULL,
            started_at     TEXT NOT NULL,
            context        TEXT NOT NULL DEFAULT '{}',
            messages       TEXT NOT NULL DEFAULT '[]',
            outcomes       TEXT NOT NULL DEFAULT '[]'
        );

        CREATE INDEX IF NOT EXISTS idx_conversations_started
            ON conversations(started_at);
        ",
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}
