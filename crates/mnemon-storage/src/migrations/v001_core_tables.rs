//! v001: memories, memories_fts (external content + triggers), embeddings.

use rusqlite::Connection;

use mnemon_core::errors::MnemonResult;

use crate::to_storage_err;

pub fn migrate(conn: &Connection) -> MnemonResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS memories (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            content      TEXT NOT NULL,
            context      TEXT NOT NULL DEFAULT 'general',
            kind         TEXT NOT NULL DEFAULT 'general',
            tags         TEXT NOT NULL DEFAULT '[]',
            metadata     TEXT NOT NULL DEFAULT '{}',
            content_hash TEXT NOT NULL UNIQUE,
            created_at   TEXT NOT NULL,
            updated_at   TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_memories_kind ON memories(kind);
        CREATE INDEX IF NOT EXISTS idx_memories_context ON memories(context);

        CREATE VIRTUAL TABLE IF NOT EXISTS memories_fts USING fts5(
            content, context, kind, tags,
            content='memories', content_rowid='id'
        );

        CREATE TRIGGER IF NOT EXISTS memories_ai AFTER INSERT ON memories BEGIN
            INSERT INTO memories_fts(rowid, content, context, kind, tags)
            VALUES (new.id, new.content, new.context, new.kind, new.tags);
        END;

        CREATE TRIGGER IF NOT EXISTS memories_ad AFTER DELETE ON memories BEGIN
            INSERT INTO memories_fts(memories_fts, rowid, content, context, kind, tags)
            VALUES ('delete', old.id, old.content, old.context, old.kind, old.tags);
        END;

        CREATE TRIGGER IF NOT EXISTS memories_au AFTER UPDATE ON memories BEGIN
            INSERT INTO memories_fts(memories_fts, rowid, content, context, kind, tags)
            VALUES ('delete', old.id, old.content, old.context, old.kind, old.tags);
            INSERT INTO memories_fts(rowid, content, context, kind, tags)
            VALUES (new.id, new.content, new.context, new.kind, new.tags);
        END;

        CREATE TABLE IF NOT EXISTS embeddings (
            memory_id  INTEGER PRIMARY KEY
                       REFERENCES memories(id) ON DELETE CASCADE,
            dimensions INTEGER NOT NULL,
            vector     BLOB NOT NULL
        );
        ",
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}
