//! Insert, get, update, delete for memories.

use std::collections::BTreeMap;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use mnemon_core::memory::{Memory, NewMemory};
use mnemon_core::MnemonResult;

use crate::to_storage_err;

/// Insert a memory, idempotently. On a `content_hash` collision the existing
/// id is returned with `created = false`. Wrapped in a transaction so the
/// row and its FTS entry are all-or-nothing.
pub fn insert_memory(conn: &Connection, new: &NewMemory) -> MnemonResult<(i64, bool)> {
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| to_storage_err(format!("insert_memory begin: {e}")))?;

    let result = insert_memory_inner(&tx, new);
    match result {
        Ok(pair) => {
            tx.commit()
                .map_err(|e| to_storage_err(format!("insert_memory commit: {e}")))?;
            Ok(pair)
        }
        Err(e) => {
            let _ = tx.rollback();
            Err(e)
        }
    }
}

pub(crate) fn insert_memory_inner(
    conn: &Connection,
    new: &NewMemory,
) -> MnemonResult<(i64, bool)> {
    let hash = new.content_hash();
    if let Some(existing) = id_by_hash(conn, &hash)? {
        return Ok((existing, false));
    }

    let now = Utc::now().to_rfc3339();
    let tags_json = serde_json::to_string(&new.tags).map_err(|e| to_storage_err(e.to_string()))?;
    let metadata_json =
        serde_json::to_string(&new.metadata).map_err(|e| to_storage_err(e.to_string()))?;

    conn.execute(
        "INSERT INTO memories (content, context, kind, tags, metadata, content_hash, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
        params![
            new.content,
            Memory::canonical_context(&new.context),
            new.kind,
            tags_json,
            metadata_json,
            hash,
            now,
        ],
    )
    .map_err(|e| to_storage_err(e.to_string()))?;

    Ok((conn.last_insert_rowid(), true))
}

pub fn id_by_hash(conn: &Connection, content_hash: &str) -> MnemonResult<Option<i64>> {
    conn.query_row(
        "SELECT id FROM memories WHERE content_hash = ?1",
        params![content_hash],
        |row| row.get(0),
    )
    .optional()
    .map_err(|e| to_storage_err(e.to_string()))
}

pub fn get_memory(conn: &Connection, id: i64) -> MnemonResult<Option<Memory>> {
    let row = conn
        .query_row(
            "SELECT id, content, context, kind, tags, metadata, content_hash, created_at, updated_at
             FROM memories WHERE id = ?1",
            params![id],
            row_to_memory,
        )
        .optional()
        .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(row)
}

pub fn get_memory_by_hash(conn: &Connection, content_hash: &str) -> MnemonResult<Option<Memory>> {
    let row = conn
        .query_row(
            "SELECT id, content, context, kind, tags, metadata, content_hash, created_at, updated_at
             FROM memories WHERE content_hash = ?1",
            params![content_hash],
            row_to_memory,
        )
        .optional()
        .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(row)
}

/// Replace tags and metadata in place (reindex refresh, import merge).
pub fn update_tags_metadata(
    conn: &Connection,
    id: i64,
    tags: &[String],
    metadata: &BTreeMap<String, String>,
) -> MnemonResult<()> {
    let tags_json = serde_json::to_string(tags).map_err(|e| to_storage_err(e.to_string()))?;
    let metadata_json =
        serde_json::to_string(metadata).map_err(|e| to_storage_err(e.to_string()))?;
    let rows = conn
        .execute(
            "UPDATE memories SET tags = ?2, metadata = ?3, updated_at = ?4 WHERE id = ?1",
            params![id, tags_json, metadata_json, Utc::now().to_rfc3339()],
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
    if rows == 0 {
        return Err(mnemon_core::errors::StorageError::NotFound { id }.into());
    }
    Ok(())
}

pub fn delete_memory(conn: &Connection, id: i64) -> MnemonResult<()> {
    conn.execute("DELETE FROM memories WHERE id = ?1", params![id])
        .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}

/// Memories sourced from a given file path: `(id, content_hash)` pairs.
pub fn memories_for_file(conn: &Connection, file: &str) -> MnemonResult<Vec<(i64, String)>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, content_hash FROM memories
             WHERE json_extract(metadata, '$.file') = ?1
             ORDER BY id",
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
    let rows = stmt
        .query_map(params![file], |row| Ok((row.get(0)?, row.get(1)?)))
        .map_err(|e| to_storage_err(e.to_string()))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(rows)
}

/// All memories of the given kinds (or all when `kinds` is `None`), id order.
pub fn memories_by_kinds(
    conn: &Connection,
    kinds: Option<&[&str]>,
) -> MnemonResult<Vec<Memory>> {
    let mut out = Vec::new();
    match kinds {
        None => {
            let mut stmt = conn
                .prepare(
                    "SELECT id, content, context, kind, tags, metadata, content_hash, created_at, updated_at
                     FROM memories ORDER BY id",
                )
                .map_err(|e| to_storage_err(e.to_string()))?;
            let rows = stmt
                .query_map([], row_to_memory)
                .map_err(|e| to_storage_err(e.to_string()))?;
            for row in rows {
                out.push(row.map_err(|e| to_storage_err(e.to_string()))?);
            }
        }
        Some(kinds) => {
            for kind in kinds {
                let mut stmt = conn
                    .prepare(
                        "SELECT id, content, context, kind, tags, metadata, content_hash, created_at, updated_at
                         FROM memories WHERE kind = ?1 ORDER BY id",
                    )
                    .map_err(|e| to_storage_err(e.to_string()))?;
                let rows = stmt
                    .query_map(params![kind], row_to_memory)
                    .map_err(|e| to_storage_err(e.to_string()))?;
                for row in rows {
                    out.push(row.map_err(|e| to_storage_err(e.to_string()))?);
                }
            }
            out.sort_by_key(|m| m.id);
        }
    }
    Ok(out)
}

pub fn count_memories(conn: &Connection) -> MnemonResult<u64> {
    conn.query_row("SELECT count(*) FROM memories", [], |row| {
        row.get::<_, i64>(0)
    })
    .map(|n| n as u64)
    .map_err(|e| to_storage_err(e.to_string()))
}

pub fn count_by_kind(conn: &Connection) -> MnemonResult<Vec<(String, u64)>> {
    let mut stmt = conn
        .prepare("SELECT kind, count(*) FROM memories GROUP BY kind ORDER BY kind")
        .map_err(|e| to_storage_err(e.to_string()))?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get::<_, i64>(1)? as u64)))
        .map_err(|e| to_storage_err(e.to_string()))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(rows)
}

/// Parse a full memory row.
pub(crate) fn row_to_memory(row: &rusqlite::Row<'_>) -> rusqlite::Result<Memory> {
    let tags_json: String = row.get(4)?;
    let metadata_json: String = row.get(5)?;
    let created_at: String = row.get(7)?;
    let updated_at: String = row.get(8)?;

    Ok(Memory {
        id: row.get(0)?,
        content: row.get(1)?,
        context: row.get(2)?,
        kind: row.get(3)?,
        tags: serde_json::from_str(&tags_json).unwrap_or_default(),
        metadata: serde_json::from_str(&metadata_json).unwrap_or_default(),
        content_hash: row.get(6)?,
        created_at: parse_rfc3339(&created_at),
        updated_at: parse_rfc3339(&updated_at),
    })
}

fn parse_rfc3339(s: &str) -> chrono::DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
