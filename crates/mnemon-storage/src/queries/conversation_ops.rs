//! Conversation recording stream. Persisted, listable, not searched.

use std::collections::BTreeMap;

use chrono::Utc;
use rusqlite::{params, Connection};

use mnemon_core::memory::{Conversation, ConversationMessage};
use mnemon_core::MnemonResult;

use crate::to_storage_err;

pub fn record_conversation(
    conn: &Connection,
    assistant_name: &str,
    context: &BTreeMap<String, String>,
    messages: &[ConversationMessage],
    outcomes: &[String],
) -> MnemonResult<i64> {
    let context_json = serde_json::to_string(context).map_err(|e| to_storage_err(e.to_string()))?;
    let messages_json =
        serde_json::to_string(messages).map_err(|e| to_storage_err(e.to_string()))?;
    let outcomes_json =
        serde_json::to_string(outcomes).map_err(|e| to_storage_err(e.to_string()))?;

    conn.execute(
        "INSERT INTO conversations (assistant_name, started_at, context, messages, outcomes)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            assistant_name,
            Utc::now().to_rfc3339(),
            context_json,
            messages_json,
            outcomes_json,
        ],
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(conn.last_insert_rowid())
}

pub fn list_conversations(conn: &Connection, limit: usize) -> MnemonResult<Vec<Conversation>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, assistant_name, started_at, context, messages, outcomes
             FROM conversations ORDER BY id DESC LIMIT ?1",
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
    let rows = stmt
        .query_map(params![limit as i64], |row| {
            let started_at: String = row.get(2)?;
            let context_json: String = row.get(3)?;
            let messages_json: String = row.get(4)?;
            let outcomes_json: String = row.get(5)?;
            Ok(Conversation {
                id: row.get(0)?,
                assistant_name: row.get(1)?,
                started_at: chrono::DateTime::parse_from_rfc3339(&started_at)
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now()),
                context: serde_json::from_str(&context_json).unwrap_or_default(),
                messages: serde_json::from_str(&messages_json).unwrap_or_default(),
                outcomes: serde_json::from_str(&outcomes_json).unwrap_or_default(),
            })
        })
        .map_err(|e| to_storage_err(e.to_string()))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(rows)
}

pub fn count_conversations(conn: &Connection) -> MnemonResult<u64> {
    conn.query_row("SELECT count(*) FROM conversations", [], |row| {
        row.get::<_, i64>(0)
    })
    .map(|n| n as u64)
    .map_err(|e| to_storage_err(e.to_string()))
}
