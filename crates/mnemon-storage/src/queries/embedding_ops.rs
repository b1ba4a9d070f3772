//! Embedding blob storage. One embedding per memory; the dimension is
//! pinned per database by the first recorded vector.

use rusqlite::{params, Connection, OptionalExtension};

use mnemon_core::errors::IndexError;
use mnemon_core::MnemonResult;

use crate::to_storage_err;

/// Upsert the embedding for a memory. Fails with `DimensionMismatch` when a
/// dimension is already pinned and the vector disagrees.
pub fn put_embedding(conn: &Connection, memory_id: i64, vector: &[f32]) -> MnemonResult<()> {
    let dims = vector.len();
    match pinned_dimension(conn)? {
        Some(pinned) if pinned != dims => {
            return Err(IndexError::DimensionMismatch {
                expected: pinned,
                got: dims,
            }
            .into());
        }
        Some(_) => {}
        None => {
            conn.execute(
                "INSERT INTO meta (key, value) VALUES ('embedding_dim', ?1)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![dims.to_string()],
            )
            .map_err(|e| to_storage_err(e.to_string()))?;
        }
    }

    conn.execute(
        "INSERT INTO embeddings (memory_id, dimensions, vector)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(memory_id) DO UPDATE SET
            dimensions = excluded.dimensions,
            vector = excluded.vector",
        params![memory_id, dims as i64, f32_vec_to_bytes(vector)],
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}

pub fn get_embedding(conn: &Connection, memory_id: i64) -> MnemonResult<Option<Vec<f32>>> {
    let row: Option<(Vec<u8>, i64)> = conn
        .query_row(
            "SELECT vector, dimensions FROM embeddings WHERE memory_id = ?1",
            params![memory_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()
        .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(row.map(|(blob, dims)| bytes_to_f32_vec(&blob, dims as usize)))
}

/// All embeddings in memory-id order, for index rebuilds and export.
pub fn all_embeddings(conn: &Connection) -> MnemonResult<Vec<(i64, Vec<f32>)>> {
    let mut stmt = conn
        .prepare("SELECT memory_id, vector, dimensions FROM embeddings ORDER BY memory_id")
        .map_err(|e| to_storage_err(e.to_string()))?;
    let rows = stmt
        .query_map([], |row| {
            let id: i64 = row.get(0)?;
            let blob: Vec<u8> = row.get(1)?;
            let dims: i64 = row.get(2)?;
            Ok((id, blob, dims))
        })
        .map_err(|e| to_storage_err(e.to_string()))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(rows
        .into_iter()
        .map(|(id, blob, dims)| (id, bytes_to_f32_vec(&blob, dims as usize)))
        .collect())
}

/// The database's pinned embedding dimension, if any vector was recorded.
pub fn pinned_dimension(conn: &Connection) -> MnemonResult<Option<usize>> {
    let value: Option<String> = conn
        .query_row(
            "SELECT value FROM meta WHERE key = 'embedding_dim'",
            [],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(value.and_then(|v| v.parse().ok()))
}

pub fn count_embeddings(conn: &Connection) -> MnemonResult<u64> {
    conn.query_row("SELECT count(*) FROM embeddings", [], |row| {
        row.get::<_, i64>(0)
    })
    .map(|n| n as u64)
    .map_err(|e| to_storage_err(e.to_string()))
}

/// Drop embeddings whose memory no longer exists. Returns count dropped.
pub fn drop_orphans(conn: &Connection) -> MnemonResult<usize> {
    conn.execute(
        "DELETE FROM embeddings
         WHERE memory_id NOT IN (SELECT id FROM memories)",
        [],
    )
    .map_err(|e| to_storage_err(e.to_string()))
}

/// Little-endian f32 blob codec (bundle `vectors.f32` uses the same layout).
pub fn f32_vec_to_bytes(v: &[f32]) -> Vec<u8> {
    v.iter().flat_map(|f| f.to_le_bytes()).collect()
}

pub fn bytes_to_f32_vec(bytes: &[u8], expected_dims: usize) -> Vec<f32> {
    let mut result = Vec::with_capacity(expected_dims);
    for chunk in bytes.chunks_exact(4) {
        result.push(f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn f32_blob_round_trip() {
        let v = vec![0.25f32, -1.0, 3.5];
        let bytes = f32_vec_to_bytes(&v);
        assert_eq!(bytes.len(), 12);
        assert_eq!(bytes_to_f32_vec(&bytes, 3), v);
    }
}
