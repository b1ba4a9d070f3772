//! Native backend: a sqlite-vec (`vec0`) loadable extension hosted in a
//! dedicated in-memory connection. Index state is derived data, so nothing
//! is persisted in plaintext. Distances are converted to similarities so
//! the ranking contract of the flat index holds.

use std::path::Path;

use rusqlite::{params, Connection};

use mnemon_core::errors::IndexError;
use mnemon_core::models::IndexStats;
use mnemon_core::traits::{QueryOpts, VectorIndex};
use mnemon_core::MnemonResult;

use crate::flat::normalize;

pub struct NativeIndex {
    conn: Connection,
    dims: usize,
}

impl NativeIndex {
    /// Load the extension library and create the virtual table.
    pub fn load(lib_path: &Path, dims: usize) -> MnemonResult<Self> {
        let conn = Connection::open_in_memory().map_err(|e| unavailable(e.to_string()))?;

        // Safety: loading a platform extension library is inherently
        // unsafe; the path comes from the store's own vector-ext directory.
        unsafe {
            conn.load_extension_enable()
                .map_err(|e| unavailable(e.to_string()))?;
            let loaded = conn.load_extension(lib_path, None);
            let _ = conn.load_extension_disable();
            loaded.map_err(|e| unavailable(e.to_string()))?;
        }

        conn.execute_batch(&format!(
            "CREATE VIRTUAL TABLE vec_index USING vec0(
                embedding float[{dims}] distance_metric=cosine
            )"
        ))
        .map_err(|e| unavailable(e.to_string()))?;

        tracing::info!(lib = %lib_path.display(), dims, "native vector backend loaded");
        Ok(Self { conn, dims })
    }

    fn check_dims(&self, vector: &[f32]) -> MnemonResult<()> {
        if vector.len() != self.dims {
            return Err(IndexError::DimensionMismatch {
                expected: self.dims,
                got: vector.len(),
            }
            .into());
        }
        Ok(())
    }

    fn count(&self) -> usize {
        self.conn
            .query_row("SELECT count(*) FROM vec_index", [], |row| {
                row.get::<_, i64>(0)
            })
            .unwrap_or(0) as usize
    }
}

fn unavailable(reason: String) -> mnemon_core::MnemonError {
    IndexError::BackendUnavailable {
        backend: "vec0".to_string(),
        reason,
    }
    .into()
}

fn vec_to_blob(v: &[f32]) -> Vec<u8> {
    v.iter().flat_map(|f| f.to_le_bytes()).collect()
}

impl VectorIndex for NativeIndex {
    fn init(&mut self) -> MnemonResult<()> {
        Ok(())
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    fn add(&mut self, id: i64, vector: &[f32]) -> MnemonResult<()> {
        self.check_dims(vector)?;
        let blob = vec_to_blob(&normalize(vector));
        self.conn
            .execute("DELETE FROM vec_index WHERE rowid = ?1", params![id])
            .map_err(|e| unavailable(e.to_string()))?;
        self.conn
            .execute(
                "INSERT INTO vec_index (rowid, embedding) VALUES (?1, ?2)",
                params![id, blob],
            )
            .map_err(|e| unavailable(e.to_string()))?;
        Ok(())
    }

    fn remove(&mut self, id: i64) -> MnemonResult<()> {
        self.conn
            .execute("DELETE FROM vec_index WHERE rowid = ?1", params![id])
            .map_err(|e| unavailable(e.to_string()))?;
        Ok(())
    }

    fn query(&self, vector: &[f32], opts: QueryOpts) -> MnemonResult<Vec<(i64, f32)>> {
        self.check_dims(vector)?;
        if opts.k == 0 {
            return Ok(Vec::new());
        }
        let blob = vec_to_blob(&normalize(vector));

        let mut stmt = self
            .conn
            .prepare(
                "SELECT rowid, distance FROM vec_index
                 WHERE embedding MATCH ?1 AND k = ?2
                 ORDER BY distance",
            )
            .map_err(|e| unavailable(e.to_string()))?;
        let rows = stmt
            .query_map(params![blob, opts.k as i64], |row| {
                let id: i64 = row.get(0)?;
                let distance: f64 = row.get(1)?;
                Ok((id, distance))
            })
            .map_err(|e| unavailable(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| unavailable(e.to_string()))?;

        // Cosine distance → similarity, then re-sort with the contract's
        // id-ascending tie-break.
        let mut scored: Vec<(i64, f32)> = rows
            .into_iter()
            .map(|(id, d)| (id, (1.0 - d) as f32))
            .filter(|(_, sim)| *sim > opts.threshold)
            .collect();
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        scored.truncate(opts.k);
        Ok(scored)
    }

    fn stats(&self) -> IndexStats {
        IndexStats {
            count: self.count(),
            dimensions: self.dims,
            backend: "vec0".to_string(),
        }
    }
}
