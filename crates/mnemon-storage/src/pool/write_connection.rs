//! The single serialized write connection.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;

use mnemon_core::errors::MnemonResult;

use super::pragmas;
use crate::to_storage_err;

/// Mutex-guarded write connection. All writes in the process serialize here;
/// the advisory file lock serializes writers across processes.
pub struct WriteConnection {
    conn: Mutex<Connection>,
}

impl WriteConnection {
    pub fn open(path: &Path, passphrase: &str) -> MnemonResult<Self> {
        let conn = Connection::open(path).map_err(|e| to_storage_err(e.to_string()))?;
        pragmas::apply_key(&conn, passphrase)?;
        pragmas::apply_pragmas(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run a closure against the write connection.
    pub fn with_conn<F, T>(&self, f: F) -> MnemonResult<T>
    where
        F: FnOnce(&Connection) -> MnemonResult<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|_| to_storage_err("write connection mutex poisoned"))?;
        f(&conn)
    }
}
