//! Round-robin pool of read-only connections. Reads run concurrently with
//! one another; writes go through the writer.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use rusqlite::{Connection, OpenFlags};

use mnemon_core::errors::MnemonResult;

use super::pragmas;
use crate::to_storage_err;

pub struct ReadPool {
    conns: Vec<Mutex<Connection>>,
    next: AtomicUsize,
}

impl ReadPool {
    pub fn open(path: &Path, passphrase: &str, size: usize) -> MnemonResult<Self> {
        let size = size.max(1);
        let mut conns = Vec::with_capacity(size);
        for _ in 0..size {
            let conn = Connection::open_with_flags(
                path,
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )
            .map_err(|e| to_storage_err(e.to_string()))?;
            pragmas::apply_key(&conn, passphrase)?;
            conn.execute_batch("PRAGMA busy_timeout = 5000;")
                .map_err(|e| to_storage_err(e.to_string()))?;
            conns.push(Mutex::new(conn));
        }
        Ok(Self {
            conns,
            next: AtomicUsize::new(0),
        })
    }

    /// Run a closure against the next reader in round-robin order.
    pub fn with_conn<F, T>(&self, f: F) -> MnemonResult<T>
    where
        F: FnOnce(&Connection) -> MnemonResult<T>,
    {
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.conns.len();
        let conn = self.conns[idx]
            .lock()
            .map_err(|_| to_storage_err("read connection mutex poisoned"))?;
        f(&conn)
    }
}
