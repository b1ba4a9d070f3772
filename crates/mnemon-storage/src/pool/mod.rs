//! Connection pool managing the keyed write connection and read connections.

pub mod pragmas;
pub mod read_pool;
pub mod write_connection;

use std::path::{Path, PathBuf};

use mnemon_core::errors::MnemonResult;

use crate::migrations;
use crate::queries::maintenance;

pub use read_pool::ReadPool;
pub use write_connection::WriteConnection;

/// Manages the single write connection and the read connection pool.
/// Every connection is keyed with the same passphrase before use.
pub struct ConnectionPool {
    pub writer: WriteConnection,
    pub readers: ReadPool,
    pub db_path: PathBuf,
}

impl ConnectionPool {
    /// Open the writer, migrate, checkpoint, then open the readers.
    /// The checkpoint matters on a fresh database: readers derive the
    /// cipher key from the salt in page 1, which only exists in the main
    /// file once the writer's pages are checkpointed out of the WAL.
    pub fn open(path: &Path, passphrase: &str, read_pool_size: usize) -> MnemonResult<Self> {
        let writer = WriteConnection::open(path, passphrase)?;
        writer.with_conn(|conn| {
            migrations::run_migrations(conn)?;
            maintenance::wal_checkpoint(conn)
        })?;
        let readers = ReadPool::open(path, passphrase, read_pool_size)?;
        Ok(Self {
            writer,
            readers,
            db_path: path.to_path_buf(),
        })
    }
}
