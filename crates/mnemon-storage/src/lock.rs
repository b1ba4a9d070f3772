//! Exclusive advisory writer lock. One process owns the database at a time.

use std::fs::{File, OpenOptions};
use std::path::Path;

use fs2::FileExt;

use mnemon_core::errors::{MnemonError, StorageError};

/// Held for the lifetime of a [`crate::Store`]; released on drop.
#[derive(Debug)]
pub struct StoreLock {
    _file: File,
}

impl StoreLock {
    pub fn acquire(path: &Path) -> Result<Self, MnemonError> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)?;
        file.try_lock_exclusive().map_err(|_| {
            MnemonError::Storage(StorageError::Conflict {
                reason: format!(
                    "another process holds the writer lock at {}",
                    path.display()
                ),
            })
        })?;
        Ok(Self { _file: file })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn second_acquire_fails_while_held() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("db.lock");
        let _held = StoreLock::acquire(&path).unwrap();
        assert!(StoreLock::acquire(&path).is_err());
    }

    #[test]
    fn lock_released_on_drop() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("db.lock");
        drop(StoreLock::acquire(&path).unwrap());
        assert!(StoreLock::acquire(&path).is_ok());
    }
}
