//! Corruption recovery: integrity check plus rebuild-with-backup.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;

use mnemon_core::MnemonResult;

/// Rename a corrupt database (and its WAL/SHM sidecars) out of the way.
/// Returns the backup path of the main file.
pub fn quarantine(db_path: &Path) -> MnemonResult<PathBuf> {
    let ts = Utc::now().format("%Y%m%dT%H%M%S");
    let backup = db_path.with_file_name(format!(
        "{}.corrupt-{ts}",
        db_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "db".to_string())
    ));
    fs::rename(db_path, &backup)?;
    for suffix in ["-wal", "-shm"] {
        let sidecar = sidecar_path(db_path, suffix);
        if sidecar.exists() {
            let _ = fs::remove_file(&sidecar);
        }
    }
    Ok(backup)
}

fn sidecar_path(db_path: &Path, suffix: &str) -> PathBuf {
    let name = db_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "db".to_string());
    db_path.with_file_name(format!("{name}{suffix}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn quarantine_moves_db_aside() {
        let dir = TempDir::new().unwrap();
        let db = dir.path().join("db");
        fs::write(&db, b"not a database").unwrap();
        fs::write(dir.path().join("db-wal"), b"wal").unwrap();

        let backup = quarantine(&db).unwrap();
        assert!(!db.exists());
        assert!(backup.exists());
        assert!(backup
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("db.corrupt-"));
        assert!(!dir.path().join("db-wal").exists());
    }
}
