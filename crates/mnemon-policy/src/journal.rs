//! Append-only audit journal: one JSON event per line, O_APPEND writes.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;

use mnemon_core::constants::JOURNAL_FILE;
use mnemon_core::{MnemonError, MnemonResult};

pub struct Journal {
    path: PathBuf,
}

impl Journal {
    pub fn new(store_dir: &Path) -> Self {
        Self {
            path: store_dir.join(JOURNAL_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one event line. Write-only sink: never read back in normal
    /// operation.
    pub fn append(&self, event: &str, detail: serde_json::Value) -> MnemonResult<()> {
        let line = serde_json::json!({
            "ts": Utc::now().to_rfc3339(),
            "event": event,
            "detail": detail,
        });
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut text =
            serde_json::to_string(&line).map_err(|e| MnemonError::internal(e.to_string()))?;
        text.push('\n');
        file.write_all(text.as_bytes())?;
        Ok(())
    }
}
