//! File digest cache: path → (sha256, size, mtime, last_indexed_at).
//! Consulted by the diff-aware reindexer; replaced atomically on save.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::UNIX_EPOCH;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use mnemon_core::MnemonResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DigestEntry {
    pub sha256: String,
    pub size: u64,
    pub mtime: i64,
    pub last_indexed_at: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct DigestCache {
    entries: BTreeMap<String, DigestEntry>,
}

impl DigestCache {
    /// Load from disk; a missing or unreadable cache is an empty cache.
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "digest cache unreadable, rebuilding");
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Atomic save: write a sibling temp file, fsync, rename over.
    pub fn save(&self, path: &Path) -> MnemonResult<()> {
        let tmp = path.with_extension("json.tmp");
        let text = serde_json::to_string_pretty(self)
            .map_err(|e| mnemon_core::MnemonError::internal(e.to_string()))?;
        fs::write(&tmp, text)?;
        let file = fs::File::open(&tmp)?;
        file.sync_all()?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn get(&self, path: &str) -> Option<&DigestEntry> {
        self.entries.get(path)
    }

    pub fn insert(&mut self, path: String, entry: DigestEntry) {
        self.entries.insert(path, entry);
    }

    pub fn remove(&mut self, path: &str) -> Option<DigestEntry> {
        self.entries.remove(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop entries whose file no longer exists under `root`.
    /// Returns how many were removed.
    pub fn prune_missing(&mut self, root: &Path) -> usize {
        let before = self.entries.len();
        self.entries.retain(|rel, _| root.join(rel).is_file());
        before - self.entries.len()
    }

    /// True when the on-disk tuple matches the cached entry (diff skip).
    pub fn is_unchanged(&self, path: &str, sha256: &str, size: u64, mtime: i64) -> bool {
        matches!(
            self.entries.get(path),
            Some(e) if e.sha256 == sha256 && e.size == size && e.mtime == mtime
        )
    }
}

/// Compute `(sha256, size, mtime)` for a file.
pub fn file_digest(path: &Path) -> MnemonResult<(String, u64, i64)> {
    let bytes = fs::read(path)?;
    let meta = fs::metadata(path)?;
    let mtime = meta
        .modified()?
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok((hex::encode(hasher.finalize()), meta.len(), mtime))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn save_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("digest-cache.json");
        let mut cache = DigestCache::default();
        cache.insert(
            "src/a.ts".into(),
            DigestEntry {
                sha256: "ab".repeat(32),
                size: 10,
                mtime: 1_700_000_000,
                last_indexed_at: Utc::now(),
            },
        );
        cache.save(&path).unwrap();

        let loaded = DigestCache::load(&path);
        assert_eq!(loaded.len(), 1);
        assert!(loaded.get("src/a.ts").is_some());
    }

    #[test]
    fn prune_missing_drops_deleted_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("keep.py"), "x = 1\n").unwrap();

        let mut cache = DigestCache::default();
        let entry = DigestEntry {
            sha256: "00".repeat(32),
            size: 6,
            mtime: 0,
            last_indexed_at: Utc::now(),
        };
        cache.insert("keep.py".into(), entry.clone());
        cache.insert("gone.py".into(), entry);

        assert_eq!(cache.prune_missing(dir.path()), 1);
        assert!(cache.get("keep.py").is_some());
        assert!(cache.get("gone.py").is_none());
    }

    #[test]
    fn unchanged_requires_full_tuple_match() {
        let mut cache = DigestCache::default();
        cache.insert(
            "f".into(),
            DigestEntry {
                sha256: "aa".into(),
                size: 5,
                mtime: 10,
                last_indexed_at: Utc::now(),
            },
        );
        assert!(cache.is_unchanged("f", "aa", 5, 10));
        assert!(!cache.is_unchanged("f", "aa", 6, 10));
        assert!(!cache.is_unchanged("f", "bb", 5, 10));
        assert!(!cache.is_unchanged("missing", "aa", 5, 10));
    }
}
