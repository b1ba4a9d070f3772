//! Receipt sink: one JSON file per invocation, timestamped-unique names,
//! rename-on-close. Never read back during normal operation.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use mnemon_core::constants::RECEIPTS_DIR;
use mnemon_core::models::Receipt;
use mnemon_core::{MnemonError, MnemonResult};

pub struct ReceiptSink {
    dir: PathBuf,
}

impl ReceiptSink {
    pub fn new(store_dir: &Path) -> MnemonResult<Self> {
        let dir = store_dir.join(RECEIPTS_DIR);
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Fresh receipt id: millisecond timestamp + short uuid. Monotonic
    /// enough that names never collide and sort chronologically.
    pub fn fresh_id(command: &str) -> String {
        let ts = Utc::now().timestamp_millis();
        let suffix = Uuid::new_v4().simple().to_string();
        format!("{ts}-{command}-{}", &suffix[..8])
    }

    /// Write a receipt atomically (temp sibling + rename). Returns the path.
    pub fn write(&self, receipt: &Receipt) -> MnemonResult<PathBuf> {
        let path = self.dir.join(format!("{}.json", receipt.id));
        let tmp = self.dir.join(format!(".{}.tmp", receipt.id));
        let text = serde_json::to_string_pretty(receipt)
            .map_err(|e| MnemonError::internal(e.to_string()))?;
        fs::write(&tmp, text)?;
        fs::rename(&tmp, &path)?;
        Ok(path)
    }
}

/// SHA-256 over the argument vector (unit-separator joined). Receipts carry
/// this digest; arguments are never stored in plaintext.
pub fn argv_digest<S: AsRef<str>>(argv: &[S]) -> String {
    let mut hasher = Sha256::new();
    for (i, arg) in argv.iter().enumerate() {
        if i > 0 {
            hasher.update([0x1f]);
        }
        hasher.update(arg.as_ref().as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Lowercase hex SHA-256 of arbitrary bytes.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnemon_core::models::{OfflineProof, Verdict};
    use tempfile::TempDir;

    fn sample_receipt(id: &str) -> Receipt {
        Receipt {
            id: id.to_string(),
            command: "status".into(),
            timestamp: Utc::now(),
            argv_sha256: argv_digest(&["status"]),
            affected: vec![],
            verdict: Verdict::Allowed,
            error: None,
            offline: OfflineProof {
                policy_network_egress: "blocked".into(),
                network_guard_active: true,
                proxies_present: false,
                attempted_connects: 0,
            },
            detail: serde_json::Value::Null,
        }
    }

    #[test]
    fn receipts_land_as_json_files() {
        let dir = TempDir::new().unwrap();
        let sink = ReceiptSink::new(dir.path()).unwrap();
        let id = ReceiptSink::fresh_id("status");
        let path = sink.write(&sample_receipt(&id)).unwrap();
        assert!(path.exists());
        let text = fs::read_to_string(path).unwrap();
        let parsed: Receipt = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.command, "status");
        assert_eq!(parsed.offline.policy_network_egress, "blocked");
    }

    #[test]
    fn fresh_ids_are_unique() {
        let a = ReceiptSink::fresh_id("gc");
        let b = ReceiptSink::fresh_id("gc");
        assert_ne!(a, b);
    }

    #[test]
    fn argv_digest_is_order_sensitive() {
        assert_ne!(argv_digest(&["a", "b"]), argv_digest(&["b", "a"]));
        assert_ne!(argv_digest(&["ab"]), argv_digest(&["a", "b"]));
    }
}
