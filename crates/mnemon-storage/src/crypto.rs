//! Database key derivation.
//!
//! The pager key is derived from a machine-bound secret: `/etc/machine-id`
//! where available, otherwise a random secret generated once into the store
//! directory. SQLCipher then stretches the passphrase with
//! PBKDF2-HMAC-SHA256 over a per-database random salt.

use std::fs;
use std::path::Path;

use rand_core::{OsRng, RngCore};
use sha2::{Digest, Sha256};

use mnemon_core::constants::MACHINE_SECRET_FILE;
use mnemon_core::errors::MnemonResult;

/// Where the database passphrase comes from.
#[derive(Debug, Clone)]
pub enum PassphraseSource {
    /// Derive from the machine-bound secret (the default).
    MachineBound,
    /// Use the given passphrase verbatim (tests, explicit override).
    Explicit(String),
}

const MACHINE_ID_PATHS: &[&str] = &["/etc/machine-id", "/var/lib/dbus/machine-id"];
const KEY_DOMAIN: &[u8] = b"mnemon/db-key/v1";

/// Resolve the pager passphrase for a store rooted at `store_dir`.
pub fn resolve_passphrase(store_dir: &Path, source: &PassphraseSource) -> MnemonResult<String> {
    match source {
        PassphraseSource::Explicit(p) => Ok(p.clone()),
        PassphraseSource::MachineBound => {
            let secret = machine_secret(store_dir)?;
            let mut hasher = Sha256::new();
            hasher.update(KEY_DOMAIN);
            hasher.update(&secret);
            Ok(hex::encode(hasher.finalize()))
        }
    }
}

/// Anonymized identifier for receipts and bundle manifests: the first
/// 16 hex chars of a domain-separated digest of the machine secret.
pub fn exporter_id(store_dir: &Path) -> MnemonResult<String> {
    let secret = machine_secret(store_dir)?;
    let mut hasher = Sha256::new();
    hasher.update(b"mnemon/exporter-id/v1");
    hasher.update(&secret);
    Ok(hex::encode(hasher.finalize())[..16].to_string())
}

/// The raw machine-bound secret bytes. Falls back to a generated per-store
/// secret file when no machine id is readable (0600 on unix).
fn machine_secret(store_dir: &Path) -> MnemonResult<Vec<u8>> {
    for path in MACHINE_ID_PATHS {
        if let Ok(id) = fs::read_to_string(path) {
            let id = id.trim();
            if !id.is_empty() {
                return Ok(id.as_bytes().to_vec());
            }
        }
    }

    let secret_path = store_dir.join(MACHINE_SECRET_FILE);
    if let Ok(bytes) = fs::read(&secret_path) {
        if !bytes.is_empty() {
            return Ok(bytes);
        }
    }

    let mut secret = vec![0u8; 32];
    OsRng.fill_bytes(&mut secret);
    fs::write(&secret_path, &secret)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&secret_path, fs::Permissions::from_mode(0o600))?;
    }
    Ok(secret)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn passphrase_is_stable_per_store() {
        let dir = TempDir::new().unwrap();
        let a = resolve_passphrase(dir.path(), &PassphraseSource::MachineBound).unwrap();
        let b = resolve_passphrase(dir.path(), &PassphraseSource::MachineBound).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn explicit_passphrase_passes_through() {
        let dir = TempDir::new().unwrap();
        let p = resolve_passphrase(dir.path(), &PassphraseSource::Explicit("s3cret".into()))
            .unwrap();
        assert_eq!(p, "s3cret");
    }

    #[test]
    fn exporter_id_is_short_hex() {
        let dir = TempDir::new().unwrap();
        let id = exporter_id(dir.path()).unwrap();
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
