//! Ed25519 signing of the bundle checksum set.
//!
//! The signed message is the SHA-256 over the canonical rendering of
//! `checksums.json`: `name:hex` lines sorted by name, "\n"-joined. The key
//! seed lives at `.store/signing.key` (0600), generated on first use.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use ed25519_dalek::pkcs8::spki::der::pem::LineEnding;
use ed25519_dalek::pkcs8::{DecodePublicKey, EncodePublicKey};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand_core::OsRng;
use sha2::{Digest, Sha256};

use mnemon_core::constants::SIGNING_KEY_FILE;
use mnemon_core::errors::BundleError;
use mnemon_core::{MnemonError, MnemonResult};

/// SHA-256 over the canonical checksum rendering.
pub fn canonical_checksum_digest(checksums: &BTreeMap<String, String>) -> [u8; 32] {
    // BTreeMap iteration is already name-sorted.
    let rendered: Vec<String> = checksums
        .iter()
        .map(|(name, hash)| format!("{name}:{hash}"))
        .collect();
    let mut hasher = Sha256::new();
    hasher.update(rendered.join("\n").as_bytes());
    hasher.finalize().into()
}

/// Load the signing key, generating one on first use.
pub fn load_or_generate_signing_key(store_dir: &Path) -> MnemonResult<SigningKey> {
    let path = store_dir.join(SIGNING_KEY_FILE);
    if let Ok(bytes) = fs::read(&path) {
        let seed: [u8; 32] = bytes
            .try_into()
            .map_err(|_| MnemonError::internal("signing.key is not 32 bytes"))?;
        return Ok(SigningKey::from_bytes(&seed));
    }

    let key = SigningKey::generate(&mut OsRng);
    fs::write(&path, key.to_bytes())?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o600))?;
    }
    Ok(key)
}

pub fn sign_checksums(key: &SigningKey, checksums: &BTreeMap<String, String>) -> Vec<u8> {
    let digest = canonical_checksum_digest(checksums);
    key.sign(&digest).to_bytes().to_vec()
}

pub fn public_key_pem(key: &SigningKey) -> MnemonResult<String> {
    key.verifying_key()
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| MnemonError::internal(format!("pubkey PEM encoding: {e}")))
}

/// First 16 hex chars of SHA-256 over the raw public key bytes.
pub fn key_fingerprint(key: &VerifyingKey) -> String {
    let digest = Sha256::digest(key.to_bytes());
    hex::encode(digest)[..16].to_string()
}

/// Verify a detached signature; returns the signer's key fingerprint.
pub fn verify_checksums(
    pubkey_pem: &str,
    checksums: &BTreeMap<String, String>,
    signature: &[u8],
) -> MnemonResult<String> {
    let key = VerifyingKey::from_public_key_pem(pubkey_pem).map_err(|e| {
        MnemonError::Bundle(BundleError::SignatureInvalid {
            reason: format!("unreadable public key: {e}"),
        })
    })?;
    let sig_bytes: [u8; 64] = signature.try_into().map_err(|_| {
        MnemonError::Bundle(BundleError::SignatureInvalid {
            reason: "signature is not 64 bytes".to_string(),
        })
    })?;
    let signature = Signature::from_bytes(&sig_bytes);
    let digest = canonical_checksum_digest(checksums);
    key.verify(&digest, &signature).map_err(|_| {
        MnemonError::Bundle(BundleError::SignatureInvalid {
            reason: "signature does not match checksum digest".to_string(),
        })
    })?;
    Ok(key_fingerprint(&key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_checksums() -> BTreeMap<String, String> {
        let mut m = BTreeMap::new();
        m.insert("map.csv".to_string(), "aa".repeat(32));
        m.insert("manifest.json".to_string(), "bb".repeat(32));
        m
    }

    #[test]
    fn sign_verify_round_trip() {
        let dir = TempDir::new().unwrap();
        let key = load_or_generate_signing_key(dir.path()).unwrap();
        let checksums = sample_checksums();

        let sig = sign_checksums(&key, &checksums);
        let pem = public_key_pem(&key).unwrap();
        let fingerprint = verify_checksums(&pem, &checksums, &sig).unwrap();
        assert_eq!(fingerprint, key_fingerprint(&key.verifying_key()));
        assert_eq!(fingerprint.len(), 16);
    }

    #[test]
    fn verification_rejects_altered_checksums() {
        let dir = TempDir::new().unwrap();
        let key = load_or_generate_signing_key(dir.path()).unwrap();
        let checksums = sample_checksums();
        let sig = sign_checksums(&key, &checksums);
        let pem = public_key_pem(&key).unwrap();

        let mut tampered = checksums.clone();
        tampered.insert("map.csv".to_string(), "cc".repeat(32));
        let err = verify_checksums(&pem, &tampered, &sig).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn signing_key_persists_across_loads() {
        let dir = TempDir::new().unwrap();
        let a = load_or_generate_signing_key(dir.path()).unwrap();
        let b = load_or_generate_signing_key(dir.path()).unwrap();
        assert_eq!(a.to_bytes(), b.to_bytes());
    }

    #[test]
    fn canonical_digest_is_order_independent() {
        let mut forward = BTreeMap::new();
        forward.insert("a".to_string(), "1".to_string());
        forward.insert("b".to_string(), "2".to_string());
        let mut reversed = BTreeMap::new();
        reversed.insert("b".to_string(), "2".to_string());
        reversed.insert("a".to_string(), "1".to_string());
        assert_eq!(
            canonical_checksum_digest(&forward),
            canonical_checksum_digest(&reversed)
        );
    }
}
