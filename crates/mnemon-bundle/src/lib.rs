//! # mnemon-bundle
//!
//! The air-gapped bundle codec. A bundle is a directory (or zip) holding
//! `manifest.json`, `map.csv`, `notes.jsonl`, `vectors.f32`,
//! `checksums.json`, and optionally a detached Ed25519 signature with its
//! public key. Export is atomic (partial dir + fsync + rename); import
//! verifies every checksum and the signature before touching the store.

mod csvmap;
mod export;
mod import;
mod sign;

pub use export::{export_bundle, BundleKind, ExportOptions};
pub use import::import_bundle;
pub use sign::key_fingerprint;

/// Bundle member file names, in layout order.
pub(crate) mod files {
    pub const MANIFEST: &str = "manifest.json";
    pub const MAP: &str = "map.csv";
    pub const NOTES: &str = "notes.jsonl";
    pub const VECTORS: &str = "vectors.f32";
    pub const CHECKSUMS: &str = "checksums.json";
    pub const SIGNATURE: &str = "signature.bin";
    pub const PUBKEY: &str = "pubkey.pem";
}

use serde::{Deserialize, Serialize};

/// One line of `notes.jsonl`: the full content record for a memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct NoteRecord {
    pub content: String,
    pub tags: Vec<String>,
    pub metadata: std::collections::BTreeMap<String, String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub content_hash: String,
}
