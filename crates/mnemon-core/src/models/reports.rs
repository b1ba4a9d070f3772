//! Structured per-operation reports, carried in receipt details.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GcReport {
    pub orphan_embeddings_dropped: usize,
    pub stale_digests_dropped: usize,
    pub vacuumed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorReport {
    pub healthy: bool,
    /// Set when the database was rebuilt from an empty schema.
    pub rebuilt: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_path: Option<String>,
    /// Memories present before the rebuild (all lost when `rebuilt`).
    pub memories_lost: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexReport {
    pub files_seen: usize,
    pub files_skipped_unchanged: usize,
    pub files_indexed: usize,
    pub chunks_indexed: usize,
    pub chunks_embedded: usize,
    pub memories_deleted: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureReport {
    pub verified: bool,
    /// First 16 hex chars of SHA-256 over the raw public key.
    pub key_fingerprint: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerifyReport {
    pub checksums_verified: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<SignatureReport>,
    pub memories_new: usize,
    pub memories_merged: usize,
    pub vectors_imported: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStats {
    pub count: usize,
    pub dimensions: usize,
    pub backend: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReport {
    pub memories: u64,
    pub embeddings: u64,
    pub conversations: u64,
    /// Memory counts per kind.
    pub by_kind: Vec<(String, u64)>,
    pub db_bytes: u64,
    pub vector_backend: String,
    pub embedding_dim: Option<usize>,
    pub policy_network_egress: bool,
}
