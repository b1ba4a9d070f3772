//! Portable context-bundle manifest.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BundleCounts {
    pub memories: usize,
    pub vectors: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleManifest {
    pub schema_version: u32,
    /// Anonymized exporter digest (16 hex chars); never a hostname or user.
    pub exporter_id: String,
    pub created_at: DateTime<Utc>,
    /// "code" | "notes" | "mixed".
    pub kind: String,
    pub counts: BundleCounts,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_dim: Option<usize>,
    /// File name → lowercase hex SHA-256 over file bytes.
    pub checksums: BTreeMap<String, String>,
}
