//! Per-invocation audit receipts and the offline proof record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Runtime attestation that no network egress occurred during a command.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineProof {
    /// "blocked" or "allowed".
    pub policy_network_egress: String,
    pub network_guard_active: bool,
    pub proxies_present: bool,
    /// Outbound connect attempts observed (and refused) during the command.
    pub attempted_connects: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Allowed,
    Blocked,
}

/// Digest of an artifact the command touched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AffectedObject {
    pub name: String,
    pub sha256: String,
}

/// One structured audit record per command invocation. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receipt {
    pub id: String,
    pub command: String,
    pub timestamp: DateTime<Utc>,
    /// SHA-256 of the joined argument vector; arguments are never stored raw.
    pub argv_sha256: String,
    pub affected: Vec<AffectedObject>,
    pub verdict: Verdict,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub offline: OfflineProof,
    /// Per-command structured payload (index counts, gc report, ...).
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub detail: serde_json::Value,
}
