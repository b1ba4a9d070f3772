//! The offline proof: a runtime-verifiable attestation that no egress
//! occurred (or could occur) during a command.

use chrono::Utc;

use mnemon_core::models::{OfflineProof, PolicyConfig};

use crate::net;

/// Snapshot the current offline posture.
pub fn prove_offline(policy: &PolicyConfig) -> OfflineProof {
    let egress = policy.network_egress || policy.permits_egress(Utc::now());
    OfflineProof {
        policy_network_egress: if egress { "allowed" } else { "blocked" }.to_string(),
        network_guard_active: net::guard_active(),
        proxies_present: net::proxies_present(),
        attempted_connects: net::attempted_connects(),
    }
}
