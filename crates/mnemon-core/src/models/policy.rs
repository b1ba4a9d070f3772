//! Policy configuration persisted as `policy.json`.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub allowed_commands: BTreeSet<String>,
    /// Globs over paths a command may touch.
    pub allowed_paths: Vec<String>,
    /// Static egress stance. `false` is the only shipped default; egress can
    /// only be opened with a time-bounded `egress` trust token.
    pub network_egress: bool,
    /// Time-bounded exceptions: command name (or the reserved key `egress`)
    /// to expiry.
    pub trust_tokens: BTreeMap<String, DateTime<Utc>>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            allowed_commands: constants::COMMANDS.iter().map(|c| c.to_string()).collect(),
            allowed_paths: vec!["**".to_string()],
            network_egress: false,
            trust_tokens: BTreeMap::new(),
        }
    }
}

impl PolicyConfig {
    /// True when `command` is allowed outright or holds an unexpired token.
    pub fn permits_command(&self, command: &str, now: DateTime<Utc>) -> bool {
        if self.allowed_commands.contains(command) {
            return true;
        }
        matches!(self.trust_tokens.get(command), Some(expiry) if *expiry > now)
    }

    /// True when an unexpired egress token exists.
    pub fn permits_egress(&self, now: DateTime<Utc>) -> bool {
        matches!(
            self.trust_tokens.get(constants::EGRESS_TOKEN),
            Some(expiry) if *expiry > now
        )
    }

    /// Drop expired trust tokens; returns how many were removed.
    pub fn prune_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.trust_tokens.len();
        self.trust_tokens.retain(|_, expiry| *expiry > now);
        before - self.trust_tokens.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn default_allows_all_commands_and_blocks_egress() {
        let policy = PolicyConfig::default();
        let now = Utc::now();
        assert!(policy.permits_command("search", now));
        assert!(policy.permits_command("init", now));
        assert!(!policy.network_egress);
        assert!(!policy.permits_egress(now));
    }

    #[test]
    fn trust_token_expires() {
        let mut policy = PolicyConfig {
            allowed_commands: BTreeSet::new(),
            ..Default::default()
        };
        let now = Utc::now();
        policy
            .trust_tokens
            .insert("search".to_string(), now + Duration::minutes(5));
        assert!(policy.permits_command("search", now));
        assert!(!policy.permits_command("search", now + Duration::minutes(6)));
        assert_eq!(policy.prune_expired(now + Duration::minutes(6)), 1);
    }
}
