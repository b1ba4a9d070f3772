//! Load/save of `policy.json` with atomic replace.

use std::fs;
use std::path::{Path, PathBuf};

use mnemon_core::constants::POLICY_FILE;
use mnemon_core::models::PolicyConfig;
use mnemon_core::{MnemonError, MnemonResult};

pub struct PolicyStore {
    path: PathBuf,
}

impl PolicyStore {
    pub fn new(store_dir: &Path) -> Self {
        Self {
            path: store_dir.join(POLICY_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the policy; a missing file yields the default policy.
    pub fn load(&self) -> MnemonResult<PolicyConfig> {
        match fs::read_to_string(&self.path) {
            Ok(text) => serde_json::from_str(&text)
                .map_err(|e| MnemonError::internal(format!("policy.json unreadable: {e}"))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(PolicyConfig::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Atomic save: temp sibling + rename.
    pub fn save(&self, policy: &PolicyConfig) -> MnemonResult<()> {
        let text = serde_json::to_string_pretty(policy)
            .map_err(|e| MnemonError::internal(e.to_string()))?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, text)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_default_policy() {
        let dir = TempDir::new().unwrap();
        let store = PolicyStore::new(dir.path());
        let policy = store.load().unwrap();
        assert!(!policy.network_egress);
        assert!(policy.allowed_commands.contains("status"));
    }

    #[test]
    fn save_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = PolicyStore::new(dir.path());
        let mut policy = PolicyConfig::default();
        policy.allowed_commands.remove("gc");
        policy.allowed_paths.push("src/**".to_string());
        store.save(&policy).unwrap();

        let loaded = store.load().unwrap();
        assert!(!loaded.allowed_commands.contains("gc"));
        assert!(loaded.allowed_paths.contains(&"src/**".to_string()));
    }
}
