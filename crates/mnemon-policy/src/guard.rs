//! The scoped guard wrapped around every command: allow-list checks on
//! entry, network interceptor for the duration, receipt on every exit path.

use std::path::{Path, PathBuf};

use chrono::Utc;
use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::{debug, warn};

use mnemon_core::errors::{MnemonError, PolicyError};
use mnemon_core::models::{AffectedObject, OfflineProof, PolicyConfig, Receipt, Verdict};
use mnemon_core::MnemonResult;

use crate::journal::Journal;
use crate::net;
use crate::receipts::{argv_digest, ReceiptSink};

pub struct Guard;

impl Guard {
    /// Check the command and its touched paths against policy, install the
    /// network interceptor, and open the receipt scope. On violation a
    /// `blocked` receipt is written before the error is returned.
    pub fn enter<'a>(
        command: &str,
        argv: &[String],
        touched_paths: &[PathBuf],
        policy: &PolicyConfig,
        store_dir: &Path,
        sink: &'a ReceiptSink,
        journal: &'a Journal,
    ) -> MnemonResult<GuardScope<'a>> {
        let now = Utc::now();
        let egress_allowed = policy.network_egress || policy.permits_egress(now);
        let interceptor = net::install(egress_allowed);

        let mut scope = GuardScope {
            command: command.to_string(),
            argv_sha256: argv_digest(argv),
            affected: Vec::new(),
            started_attempts: net::attempted_connects(),
            egress_allowed,
            sink,
            journal,
            _interceptor: interceptor,
            finished: false,
        };
        let _ = journal.append(
            "command_start",
            serde_json::json!({ "command": command }),
        );

        if !policy.permits_command(command, now) {
            let hint = format!("policy allow-command {command}");
            let err = MnemonError::Policy(PolicyError::CommandBlocked {
                command: command.to_string(),
                hint: hint.clone(),
            });
            scope.write_exit(Verdict::Blocked, Some(&err), serde_json::json!({ "hint": hint }));
            scope.finished = true;
            return Err(err);
        }

        let allowed = compile_paths(&policy.allowed_paths);
        for path in touched_paths {
            if path_permitted(path, store_dir, &allowed) {
                continue;
            }
            let shown = display_path(path);
            let hint = format!("policy allow-path {shown}");
            let err = MnemonError::Policy(PolicyError::PathDenied {
                path: shown,
                hint: hint.clone(),
            });
            scope.write_exit(Verdict::Blocked, Some(&err), serde_json::json!({ "hint": hint }));
            scope.finished = true;
            return Err(err);
        }

        debug!(command, "guard passed");
        Ok(scope)
    }
}

/// Open receipt scope. The interceptor is removed and the receipt written on
/// every exit path; `Drop` covers aborts.
pub struct GuardScope<'a> {
    command: String,
    argv_sha256: String,
    affected: Vec<AffectedObject>,
    started_attempts: u64,
    egress_allowed: bool,
    sink: &'a ReceiptSink,
    journal: &'a Journal,
    _interceptor: net::InterceptorScope,
    finished: bool,
}

impl<'a> GuardScope<'a> {
    /// Record the digest of an artifact this command touched.
    pub fn record_affected(&mut self, name: impl Into<String>, sha256: impl Into<String>) {
        self.affected.push(AffectedObject {
            name: name.into(),
            sha256: sha256.into(),
        });
    }

    fn proof(&self) -> OfflineProof {
        OfflineProof {
            policy_network_egress: if self.egress_allowed { "allowed" } else { "blocked" }
                .to_string(),
            network_guard_active: true,
            proxies_present: net::proxies_present(),
            attempted_connects: net::attempted_connects() - self.started_attempts,
        }
    }

    fn write_exit(
        &self,
        verdict: Verdict,
        error: Option<&MnemonError>,
        detail: serde_json::Value,
    ) {
        let receipt = Receipt {
            id: ReceiptSink::fresh_id(&self.command),
            command: self.command.clone(),
            timestamp: Utc::now(),
            argv_sha256: self.argv_sha256.clone(),
            affected: self.affected.clone(),
            verdict,
            error: error.map(|e| e.to_string()),
            offline: self.proof(),
            detail,
        };
        if let Err(e) = self.sink.write(&receipt) {
            warn!(error = %e, "failed to write receipt");
        }
        let event = match (verdict, error) {
            (Verdict::Blocked, _) => "command_blocked",
            (Verdict::Allowed, Some(_)) => "command_error",
            (Verdict::Allowed, None) => "command_ok",
        };
        let _ = self.journal.append(
            event,
            serde_json::json!({ "command": self.command, "error": error.map(|e| e.to_string()) }),
        );
    }

    /// Successful completion: write the `allowed` receipt with the
    /// per-command detail payload.
    pub fn finish(mut self, detail: serde_json::Value) {
        self.write_exit(Verdict::Allowed, None, detail);
        self.finished = true;
    }

    /// Failed completion: policy errors get a `blocked` receipt, everything
    /// else an `allowed` receipt carrying the structured error.
    pub fn fail(mut self, error: &MnemonError) {
        let verdict = match error {
            MnemonError::Policy(_) => Verdict::Blocked,
            _ => Verdict::Allowed,
        };
        let detail = match error.remediation() {
            Some(hint) => serde_json::json!({ "hint": hint }),
            None => serde_json::Value::Null,
        };
        self.write_exit(verdict, Some(error), detail);
        self.finished = true;
    }
}

impl Drop for GuardScope<'_> {
    fn drop(&mut self) {
        if !self.finished {
            // Abnormal exit (early return or panic): still leave a receipt.
            let err = MnemonError::internal("command scope aborted");
            self.write_exit(Verdict::Allowed, Some(&err), serde_json::Value::Null);
        }
    }
}

fn compile_paths(globs: &[String]) -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for glob in globs {
        match Glob::new(glob) {
            Ok(g) => {
                builder.add(g);
            }
            Err(e) => warn!(glob, error = %e, "ignoring unparseable allow-path glob"),
        }
    }
    builder.build().unwrap_or_else(|_| GlobSet::empty())
}

/// The engine's own state directory is always permitted; everything else
/// must match an allow-path glob.
fn path_permitted(path: &Path, store_dir: &Path, allowed: &GlobSet) -> bool {
    if path.starts_with(store_dir) {
        return true;
    }
    allowed.is_match(path)
}

fn display_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    fn harness(dir: &Path) -> (ReceiptSink, Journal) {
        (ReceiptSink::new(dir).unwrap(), Journal::new(dir))
    }

    fn receipt_files(sink: &ReceiptSink) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(sink.dir())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .collect();
        files.sort();
        files
    }

    #[test]
    fn disallowed_command_is_blocked_with_hint() {
        let dir = TempDir::new().unwrap();
        let (sink, journal) = harness(dir.path());
        let policy = PolicyConfig {
            allowed_commands: BTreeSet::from(["status".to_string()]),
            ..Default::default()
        };

        let err = Guard::enter(
            "search-code",
            &["search-code".to_string()],
            &[],
            &policy,
            dir.path(),
            &sink,
            &journal,
        )
        .unwrap_err();

        assert_eq!(err.exit_code(), 2);
        assert_eq!(
            err.remediation().as_deref(),
            Some("policy allow-command search-code")
        );

        let files = receipt_files(&sink);
        assert_eq!(files.len(), 1);
        let receipt: Receipt =
            serde_json::from_str(&std::fs::read_to_string(&files[0]).unwrap()).unwrap();
        assert_eq!(receipt.verdict, Verdict::Blocked);
    }

    #[test]
    fn path_outside_allowlist_is_denied() {
        let dir = TempDir::new().unwrap();
        let (sink, journal) = harness(dir.path());
        let policy = PolicyConfig {
            allowed_paths: vec!["/workspace/**".to_string()],
            ..Default::default()
        };

        let err = Guard::enter(
            "index-code",
            &["index-code".to_string()],
            &[PathBuf::from("/etc/passwd")],
            &policy,
            dir.path(),
            &sink,
            &journal,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            MnemonError::Policy(PolicyError::PathDenied { .. })
        ));
    }

    #[test]
    fn store_dir_paths_are_always_permitted() {
        let dir = TempDir::new().unwrap();
        let (sink, journal) = harness(dir.path());
        let policy = PolicyConfig {
            allowed_paths: vec![],
            ..Default::default()
        };

        let scope = Guard::enter(
            "gc",
            &["gc".to_string()],
            &[dir.path().join("db")],
            &policy,
            dir.path(),
            &sink,
            &journal,
        )
        .unwrap();
        scope.finish(serde_json::Value::Null);
    }

    #[test]
    fn successful_scope_writes_allowed_receipt_with_proof() {
        let dir = TempDir::new().unwrap();
        let (sink, journal) = harness(dir.path());
        let policy = PolicyConfig::default();

        let mut scope = Guard::enter(
            "remember",
            &["remember".to_string(), "content".to_string()],
            &[],
            &policy,
            dir.path(),
            &sink,
            &journal,
        )
        .unwrap();
        scope.record_affected("memory:1", "ab".repeat(32));
        scope.finish(serde_json::json!({ "created": true }));

        let files = receipt_files(&sink);
        assert_eq!(files.len(), 1);
        let receipt: Receipt =
            serde_json::from_str(&std::fs::read_to_string(&files[0]).unwrap()).unwrap();
        assert_eq!(receipt.verdict, Verdict::Allowed);
        assert_eq!(receipt.offline.policy_network_egress, "blocked");
        assert!(receipt.offline.network_guard_active);
        assert_eq!(receipt.affected.len(), 1);
        assert!(receipt.error.is_none());
    }

    #[test]
    fn dropped_scope_still_leaves_a_receipt() {
        let dir = TempDir::new().unwrap();
        let (sink, journal) = harness(dir.path());
        let policy = PolicyConfig::default();
        {
            let _scope = Guard::enter(
                "gc",
                &["gc".to_string()],
                &[],
                &policy,
                dir.path(),
                &sink,
                &journal,
            )
            .unwrap();
            // dropped without finish()
        }
        assert_eq!(receipt_files(&sink).len(), 1);
    }
}
