//! End-to-end engine tests: indexing, search ordering, diff reindex,
//! policy denial, offline proof, bundle transfer, persistence.

use std::fs;
use std::path::Path;

use tempfile::TempDir;

use mnemon_core::config::MnemonConfig;
use mnemon_core::constants::{DIGEST_CACHE_FILE, POLICY_FILE, RECEIPTS_DIR, STORE_DIR};
use mnemon_core::models::PolicyConfig;
use mnemon_core::{CancelToken, SearchMode};
use mnemon_engine::{GcOptions, IndexOptions, Mnemon, PassphraseSource, SearchRequest};

fn test_config() -> MnemonConfig {
    let mut config = MnemonConfig::default();
    config.embedding.model = Some("hashed".to_string());
    config.embedding.dimensions = 64;
    config
}

fn open_engine(root: &Path) -> Mnemon {
    Mnemon::open_with(
        root,
        PassphraseSource::Explicit("engine-test".into()),
        test_config(),
    )
    .unwrap()
}

const WIDGET_TS: &str = "\
// widget module
import { Base } from \"./base\";

class Foo extends Base {
    private count = 0;

    increment(): void {
        this.count += 1;
    }

    decrement(): void {
        this.count -= 1;
    }

    total(): number {
        return this.count;
    }

    // counters stay non-negative
}

function bar(input: number): number {
    const doubled = input * 2;
    if (doubled > 10) {
        return 10;
    }
    return doubled;
}
";

fn write_fixture(root: &Path) {
    fs::create_dir_all(root.join("src")).unwrap();
    fs::write(root.join("src/widget.ts"), WIDGET_TS).unwrap();
}

#[test]
fn index_code_emits_one_chunk_per_symbol() {
    let dir = TempDir::new().unwrap();
    write_fixture(dir.path());
    let engine = open_engine(dir.path());
    engine.init().unwrap();

    let report = engine
        .index_code(&IndexOptions::default(), &CancelToken::new())
        .unwrap();
    assert_eq!(report.files_indexed, 1);
    assert_eq!(report.chunks_indexed, 2);
    assert_eq!(report.chunks_embedded, 2);

    let outcome = engine
        .search(&SearchRequest {
            mode: SearchMode::Lexical,
            ..SearchRequest::new("Foo")
        })
        .unwrap();
    assert!(!outcome.results.is_empty());
    let top = &outcome.results[0];
    assert_eq!(top.metadata.get("symbolName").map(String::as_str), Some("Foo"));
    assert_eq!(top.metadata.get("lineStart").map(String::as_str), Some("4"));
    assert_eq!(top.metadata.get("lineEnd").map(String::as_str), Some("20"));
    assert_eq!(top.kind, "symbol");
}

#[test]
fn diff_reindex_skips_unchanged_files() {
    let dir = TempDir::new().unwrap();
    write_fixture(dir.path());
    let engine = open_engine(dir.path());

    let options = IndexOptions {
        diff: true,
        ..Default::default()
    };
    let token = CancelToken::new();
    engine.index_code(&options, &token).unwrap();

    let cache_path = dir.path().join(STORE_DIR).join(DIGEST_CACHE_FILE);
    let cache_before = fs::read_to_string(&cache_path).unwrap();

    let second = engine.index_code(&options, &token).unwrap();
    assert_eq!(second.files_skipped_unchanged, 1);
    assert_eq!(second.files_indexed, 0);
    assert_eq!(second.chunks_embedded, 0);

    let cache_after = fs::read_to_string(&cache_path).unwrap();
    assert_eq!(cache_before, cache_after, "digest entry must stay untouched");
}

#[test]
fn changed_file_replaces_stale_symbols() {
    let dir = TempDir::new().unwrap();
    write_fixture(dir.path());
    let engine = open_engine(dir.path());
    let token = CancelToken::new();
    engine.index_code(&IndexOptions::default(), &token).unwrap();

    // bar is gone, baz appears; Foo's chunk hash is unchanged.
    let updated = WIDGET_TS.replace("function bar", "function baz");
    fs::write(dir.path().join("src/widget.ts"), updated).unwrap();

    let report = engine
        .reindex_file(&dir.path().join("src/widget.ts"), &token)
        .unwrap();
    assert_eq!(report.memories_deleted, 1);

    let gone = engine
        .search(&SearchRequest {
            mode: SearchMode::Lexical,
            ..SearchRequest::new("bar")
        })
        .unwrap();
    assert!(gone
        .results
        .iter()
        .all(|r| r.metadata.get("symbolName").map(String::as_str) != Some("bar")));

    let found = engine
        .search(&SearchRequest {
            mode: SearchMode::Lexical,
            ..SearchRequest::new("baz")
        })
        .unwrap();
    assert_eq!(
        found.results[0].metadata.get("symbolName").map(String::as_str),
        Some("baz")
    );
}

#[test]
fn remember_then_hybrid_search_round_trips() {
    let dir = TempDir::new().unwrap();
    let engine = open_engine(dir.path());

    let (id, created) = engine
        .remember(
            "the export format carries a detached signature",
            Some("notes"),
            Some("note"),
            vec!["format".to_string()],
        )
        .unwrap();
    assert!(created);

    let (again, created_again) = engine
        .remember(
            "the export format carries a detached signature",
            Some("notes"),
            None,
            vec![],
        )
        .unwrap();
    assert_eq!(id, again);
    assert!(!created_again);

    let outcome = engine
        .search(&SearchRequest::new("detached signature"))
        .unwrap();
    assert_eq!(outcome.results[0].id, id);
    assert!(outcome.results[0].preview.contains("«signature»"));
}

#[test]
fn search_trace_reports_component_scores() {
    let dir = TempDir::new().unwrap();
    let engine = open_engine(dir.path());
    engine
        .remember("tracing the ranker internals", None, None, vec![])
        .unwrap();

    let outcome = engine
        .search(&SearchRequest {
            trace: true,
            ..SearchRequest::new("ranker internals")
        })
        .unwrap();
    let trace = outcome.trace.expect("trace requested");
    assert!(!trace.is_empty());
    assert!(trace[0].fused > 0.0);
}

#[test]
fn blocked_command_exits_two_with_hint_and_receipt() {
    let dir = TempDir::new().unwrap();
    let engine = open_engine(dir.path());
    engine.init().unwrap();

    // Restrict the policy to `status` only.
    let policy_path = dir.path().join(STORE_DIR).join(POLICY_FILE);
    let mut policy = PolicyConfig::default();
    policy.allowed_commands = ["status".to_string()].into();
    fs::write(&policy_path, serde_json::to_string_pretty(&policy).unwrap()).unwrap();

    let receipts_dir = dir.path().join(STORE_DIR).join(RECEIPTS_DIR);
    let receipts_before = fs::read_dir(&receipts_dir).unwrap().count();

    let err = engine.search(&SearchRequest::new("anything")).unwrap_err();
    assert_eq!(err.exit_code(), 2);
    assert_eq!(
        err.remediation().as_deref(),
        Some("policy allow-command search")
    );

    // Status still passes, and the denial left a receipt.
    engine.status().unwrap();
    let receipts_after = fs::read_dir(&receipts_dir).unwrap().count();
    assert!(receipts_after >= receipts_before + 2);
}

#[test]
fn prove_offline_attests_blocked_egress() {
    let dir = TempDir::new().unwrap();
    let engine = open_engine(dir.path());

    let proof = engine.prove_offline().unwrap();
    assert_eq!(proof.policy_network_egress, "blocked");
    assert!(proof.network_guard_active);
}

#[test]
fn trust_token_flips_offline_report_until_expiry() {
    let dir = TempDir::new().unwrap();
    let engine = open_engine(dir.path());

    engine.policy_trust("egress", 5).unwrap();
    let proof = engine.prove_offline().unwrap();
    assert_eq!(proof.policy_network_egress, "allowed");

    let findings = engine.policy_doctor().unwrap();
    assert!(findings.is_empty(), "unexpired token is not a finding: {findings:?}");
}

#[test]
fn export_import_moves_memories_between_engines() {
    let src_dir = TempDir::new().unwrap();
    let dst_dir = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();

    let src = open_engine(src_dir.path());
    src.remember("portable memory one", None, Some("note"), vec![])
        .unwrap();
    src.remember("portable memory two", None, Some("note"), vec![])
        .unwrap();

    let bundle = out.path().join("move.ctx");
    let token = CancelToken::new();
    let manifest = src
        .export_context(&bundle, "mixed", false, true, &token)
        .unwrap();
    assert_eq!(manifest.counts.memories, 2);

    let dst = open_engine(dst_dir.path());
    let report = dst.import_context(&bundle).unwrap();
    assert_eq!(report.memories_new, 2);
    assert!(report.signature.unwrap().verified);

    let outcome = dst
        .search(&SearchRequest::new("portable memory"))
        .unwrap();
    assert_eq!(outcome.results.len(), 2);
}

#[test]
fn memories_survive_engine_reopen() {
    let dir = TempDir::new().unwrap();
    let id = {
        let engine = open_engine(dir.path());
        let (id, _) = engine
            .remember("durable through restart", None, None, vec![])
            .unwrap();
        id
    };

    let engine = open_engine(dir.path());
    let outcome = engine
        .search(&SearchRequest::new("durable restart"))
        .unwrap();
    assert_eq!(outcome.results[0].id, id);

    // The receipt from the original remember is still on disk.
    let receipts_dir = dir.path().join(STORE_DIR).join(RECEIPTS_DIR);
    let remembers = fs::read_dir(receipts_dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().contains("remember"))
        .count();
    assert!(remembers >= 1);
}

#[test]
fn cancelled_reindex_reports_cancelled() {
    let dir = TempDir::new().unwrap();
    write_fixture(dir.path());
    let engine = open_engine(dir.path());

    let token = CancelToken::new();
    token.cancel();
    let err = engine
        .index_code(&IndexOptions::default(), &token)
        .unwrap_err();
    assert!(matches!(err, mnemon_engine::MnemonError::Cancelled));
}

#[test]
fn gc_runs_all_phases() {
    let dir = TempDir::new().unwrap();
    write_fixture(dir.path());
    let engine = open_engine(dir.path());
    let token = CancelToken::new();
    engine.index_code(&IndexOptions::default(), &token).unwrap();

    // Remove the fixture so its digest entry goes stale.
    fs::remove_file(dir.path().join("src/widget.ts")).unwrap();

    let report = engine
        .gc(&GcOptions {
            prune_vectors: true,
            drop_stale_digests: true,
            vacuum: true,
        })
        .unwrap();
    assert!(report.vacuumed);
    assert_eq!(report.stale_digests_dropped, 1);
}

#[test]
fn filters_narrow_code_search() {
    let dir = TempDir::new().unwrap();
    write_fixture(dir.path());
    fs::write(
        dir.path().join("src/helper.py"),
        "def increment(value):\n    return value + 1\n",
    )
    .unwrap();
    let engine = open_engine(dir.path());
    let token = CancelToken::new();
    engine.index_code(&IndexOptions::default(), &token).unwrap();

    let outcome = engine
        .search(&SearchRequest {
            mode: SearchMode::Lexical,
            filters: mnemon_core::SearchFilters {
                language: Some("python".to_string()),
                ..Default::default()
            },
            ..SearchRequest::new("increment")
        })
        .unwrap();
    assert!(!outcome.results.is_empty());
    assert!(outcome
        .results
        .iter()
        .all(|r| r.metadata.get("language").map(String::as_str) == Some("python")));
}
