//! The Mnemon engine: one struct owning the store, vector index, embedding
//! adapter, and policy surfaces; one method per command, each wrapped by
//! the guard and finished with a receipt.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{Duration, Utc};
use serde_json::json;
use tracing::info;

use mnemon_bundle::{export_bundle, import_bundle, BundleKind, ExportOptions};
use mnemon_core::config::MnemonConfig;
use mnemon_core::constants::{DIGEST_CACHE_FILE, MODELS_DIR, VECTOR_EXT_DIR};
use mnemon_core::memory::{ConversationMessage, NewMemory};
use mnemon_core::models::{
    BundleManifest, DoctorReport, GcReport, OfflineProof, PolicyConfig, StatusReport, VerifyReport,
};
use mnemon_core::traits::{EmbeddingProvider, VectorIndex};
use mnemon_core::{
    CancelToken, MnemonError, MnemonResult, SearchFilters, SearchMode,
};
use mnemon_embeddings::EmbeddingAdapter;
use mnemon_index::open_best;
use mnemon_policy::{prove_offline, Guard, GuardScope, Journal, PolicyStore, ReceiptSink};
use mnemon_retrieval::{SearchEngine, SearchOutcome};
use mnemon_storage::digest_cache::DigestCache;
use mnemon_storage::{PassphraseSource, Store};

#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: String,
    pub mode: SearchMode,
    pub filters: SearchFilters,
    pub k: usize,
    pub preview_lines: Option<usize>,
    pub trace: bool,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            mode: SearchMode::default(),
            filters: SearchFilters::default(),
            k: 5,
            preview_lines: None,
            trace: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GcOptions {
    pub prune_vectors: bool,
    pub drop_stale_digests: bool,
    pub vacuum: bool,
}

pub struct Mnemon {
    pub(crate) project_root: PathBuf,
    pub(crate) config: MnemonConfig,
    pub(crate) store: Store,
    index: Mutex<Box<dyn VectorIndex>>,
    backend: String,
    probe_note: Option<String>,
    pub(crate) embedder: EmbeddingAdapter,
    policy_store: PolicyStore,
    sink: ReceiptSink,
    journal: Journal,
}

impl Mnemon {
    /// Open the engine against `<project_root>/.store` with the
    /// machine-bound key.
    pub fn open(project_root: &Path, config: MnemonConfig) -> MnemonResult<Self> {
        Self::open_with(project_root, PassphraseSource::MachineBound, config)
    }

    pub fn open_with(
        project_root: &Path,
        passphrase: PassphraseSource,
        config: MnemonConfig,
    ) -> MnemonResult<Self> {
        let store = Store::open(project_root, passphrase, &config)?;
        let dims = store
            .embedding_dim()?
            .unwrap_or(config.embedding.dimensions);

        let probe = open_best(store.store_dir(), dims);
        let mut index = probe.index;
        index.init()?;
        for (id, vector) in store.all_embeddings()? {
            index.add(id, &vector)?;
        }
        info!(backend = %probe.backend, dims, "vector index ready");

        let embedder = EmbeddingAdapter::new(store.store_dir(), config.embedding.clone())?;
        let sink = ReceiptSink::new(store.store_dir())?;
        let journal = Journal::new(store.store_dir());
        let policy_store = PolicyStore::new(store.store_dir());

        Ok(Self {
            project_root: project_root.to_path_buf(),
            config,
            store,
            index: Mutex::new(index),
            backend: probe.backend,
            probe_note: probe.note,
            embedder,
            policy_store,
            sink,
            journal,
        })
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn vector_backend(&self) -> &str {
        &self.backend
    }

    /// Run `f` inside a guard scope for `command`, finishing the receipt on
    /// both exit paths.
    pub(crate) fn run_op<T>(
        &self,
        command: &str,
        argv: Vec<String>,
        touched: Vec<PathBuf>,
        f: impl FnOnce(&mut GuardScope) -> MnemonResult<(T, serde_json::Value)>,
    ) -> MnemonResult<T> {
        let policy = self.policy_store.load()?;
        let mut scope = Guard::enter(
            command,
            &argv,
            &touched,
            &policy,
            self.store.store_dir(),
            &self.sink,
            &self.journal,
        )?;
        match f(&mut scope) {
            Ok((value, detail)) => {
                scope.finish(detail);
                Ok(value)
            }
            Err(e) => {
                scope.fail(&e);
                Err(e)
            }
        }
    }

    pub(crate) fn with_index<T>(
        &self,
        f: impl FnOnce(&mut dyn VectorIndex) -> MnemonResult<T>,
    ) -> MnemonResult<T> {
        let mut guard = self
            .index
            .lock()
            .map_err(|_| MnemonError::internal("vector index mutex poisoned"))?;
        f(guard.as_mut())
    }

    /// Recreate the index from stored embeddings (doctor, import).
    pub(crate) fn reset_index(&self) -> MnemonResult<()> {
        let dims = self
            .store
            .embedding_dim()?
            .unwrap_or(self.config.embedding.dimensions);
        let probe = open_best(self.store.store_dir(), dims);
        let mut fresh = probe.index;
        fresh.init()?;
        for (id, vector) in self.store.all_embeddings()? {
            fresh.add(id, &vector)?;
        }
        let mut guard = self
            .index
            .lock()
            .map_err(|_| MnemonError::internal("vector index mutex poisoned"))?;
        *guard = fresh;
        Ok(())
    }

    // ── commands ─────────────────────────────────────────────────────────

    /// Create the on-disk layout and persist the default policy.
    pub fn init(&self) -> MnemonResult<StatusReport> {
        self.run_op("init", vec!["init".to_string()], vec![], |_scope| {
            std::fs::create_dir_all(self.store.store_dir().join(MODELS_DIR))?;
            std::fs::create_dir_all(self.store.store_dir().join(VECTOR_EXT_DIR))?;
            let policy = self.policy_store.load()?;
            if !self.policy_store.path().exists() {
                self.policy_store.save(&policy)?;
            }
            let status = self.store.status(&self.backend, policy.network_egress)?;
            let detail = json!({
                "status": serde_json::to_value(&status).unwrap_or_default(),
                "vector_backend_note": self.probe_note,
            });
            Ok((status, detail))
        })
    }

    pub fn status(&self) -> MnemonResult<StatusReport> {
        self.run_op("status", vec!["status".to_string()], vec![], |_scope| {
            let policy = self.policy_store.load()?;
            let status = self.store.status(&self.backend, policy.network_egress)?;
            let detail = serde_json::to_value(&status).unwrap_or_default();
            Ok((status, detail))
        })
    }

    /// Store a memory; embeds it when a provider is available. Returns
    /// `(id, created)`; re-remembering identical content is idempotent.
    pub fn remember(
        &self,
        content: &str,
        context: Option<&str>,
        kind: Option<&str>,
        tags: Vec<String>,
    ) -> MnemonResult<(i64, bool)> {
        let argv = vec![
            "remember".to_string(),
            content.to_string(),
            context.unwrap_or_default().to_string(),
            kind.unwrap_or_default().to_string(),
        ];
        self.run_op("remember", argv, vec![], |scope| {
            let mut new = NewMemory::new(content);
            if let Some(c) = context {
                new.context = c.to_string();
            }
            if let Some(k) = kind {
                new.kind = k.to_string();
            }
            new.tags = tags;

            let (id, created) = self.store.insert_memory(&new)?;
            if self.embedder.is_available() && self.store.get_embedding(id)?.is_none() {
                let vector = self.embedder.embed(&new.content)?;
                self.store.put_embedding(id, &vector)?;
                self.with_index(|index| index.add(id, &vector))?;
            }
            scope.record_affected(format!("memory:{id}"), new.content_hash());
            Ok(((id, created), json!({ "id": id, "created": created })))
        })
    }

    /// Search. The receipt records the query digest (never the plaintext),
    /// mode, k, and result ids; `trace` adds per-candidate scores.
    pub fn search(&self, request: &SearchRequest) -> MnemonResult<SearchOutcome> {
        let argv = vec![
            "search".to_string(),
            request.query.clone(),
            request.mode.as_str().to_string(),
            request.k.to_string(),
        ];
        self.run_op("search", argv, vec![], |_scope| {
            let preview = request
                .preview_lines
                .unwrap_or(self.config.search.default_preview_lines);
            let index = self
                .index
                .lock()
                .map_err(|_| MnemonError::internal("vector index mutex poisoned"))?;
            let engine = SearchEngine::new(
                &self.store,
                &**index,
                &self.embedder,
                self.config.search.clone(),
            );
            let outcome = engine.search(
                &request.query,
                request.mode,
                &request.filters,
                request.k,
                preview,
                request.trace,
            )?;

            let ids: Vec<i64> = outcome.results.iter().map(|r| r.id).collect();
            let mut detail = json!({
                "query_sha256": mnemon_policy::sha256_hex(request.query.as_bytes()),
                "mode": request.mode.as_str(),
                "k": request.k,
                "result_ids": ids,
            });
            if let Some(trace) = &outcome.trace {
                detail["trace"] = serde_json::to_value(trace).unwrap_or_default();
            }
            Ok((outcome, detail))
        })
    }

    pub fn record_conversation(
        &self,
        assistant_name: &str,
        context: BTreeMap<String, String>,
        messages: Vec<ConversationMessage>,
        outcomes: Vec<String>,
    ) -> MnemonResult<i64> {
        let argv = vec!["record-conversation".to_string(), assistant_name.to_string()];
        self.run_op("record-conversation", argv, vec![], |_scope| {
            let id = self
                .store
                .record_conversation(assistant_name, &context, &messages, &outcomes)?;
            Ok((id, json!({ "conversation_id": id, "messages": messages.len() })))
        })
    }

    /// Drop orphan embeddings and stale digests, compact the database.
    pub fn gc(&self, options: &GcOptions) -> MnemonResult<GcReport> {
        let argv = vec!["gc".to_string()];
        self.run_op("gc", argv, vec![], |_scope| {
            let mut report = GcReport::default();
            if options.prune_vectors {
                report.orphan_embeddings_dropped = self.store.drop_orphan_embeddings()?;
            }
            if options.drop_stale_digests {
                let path = self.store.store_dir().join(DIGEST_CACHE_FILE);
                let mut cache = DigestCache::load(&path);
                report.stale_digests_dropped = cache.prune_missing(&self.project_root);
                cache.save(&path)?;
            }
            if options.vacuum {
                self.store.vacuum()?;
                report.vacuumed = true;
            }
            let detail = serde_json::to_value(&report).unwrap_or_default();
            Ok((report, detail))
        })
    }

    /// Integrity check, rebuilding from an empty schema on corruption.
    pub fn db_doctor(&mut self) -> MnemonResult<DoctorReport> {
        let policy = self.policy_store.load()?;
        let scope = Guard::enter(
            "db-doctor",
            &["db-doctor".to_string()],
            &[],
            &policy,
            self.store.store_dir(),
            &self.sink,
            &self.journal,
        )?;
        match self.store.doctor() {
            Ok(report) => {
                scope.finish(serde_json::to_value(&report).unwrap_or_default());
                if report.rebuilt {
                    self.reset_index()?;
                }
                Ok(report)
            }
            Err(e) => {
                scope.fail(&e);
                Err(e)
            }
        }
    }

    /// Export a signed, checksummed context bundle.
    pub fn export_context(
        &self,
        out: &Path,
        kind: &str,
        zip: bool,
        sign: bool,
        token: &CancelToken,
    ) -> MnemonResult<BundleManifest> {
        let options = ExportOptions {
            kind: BundleKind::parse(kind)?,
            zip,
            sign,
        };
        let argv = vec![
            "export-context".to_string(),
            out.to_string_lossy().to_string(),
            kind.to_string(),
        ];
        self.run_op(
            "export-context",
            argv,
            vec![out.to_path_buf()],
            |scope| {
                token.checkpoint()?;
                let manifest = export_bundle(&self.store, out, &options)?;
                for (name, sha) in &manifest.checksums {
                    scope.record_affected(name.clone(), sha.clone());
                }
                let detail = serde_json::to_value(&manifest).unwrap_or_default();
                Ok((manifest, detail))
            },
        )
    }

    /// Verify and merge a bundle; refuses on any integrity or signature
    /// mismatch with nothing written. Emits a verify-report receipt.
    pub fn import_context(&self, bundle: &Path) -> MnemonResult<VerifyReport> {
        let argv = vec![
            "import-context".to_string(),
            bundle.to_string_lossy().to_string(),
        ];
        self.run_op(
            "import-context",
            argv,
            vec![bundle.to_path_buf()],
            |_scope| {
                let report = import_bundle(&self.store, bundle)?;
                if report.vectors_imported > 0 {
                    self.reset_index()?;
                }
                let detail = json!({
                    "verify_report": serde_json::to_value(&report).unwrap_or_default(),
                });
                Ok((report, detail))
            },
        )
    }

    /// Structured attestation of the offline posture.
    pub fn prove_offline(&self) -> MnemonResult<OfflineProof> {
        self.run_op(
            "prove-offline",
            vec!["prove-offline".to_string()],
            vec![],
            |_scope| {
                let policy = self.policy_store.load()?;
                let proof = prove_offline(&policy);
                let detail = serde_json::to_value(&proof).unwrap_or_default();
                Ok((proof, detail))
            },
        )
    }

    // ── policy commands ──────────────────────────────────────────────────

    pub fn policy_status(&self) -> MnemonResult<PolicyConfig> {
        self.run_op(
            "policy",
            vec!["policy".to_string(), "status".to_string()],
            vec![],
            |_scope| {
                let policy = self.policy_store.load()?;
                let detail = serde_json::to_value(&policy).unwrap_or_default();
                Ok((policy, detail))
            },
        )
    }

    pub fn policy_allow_command(&self, command: &str) -> MnemonResult<PolicyConfig> {
        let argv = vec![
            "policy".to_string(),
            "allow-command".to_string(),
            command.to_string(),
        ];
        self.run_op("policy", argv, vec![], |_scope| {
            let mut policy = self.policy_store.load()?;
            policy.allowed_commands.insert(command.to_string());
            self.policy_store.save(&policy)?;
            Ok((policy, json!({ "allowed_command": command })))
        })
    }

    pub fn policy_allow_path(&self, glob: &str) -> MnemonResult<PolicyConfig> {
        let argv = vec![
            "policy".to_string(),
            "allow-path".to_string(),
            glob.to_string(),
        ];
        self.run_op("policy", argv, vec![], |_scope| {
            globset::Glob::new(glob).map_err(|e| MnemonError::InvalidInput {
                message: format!("glob `{glob}` did not parse: {e}"),
            })?;
            let mut policy = self.policy_store.load()?;
            if !policy.allowed_paths.contains(&glob.to_string()) {
                policy.allowed_paths.push(glob.to_string());
            }
            self.policy_store.save(&policy)?;
            Ok((policy, json!({ "allowed_path": glob })))
        })
    }

    /// Grant a time-bounded trust token for a command (or `egress`).
    pub fn policy_trust(&self, target: &str, ttl_minutes: i64) -> MnemonResult<PolicyConfig> {
        let argv = vec![
            "policy".to_string(),
            "trust".to_string(),
            target.to_string(),
            ttl_minutes.to_string(),
        ];
        self.run_op("policy", argv, vec![], |_scope| {
            if ttl_minutes <= 0 {
                return Err(MnemonError::InvalidInput {
                    message: "trust ttl must be positive".to_string(),
                });
            }
            let mut policy = self.policy_store.load()?;
            let expiry = Utc::now() + Duration::minutes(ttl_minutes);
            policy.trust_tokens.insert(target.to_string(), expiry);
            self.policy_store.save(&policy)?;
            Ok((
                policy,
                json!({ "trusted": target, "expires_at": expiry.to_rfc3339() }),
            ))
        })
    }

    /// Consistency check over the policy: prunes expired tokens, flags
    /// unparseable globs and a permissive egress stance.
    pub fn policy_doctor(&self) -> MnemonResult<Vec<String>> {
        self.run_op(
            "policy",
            vec!["policy".to_string(), "doctor".to_string()],
            vec![],
            |_scope| {
                let mut policy = self.policy_store.load()?;
                let mut findings = Vec::new();

                let pruned = policy.prune_expired(Utc::now());
                if pruned > 0 {
                    findings.push(format!("pruned {pruned} expired trust tokens"));
                }
                for glob in &policy.allowed_paths {
                    if globset::Glob::new(glob).is_err() {
                        findings.push(format!("allow-path glob `{glob}` does not parse"));
                    }
                }
                if policy.network_egress {
                    findings.push("network_egress is enabled; this engine is meant to run air-gapped".to_string());
                }
                self.policy_store.save(&policy)?;
                let detail = json!({ "findings": findings.clone() });
                Ok((findings, detail))
            },
        )
    }
}
