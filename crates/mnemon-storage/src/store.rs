//! The Store facade: owns the connection pool, the writer lock, and the
//! secret scanner; exposes the storage contract to the rest of the engine.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::Connection;

use mnemon_core::config::MnemonConfig;
use mnemon_core::constants::{DB_FILE, LOCK_FILE, STORE_DIR};
use mnemon_core::errors::{MnemonError, StorageError};
use mnemon_core::memory::{Conversation, ConversationMessage, Memory, NewMemory};
use mnemon_core::models::{DoctorReport, StatusReport};
use mnemon_core::traits::MemoryReader;
use mnemon_core::MnemonResult;

use crate::crypto::{self, PassphraseSource};
use crate::lock::StoreLock;
use crate::pool::ConnectionPool;
use crate::queries::{conversation_ops, embedding_ops, maintenance, memory_crud, memory_search};
use crate::retry::with_retry;
use crate::secret_scan::SecretScanner;

const READ_POOL_SIZE: usize = 4;

/// Outcome of a per-file reindex upsert.
#[derive(Debug, Default, Clone)]
pub struct FileUpsert {
    /// Ids for every chunk of the file, in chunk order.
    pub ids: Vec<i64>,
    /// Ids of memories deleted because the file no longer produces them.
    pub deleted_ids: Vec<i64>,
    pub created: usize,
    pub refreshed: usize,
    pub embedded: usize,
}

pub struct Store {
    store_dir: PathBuf,
    db_path: PathBuf,
    passphrase: String,
    pool: Option<ConnectionPool>,
    scanner: SecretScanner,
    max_content_chars: usize,
    bm25_weights: [f64; 4],
    _lock: StoreLock,
}

impl Store {
    /// Open (or create) the encrypted database under `<root>/.store/db`,
    /// acquiring the exclusive writer lock and running migrations.
    pub fn open(
        project_root: &Path,
        passphrase_source: PassphraseSource,
        config: &MnemonConfig,
    ) -> MnemonResult<Self> {
        let store_dir = project_root.join(STORE_DIR);
        fs::create_dir_all(&store_dir)?;

        let lock = StoreLock::acquire(&store_dir.join(LOCK_FILE))?;
        let passphrase = crypto::resolve_passphrase(&store_dir, &passphrase_source)?;
        let db_path = store_dir.join(DB_FILE);

        let pool = ConnectionPool::open(&db_path, &passphrase, READ_POOL_SIZE)?;

        tracing::info!(db = %db_path.display(), "store opened");
        Ok(Self {
            store_dir,
            db_path,
            passphrase,
            pool: Some(pool),
            scanner: SecretScanner::new(&config.store),
            max_content_chars: config.store.max_content_chars,
            bm25_weights: config.search.bm25_weights,
            _lock: lock,
        })
    }

    pub fn store_dir(&self) -> &Path {
        &self.store_dir
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn pool(&self) -> MnemonResult<&ConnectionPool> {
        self.pool
            .as_ref()
            .ok_or_else(|| MnemonError::internal("connection pool not available"))
    }

    fn with_writer<F, T>(&self, f: F) -> MnemonResult<T>
    where
        F: Fn(&Connection) -> MnemonResult<T>,
    {
        let pool = self.pool()?;
        with_retry(|| pool.writer.with_conn(&f))
    }

    fn with_reader<F, T>(&self, f: F) -> MnemonResult<T>
    where
        F: FnOnce(&Connection) -> MnemonResult<T>,
    {
        self.pool()?.readers.with_conn(f)
    }

    /// Validate content limits and the secret gate.
    fn validate(&self, new: &NewMemory) -> MnemonResult<()> {
        let length = new.content.chars().count();
        if length > self.max_content_chars {
            return Err(StorageError::InputTooLarge {
                length,
                max: self.max_content_chars,
            }
            .into());
        }
        if let Some(pattern) = self.scanner.scan(&new.content) {
            return Err(StorageError::SecretDetected { pattern }.into());
        }
        Ok(())
    }

    /// Insert a memory. Returns `(id, created)`; duplicate content resolves
    /// to the existing id with `created = false`.
    pub fn insert_memory(&self, new: &NewMemory) -> MnemonResult<(i64, bool)> {
        self.validate(new)?;
        self.with_writer(|conn| memory_crud::insert_memory(conn, new))
    }

    pub fn get(&self, id: i64) -> MnemonResult<Option<Memory>> {
        self.with_reader(|conn| memory_crud::get_memory(conn, id))
    }

    pub fn get_by_hash(&self, content_hash: &str) -> MnemonResult<Option<Memory>> {
        self.with_reader(|conn| memory_crud::get_memory_by_hash(conn, content_hash))
    }

    pub fn delete_memory(&self, id: i64) -> MnemonResult<()> {
        self.with_writer(|conn| memory_crud::delete_memory(conn, id))
    }

    pub fn memories_by_kinds(&self, kinds: Option<&[&str]>) -> MnemonResult<Vec<Memory>> {
        self.with_reader(|conn| memory_crud::memories_by_kinds(conn, kinds))
    }

    pub fn put_embedding(&self, id: i64, vector: &[f32]) -> MnemonResult<()> {
        self.with_writer(|conn| embedding_ops::put_embedding(conn, id, vector))
    }

    pub fn get_embedding(&self, id: i64) -> MnemonResult<Option<Vec<f32>>> {
        self.with_reader(|conn| embedding_ops::get_embedding(conn, id))
    }

    pub fn all_embeddings(&self) -> MnemonResult<Vec<(i64, Vec<f32>)>> {
        self.with_reader(embedding_ops::all_embeddings)
    }

    pub fn embedding_dim(&self) -> MnemonResult<Option<usize>> {
        self.with_reader(embedding_ops::pinned_dimension)
    }

    /// Reindex upsert for one file, in a single transaction: same-hash
    /// memories stay id-stable with refreshed metadata; memories whose hash
    /// is no longer produced by the file are deleted with their embeddings.
    pub fn upsert_file_memories(
        &self,
        file: &str,
        items: &[(NewMemory, Option<Vec<f32>>)],
    ) -> MnemonResult<FileUpsert> {
        for (new, _) in items {
            self.validate(new)?;
        }
        self.with_writer(|conn| {
            let tx = conn
                .unchecked_transaction()
                .map_err(|e| crate::to_storage_err(format!("reindex begin: {e}")))?;

            let result = (|| {
                let mut report = FileUpsert::default();
                let existing = memory_crud::memories_for_file(&tx, file)?;
                let new_hashes: std::collections::BTreeSet<String> =
                    items.iter().map(|(n, _)| n.content_hash()).collect();

                for (new, vector) in items {
                    let (id, created) = memory_crud::insert_memory_inner(&tx, new)?;
                    if created {
                        report.created += 1;
                    } else {
                        memory_crud::update_tags_metadata(&tx, id, &new.tags, &new.metadata)?;
                        report.refreshed += 1;
                    }
                    if let Some(v) = vector {
                        embedding_ops::put_embedding(&tx, id, v)?;
                        report.embedded += 1;
                    }
                    report.ids.push(id);
                }

                for (id, hash) in &existing {
                    if !new_hashes.contains(hash) {
                        memory_crud::delete_memory(&tx, *id)?;
                        report.deleted_ids.push(*id);
                    }
                }
                Ok(report)
            })();

            match result {
                Ok(report) => {
                    tx.commit()
                        .map_err(|e| crate::to_storage_err(format!("reindex commit: {e}")))?;
                    Ok(report)
                }
                Err(e) => {
                    let _ = tx.rollback();
                    Err(e)
                }
            }
        })
    }

    /// Bundle-import merge in one transaction: absent hashes insert, present
    /// hashes union tags/metadata, vectors follow their memory.
    /// Returns `(new, merged, vectors)`.
    pub fn merge_imported(
        &self,
        items: &[(NewMemory, Option<Vec<f32>>)],
    ) -> MnemonResult<(usize, usize, usize)> {
        for (new, _) in items {
            self.validate(new)?;
        }
        self.with_writer(|conn| {
            let tx = conn
                .unchecked_transaction()
                .map_err(|e| crate::to_storage_err(format!("import begin: {e}")))?;

            let result = (|| {
                let mut created = 0usize;
                let mut merged = 0usize;
                let mut vectors = 0usize;
                for (new, vector) in items {
                    let hash = new.content_hash();
                    let id = match memory_crud::get_memory_by_hash(&tx, &hash)? {
                        Some(existing) => {
                            let mut tags = existing.tags.clone();
                            for t in &new.tags {
                                if !tags.contains(t) {
                                    tags.push(t.clone());
                                }
                            }
                            let mut metadata = existing.metadata.clone();
                            for (k, v) in &new.metadata {
                                metadata.insert(k.clone(), v.clone());
                            }
                            memory_crud::update_tags_metadata(&tx, existing.id, &tags, &metadata)?;
                            merged += 1;
                            existing.id
                        }
                        None => {
                            let (id, _) = memory_crud::insert_memory_inner(&tx, new)?;
                            created += 1;
                            id
                        }
                    };
                    if let Some(v) = vector {
                        embedding_ops::put_embedding(&tx, id, v)?;
                        vectors += 1;
                    }
                }
                Ok((created, merged, vectors))
            })();

            match result {
                Ok(r) => {
                    tx.commit()
                        .map_err(|e| crate::to_storage_err(format!("import commit: {e}")))?;
                    Ok(r)
                }
                Err(e) => {
                    let _ = tx.rollback();
                    Err(e)
                }
            }
        })
    }

    pub fn record_conversation(
        &self,
        assistant_name: &str,
        context: &BTreeMap<String, String>,
        messages: &[ConversationMessage],
        outcomes: &[String],
    ) -> MnemonResult<i64> {
        self.with_writer(|conn| {
            conversation_ops::record_conversation(conn, assistant_name, context, messages, outcomes)
        })
    }

    pub fn list_conversations(&self, limit: usize) -> MnemonResult<Vec<Conversation>> {
        self.with_reader(|conn| conversation_ops::list_conversations(conn, limit))
    }

    /// Drop embeddings without a memory. Returns count dropped.
    pub fn drop_orphan_embeddings(&self) -> MnemonResult<usize> {
        self.with_writer(|conn| embedding_ops::drop_orphans(conn))
    }

    pub fn vacuum(&self) -> MnemonResult<()> {
        self.with_writer(|conn| {
            maintenance::wal_checkpoint(conn)?;
            maintenance::full_vacuum(conn)
        })
    }

    /// Integrity check; on corruption, quarantine the file and rebuild an
    /// empty database of the same schema, reporting the loss.
    pub fn doctor(&mut self) -> MnemonResult<DoctorReport> {
        let healthy = self
            .with_writer(maintenance::integrity_check)
            .unwrap_or(false);
        if healthy {
            return Ok(DoctorReport {
                healthy: true,
                rebuilt: false,
                backup_path: None,
                memories_lost: 0,
            });
        }

        let lost = self
            .with_reader(memory_crud::count_memories)
            .unwrap_or(0);

        // Close every connection before touching the file.
        self.pool = None;
        let backup = crate::recovery::quarantine(&self.db_path)?;

        let pool = ConnectionPool::open(&self.db_path, &self.passphrase, READ_POOL_SIZE)?;
        self.pool = Some(pool);

        tracing::warn!(backup = %backup.display(), lost, "database rebuilt after corruption");
        Ok(DoctorReport {
            healthy: false,
            rebuilt: true,
            backup_path: Some(backup.display().to_string()),
            memories_lost: lost,
        })
    }

    pub fn status(&self, vector_backend: &str, network_egress: bool) -> MnemonResult<StatusReport> {
        let (memories, embeddings, conversations, by_kind, embedding_dim) =
            self.with_reader(|conn| {
                Ok((
                    memory_crud::count_memories(conn)?,
                    embedding_ops::count_embeddings(conn)?,
                    conversation_ops::count_conversations(conn)?,
                    memory_crud::count_by_kind(conn)?,
                    embedding_ops::pinned_dimension(conn)?,
                ))
            })?;
        let db_bytes = fs::metadata(&self.db_path).map(|m| m.len()).unwrap_or(0);
        Ok(StatusReport {
            memories,
            embeddings,
            conversations,
            by_kind,
            db_bytes,
            vector_backend: vector_backend.to_string(),
            embedding_dim,
            policy_network_egress: network_egress,
        })
    }
}

impl MemoryReader for Store {
    fn fts_search(&self, query: &str, k: usize) -> MnemonResult<Vec<(i64, f64)>> {
        let weights = self.bm25_weights;
        self.with_reader(|conn| memory_search::fts_search(conn, query, k, &weights))
    }

    fn get_memory(&self, id: i64) -> MnemonResult<Option<Memory>> {
        self.get(id)
    }
}
