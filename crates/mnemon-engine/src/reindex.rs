//! Diff-aware reindexing: walk, digest, chunk, embed, upsert. One
//! transaction per file, sorted path order, cooperative cancellation.

use std::path::{Path, PathBuf};

use chrono::Utc;
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use tracing::{debug, warn};

use mnemon_chunker::Chunker;
use mnemon_core::constants::DIGEST_CACHE_FILE;
use mnemon_core::memory::NewMemory;
use mnemon_core::models::IndexReport;
use mnemon_core::traits::EmbeddingProvider;
use mnemon_core::{CancelToken, MnemonError, MnemonResult};
use mnemon_storage::digest_cache::{self, DigestCache, DigestEntry};

use crate::engine::Mnemon;

#[derive(Debug, Clone)]
pub struct IndexOptions {
    /// File or directory to index; defaults to the project root.
    pub path: Option<PathBuf>,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    /// Skip files whose (sha256, size, mtime) match the digest cache.
    pub diff: bool,
    /// Symbol-aware AST chunking (whole-file chunks otherwise).
    pub symbols: bool,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            path: None,
            include: Vec::new(),
            exclude: Vec::new(),
            diff: false,
            symbols: true,
        }
    }
}

impl Mnemon {
    pub fn index_code(
        &self,
        options: &IndexOptions,
        token: &CancelToken,
    ) -> MnemonResult<IndexReport> {
        self.run_reindex("index-code", options, token)
    }

    /// Forced reindex of a single file (no diff skip).
    pub fn reindex_file(&self, file: &Path, token: &CancelToken) -> MnemonResult<IndexReport> {
        let options = IndexOptions {
            path: Some(file.to_path_buf()),
            ..Default::default()
        };
        self.run_reindex("reindex-file", &options, token)
    }

    /// Forced reindex of a folder (no diff skip).
    pub fn reindex_folder(&self, folder: &Path, token: &CancelToken) -> MnemonResult<IndexReport> {
        let options = IndexOptions {
            path: Some(folder.to_path_buf()),
            ..Default::default()
        };
        self.run_reindex("reindex-folder", &options, token)
    }

    fn run_reindex(
        &self,
        command: &str,
        options: &IndexOptions,
        token: &CancelToken,
    ) -> MnemonResult<IndexReport> {
        let scan_root = match &options.path {
            Some(p) if p.is_absolute() => p.clone(),
            Some(p) => self.project_root.join(p),
            None => self.project_root.clone(),
        };

        let mut argv = vec![command.to_string(), scan_root.to_string_lossy().to_string()];
        argv.extend(options.include.iter().cloned());
        argv.extend(options.exclude.iter().cloned());

        self.run_op(command, argv, vec![scan_root.clone()], |_scope| {
            let include = build_globset(&options.include)?;
            let exclude = build_globset(&options.exclude)?;
            let files = collect_files(&scan_root, &self.project_root, include.as_ref(), exclude.as_ref())?;
            debug!(files = files.len(), root = %scan_root.display(), "reindex scan complete");

            let chunker = Chunker::new(&self.config.chunker);
            let cache_path = self.store.store_dir().join(DIGEST_CACHE_FILE);
            let mut cache = DigestCache::load(&cache_path);
            let mut report = IndexReport::default();
            let embed = self.embedder.is_available();

            let outcome = self.reindex_files(
                &files,
                options,
                token,
                &chunker,
                embed,
                &mut cache,
                &mut report,
            );
            // Entries for committed files are valid even when a later file
            // cancelled or failed.
            cache.save(&cache_path)?;
            outcome?;

            let detail = serde_json::to_value(&report).unwrap_or_default();
            Ok((report, detail))
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn reindex_files(
        &self,
        files: &[PathBuf],
        options: &IndexOptions,
        token: &CancelToken,
        chunker: &Chunker,
        embed: bool,
        cache: &mut DigestCache,
        report: &mut IndexReport,
    ) -> MnemonResult<()> {
        for file in files {
            token.checkpoint()?;
            report.files_seen += 1;

            let rel = file
                .strip_prefix(&self.project_root)
                .unwrap_or(file)
                .to_string_lossy()
                .replace('\\', "/");
            let (sha256, size, mtime) = digest_cache::file_digest(file)?;
            if options.diff && cache.is_unchanged(&rel, &sha256, size, mtime) {
                report.files_skipped_unchanged += 1;
                continue;
            }

            let chunks = if options.symbols {
                chunker.chunk_file(file, &self.project_root)?
            } else {
                chunker.chunk_file_plain(file, &self.project_root)?
            };

            token.checkpoint()?;
            let vectors: Vec<Option<Vec<f32>>> = if embed && !chunks.is_empty() {
                let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
                self.embedder
                    .embed_batch(&texts)?
                    .into_iter()
                    .map(Some)
                    .collect()
            } else {
                vec![None; chunks.len()]
            };

            let items: Vec<(NewMemory, Option<Vec<f32>>)> = chunks
                .iter()
                .zip(vectors)
                .map(|(chunk, vector)| {
                    let kind = if chunk.symbol_name.is_some() {
                        "symbol"
                    } else {
                        "code"
                    };
                    let new = NewMemory {
                        content: chunk.text.clone(),
                        context: "code".to_string(),
                        kind: kind.to_string(),
                        tags: Vec::new(),
                        metadata: chunk.to_metadata(),
                    };
                    (new, vector)
                })
                .collect();

            token.checkpoint()?;
            let upsert = self.store.upsert_file_memories(&rel, &items)?;
            self.with_index(|index| {
                for (slot, (_, vector)) in items.iter().enumerate() {
                    if let Some(v) = vector {
                        index.add(upsert.ids[slot], v)?;
                    }
                }
                for id in &upsert.deleted_ids {
                    index.remove(*id)?;
                }
                Ok(())
            })?;

            report.files_indexed += 1;
            report.chunks_indexed += items.len();
            report.chunks_embedded += items.iter().filter(|(_, v)| v.is_some()).count();
            report.memories_deleted += upsert.deleted_ids.len();

            // Only after the transaction committed.
            cache.insert(
                rel,
                DigestEntry {
                    sha256,
                    size,
                    mtime,
                    last_indexed_at: Utc::now(),
                },
            );
        }
        Ok(())
    }
}

fn build_globset(patterns: &[String]) -> MnemonResult<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| MnemonError::InvalidInput {
            message: format!("glob `{pattern}` did not parse: {e}"),
        })?;
        builder.add(glob);
    }
    let set = builder
        .build()
        .map_err(|e| MnemonError::InvalidInput {
            message: format!("glob set did not build: {e}"),
        })?;
    Ok(Some(set))
}

/// Enumerate candidate files in sorted path order so runs (and their
/// receipts) are reproducible. Hidden files and ignore rules are honored,
/// which also keeps `.store` out of its own index.
fn collect_files(
    scan_root: &Path,
    project_root: &Path,
    include: Option<&GlobSet>,
    exclude: Option<&GlobSet>,
) -> MnemonResult<Vec<PathBuf>> {
    if scan_root.is_file() {
        return Ok(vec![scan_root.to_path_buf()]);
    }

    let mut files = Vec::new();
    for entry in WalkBuilder::new(scan_root).build() {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }
        let path = entry.into_path();
        let rel = path
            .strip_prefix(project_root)
            .unwrap_or(&path)
            .to_string_lossy()
            .replace('\\', "/");
        if let Some(inc) = include {
            if !inc.is_match(&rel) {
                continue;
            }
        }
        if let Some(exc) = exclude {
            if exc.is_match(&rel) {
                continue;
            }
        }
        files.push(path);
    }
    files.sort();
    Ok(files)
}
