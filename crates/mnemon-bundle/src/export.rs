//! Bundle export. The final artifact appears only after every member file
//! is written and fsynced into a `.partial` staging path and renamed.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use mnemon_core::constants::{BUNDLE_EXT, BUNDLE_SCHEMA_VERSION};
use mnemon_core::errors::BundleError;
use mnemon_core::memory::{meta_keys, Memory};
use mnemon_core::models::{BundleCounts, BundleManifest};
use mnemon_core::{MnemonError, MnemonResult};
use mnemon_storage::crypto;
use mnemon_storage::Store;

use crate::csvmap::{self, MapRow};
use crate::files;
use crate::sign;
use crate::NoteRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleKind {
    Code,
    Notes,
    Mixed,
}

impl BundleKind {
    pub fn parse(s: &str) -> MnemonResult<Self> {
        match s {
            "code" => Ok(BundleKind::Code),
            "notes" => Ok(BundleKind::Notes),
            "mixed" => Ok(BundleKind::Mixed),
            other => Err(BundleError::Malformed {
                detail: format!("unknown bundle kind `{other}`"),
            }
            .into()),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BundleKind::Code => "code",
            BundleKind::Notes => "notes",
            BundleKind::Mixed => "mixed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub kind: BundleKind,
    pub zip: bool,
    pub sign: bool,
}

const CODE_KINDS: [&str; 2] = ["code", "symbol"];

/// Export the selected memories to `out` (canonical `.ctx` extension is
/// appended when missing). Returns the written manifest.
pub fn export_bundle(
    store: &Store,
    out: &Path,
    options: &ExportOptions,
) -> MnemonResult<BundleManifest> {
    let out = canonical_out(out);
    if out.exists() {
        return Err(MnemonError::Io(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("{} already exists", out.display()),
        )));
    }

    let memories = select(store, options.kind)?;
    let dims = store.embedding_dim()?;

    // Vector slots follow map.csv row order; memories without an embedding
    // hold a zero vector (skipped on import).
    let mut vectors: Vec<Option<Vec<f32>>> = Vec::with_capacity(memories.len());
    let mut vector_count = 0usize;
    for memory in &memories {
        let v = store.get_embedding(memory.id)?;
        if v.is_some() {
            vector_count += 1;
        }
        vectors.push(v);
    }
    let write_vectors = vector_count > 0 && dims.is_some();

    // Member files in layout order.
    let map_bytes = csvmap::write_rows(&memories.iter().map(map_row).collect::<Vec<_>>())
        .into_bytes();
    let notes_bytes = notes_jsonl(&memories)?;
    let vectors_bytes = write_vectors.then(|| vectors_f32(&vectors, dims.unwrap_or(0)));

    let mut checksums: BTreeMap<String, String> = BTreeMap::new();
    checksums.insert(files::MAP.into(), sha256(&map_bytes));
    checksums.insert(files::NOTES.into(), sha256(&notes_bytes));
    if let Some(bytes) = &vectors_bytes {
        checksums.insert(files::VECTORS.into(), sha256(bytes));
    }

    let manifest = BundleManifest {
        schema_version: BUNDLE_SCHEMA_VERSION,
        exporter_id: crypto::exporter_id(store.store_dir())?,
        created_at: Utc::now(),
        kind: options.kind.as_str().to_string(),
        counts: BundleCounts {
            memories: memories.len(),
            vectors: vector_count,
        },
        embedding_dim: write_vectors.then(|| dims.unwrap_or(0)),
        checksums: checksums.clone(),
    };
    let manifest_bytes = serde_json::to_vec_pretty(&manifest)
        .map_err(|e| MnemonError::internal(e.to_string()))?;
    checksums.insert(files::MANIFEST.into(), sha256(&manifest_bytes));

    let checksums_bytes = serde_json::to_vec_pretty(&checksums)
        .map_err(|e| MnemonError::internal(e.to_string()))?;

    let mut members: Vec<(&str, Vec<u8>)> = vec![
        (files::MANIFEST, manifest_bytes),
        (files::MAP, map_bytes),
        (files::NOTES, notes_bytes),
    ];
    if let Some(bytes) = vectors_bytes {
        members.push((files::VECTORS, bytes));
    }
    members.push((files::CHECKSUMS, checksums_bytes));

    if options.sign {
        let key = sign::load_or_generate_signing_key(store.store_dir())?;
        members.push((files::SIGNATURE, sign::sign_checksums(&key, &checksums)));
        members.push((files::PUBKEY, sign::public_key_pem(&key)?.into_bytes()));
    }

    if options.zip {
        write_zip(&out, &members)?;
    } else {
        write_dir(&out, &members)?;
    }

    tracing::info!(
        out = %out.display(),
        memories = manifest.counts.memories,
        vectors = manifest.counts.vectors,
        signed = options.sign,
        "bundle exported"
    );
    Ok(manifest)
}

fn canonical_out(out: &Path) -> PathBuf {
    match out.extension() {
        Some(_) => out.to_path_buf(),
        None => out.with_extension(BUNDLE_EXT),
    }
}

fn select(store: &Store, kind: BundleKind) -> MnemonResult<Vec<Memory>> {
    match kind {
        BundleKind::Code => store.memories_by_kinds(Some(&CODE_KINDS)),
        BundleKind::Mixed => store.memories_by_kinds(None),
        BundleKind::Notes => {
            let mut all = store.memories_by_kinds(None)?;
            all.retain(|m| !CODE_KINDS.contains(&m.kind.as_str()));
            Ok(all)
        }
    }
}

fn map_row(memory: &Memory) -> MapRow {
    let meta = |key: &str| memory.metadata.get(key).cloned().unwrap_or_default();
    MapRow {
        id: memory.id,
        content_hash: memory.content_hash.clone(),
        context: memory.context.clone(),
        kind: memory.kind.clone(),
        path: meta(meta_keys::FILE),
        language: meta(meta_keys::LANGUAGE),
        line_start: meta(meta_keys::LINE_START),
        line_end: meta(meta_keys::LINE_END),
        symbol_name: meta(meta_keys::SYMBOL_NAME),
        symbol_kind: meta(meta_keys::SYMBOL_KIND),
    }
}

fn notes_jsonl(memories: &[Memory]) -> MnemonResult<Vec<u8>> {
    let mut out = Vec::new();
    for memory in memories {
        let record = NoteRecord {
            content: memory.content.clone(),
            tags: memory.tags.clone(),
            metadata: memory.metadata.clone(),
            created_at: memory.created_at,
            content_hash: memory.content_hash.clone(),
        };
        let line =
            serde_json::to_string(&record).map_err(|e| MnemonError::internal(e.to_string()))?;
        out.extend_from_slice(line.as_bytes());
        out.push(b'\n');
    }
    Ok(out)
}

fn vectors_f32(vectors: &[Option<Vec<f32>>], dims: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(vectors.len() * dims * 4);
    let zero = vec![0.0f32; dims];
    for slot in vectors {
        let v = slot.as_deref().unwrap_or(&zero);
        for f in v {
            out.extend_from_slice(&f.to_le_bytes());
        }
    }
    out
}

fn sha256(bytes: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    hex::encode(Sha256::digest(bytes))
}

fn write_dir(out: &Path, members: &[(&str, Vec<u8>)]) -> MnemonResult<()> {
    let partial = staging_path(out);
    if partial.exists() {
        fs::remove_dir_all(&partial)?;
    }
    fs::create_dir_all(&partial)?;

    for (name, bytes) in members {
        let path = partial.join(name);
        let mut file = File::create(&path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(&partial, out)?;
    if let Some(parent) = out.parent() {
        if let Ok(dir) = File::open(parent) {
            let _ = dir.sync_all();
        }
    }
    Ok(())
}

fn write_zip(out: &Path, members: &[(&str, Vec<u8>)]) -> MnemonResult<()> {
    let partial = staging_path(out);
    if partial.exists() {
        fs::remove_file(&partial)?;
    }

    let file = File::create(&partial)?;
    let mut writer = ZipWriter::new(file);
    let options = SimpleFileOptions::default();
    for (name, bytes) in members {
        writer
            .start_file(*name, options)
            .map_err(|e| MnemonError::internal(format!("zip write: {e}")))?;
        writer.write_all(bytes)?;
    }
    let file = writer
        .finish()
        .map_err(|e| MnemonError::internal(format!("zip finish: {e}")))?;
    file.sync_all()?;
    fs::rename(&partial, out)?;
    Ok(())
}

fn staging_path(out: &Path) -> PathBuf {
    let name = out
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "bundle.ctx".to_string());
    out.with_file_name(format!(".{name}.partial"))
}
