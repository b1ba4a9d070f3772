//! Bundle import. Verification happens entirely before any write: every
//! checksum, the signature when present, and per-row hash consistency.
//! Merge is by content hash and idempotent.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};
use zip::ZipArchive;

use mnemon_core::errors::{BundleError, IndexError};
use mnemon_core::memory::{Memory, NewMemory};
use mnemon_core::models::{BundleManifest, SignatureReport, VerifyReport};
use mnemon_core::{MnemonError, MnemonResult};
use mnemon_storage::Store;

use crate::csvmap;
use crate::files;
use crate::sign;
use crate::NoteRecord;

/// Import a bundle (directory or zip archive; legacy extensions are
/// recognized by content, not name). Refuses on any mismatch, with nothing
/// written.
pub fn import_bundle(store: &Store, bundle_path: &Path) -> MnemonResult<VerifyReport> {
    let members = read_members(bundle_path)?;

    let checksums: BTreeMap<String, String> = parse_json(&members, files::CHECKSUMS)?;
    for required in [files::MANIFEST, files::MAP, files::NOTES] {
        if !checksums.contains_key(required) {
            return Err(BundleError::IntegrityMismatch {
                file: required.to_string(),
                detail: "missing from checksums.json".to_string(),
            }
            .into());
        }
    }
    for (name, expected) in &checksums {
        let Some(bytes) = members.get(name.as_str()) else {
            return Err(BundleError::IntegrityMismatch {
                file: name.clone(),
                detail: "listed in checksums.json but absent".to_string(),
            }
            .into());
        };
        let actual = hex::encode(Sha256::digest(bytes));
        if &actual != expected {
            return Err(BundleError::IntegrityMismatch {
                file: name.clone(),
                detail: "sha256 does not match checksums.json".to_string(),
            }
            .into());
        }
    }

    let signature = match members.get(files::SIGNATURE) {
        Some(sig_bytes) => {
            let pem = members.get(files::PUBKEY).ok_or_else(|| {
                MnemonError::Bundle(BundleError::SignatureInvalid {
                    reason: "signature.bin present without pubkey.pem".to_string(),
                })
            })?;
            let pem = String::from_utf8_lossy(pem);
            let fingerprint = sign::verify_checksums(&pem, &checksums, sig_bytes)?;
            tracing::info!(fingerprint, "bundle signature verified");
            Some(SignatureReport {
                verified: true,
                key_fingerprint: fingerprint,
            })
        }
        None => None,
    };

    let manifest: BundleManifest = parse_json(&members, files::MANIFEST)?;
    if manifest.schema_version > mnemon_core::constants::BUNDLE_SCHEMA_VERSION {
        return Err(BundleError::Malformed {
            detail: format!("unsupported schema version {}", manifest.schema_version),
        }
        .into());
    }

    let map_text = String::from_utf8_lossy(member(&members, files::MAP)?);
    let rows = csvmap::parse(&map_text)?;
    let notes = parse_notes(member(&members, files::NOTES)?)?;
    if rows.len() != notes.len() || rows.len() != manifest.counts.memories {
        return Err(BundleError::Malformed {
            detail: format!(
                "row counts disagree: map {}, notes {}, manifest {}",
                rows.len(),
                notes.len(),
                manifest.counts.memories
            ),
        }
        .into());
    }

    let vectors = decode_vectors(&members, &manifest, rows.len())?;
    if let (Some(bundle_dim), Some(store_dim)) = (manifest.embedding_dim, store.embedding_dim()?) {
        if vectors.is_some() && bundle_dim != store_dim {
            return Err(IndexError::DimensionMismatch {
                expected: store_dim,
                got: bundle_dim,
            }
            .into());
        }
    }

    // Assemble and cross-check rows against their content records.
    let mut items: Vec<(NewMemory, Option<Vec<f32>>)> = Vec::with_capacity(rows.len());
    for (i, (row, note)) in rows.iter().zip(notes.iter()).enumerate() {
        if row.content_hash != note.content_hash {
            return Err(integrity_row(i, "map.csv and notes.jsonl hashes disagree"));
        }
        let recomputed = Memory::compute_content_hash(&note.content, &row.context);
        if recomputed != row.content_hash {
            return Err(integrity_row(i, "content does not match its declared hash"));
        }
        let new = NewMemory {
            content: note.content.clone(),
            context: row.context.clone(),
            kind: row.kind.clone(),
            tags: note.tags.clone(),
            metadata: note.metadata.clone(),
        };
        let vector = vectors
            .as_ref()
            .and_then(|all| all.get(i).cloned())
            .flatten();
        items.push((new, vector));
    }

    let (memories_new, memories_merged, vectors_imported) = store.merge_imported(&items)?;

    Ok(VerifyReport {
        checksums_verified: checksums.len(),
        signature,
        memories_new,
        memories_merged,
        vectors_imported,
    })
}

fn integrity_row(index: usize, detail: &str) -> MnemonError {
    BundleError::IntegrityMismatch {
        file: files::NOTES.to_string(),
        detail: format!("row {}: {detail}", index + 1),
    }
    .into()
}

fn member<'a>(
    members: &'a BTreeMap<String, Vec<u8>>,
    name: &str,
) -> MnemonResult<&'a Vec<u8>> {
    members.get(name).ok_or_else(|| {
        BundleError::Malformed {
            detail: format!("bundle is missing {name}"),
        }
        .into()
    })
}

fn parse_json<T: serde::de::DeserializeOwned>(
    members: &BTreeMap<String, Vec<u8>>,
    name: &str,
) -> MnemonResult<T> {
    serde_json::from_slice(member(members, name)?).map_err(|e| {
        BundleError::Malformed {
            detail: format!("{name} did not parse: {e}"),
        }
        .into()
    })
}

fn parse_notes(bytes: &[u8]) -> MnemonResult<Vec<NoteRecord>> {
    let text = String::from_utf8_lossy(bytes);
    let mut notes = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        if line.is_empty() {
            continue;
        }
        let record: NoteRecord = serde_json::from_str(line).map_err(|e| {
            MnemonError::Bundle(BundleError::Malformed {
                detail: format!("notes.jsonl line {}: {e}", lineno + 1),
            })
        })?;
        notes.push(record);
    }
    Ok(notes)
}

/// Decode `vectors.f32` into per-row optional vectors (zero slots mean "no
/// embedding"). `None` when the bundle carries no vectors at all.
fn decode_vectors(
    members: &BTreeMap<String, Vec<u8>>,
    manifest: &BundleManifest,
    row_count: usize,
) -> MnemonResult<Option<Vec<Option<Vec<f32>>>>> {
    let Some(bytes) = members.get(files::VECTORS) else {
        return Ok(None);
    };
    let dims = manifest.embedding_dim.ok_or_else(|| {
        MnemonError::Bundle(BundleError::Malformed {
            detail: "vectors.f32 present but manifest has no embedding_dim".to_string(),
        })
    })?;
    let expected = row_count * dims * 4;
    if bytes.len() != expected {
        return Err(BundleError::IntegrityMismatch {
            file: files::VECTORS.to_string(),
            detail: format!("expected {expected} bytes, found {}", bytes.len()),
        }
        .into());
    }

    let mut out = Vec::with_capacity(row_count);
    for row in 0..row_count {
        let start = row * dims * 4;
        let mut v = Vec::with_capacity(dims);
        for chunk in bytes[start..start + dims * 4].chunks_exact(4) {
            v.push(f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
        }
        let norm: f32 = v.iter().map(|x| x * x).sum();
        out.push(if norm > 0.0 { Some(v) } else { None });
    }
    Ok(Some(out))
}

/// Read every member file from a bundle directory or zip archive.
fn read_members(path: &Path) -> MnemonResult<BTreeMap<String, Vec<u8>>> {
    if path.is_dir() {
        let mut members = BTreeMap::new();
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            if entry.path().is_file() {
                members.insert(
                    entry.file_name().to_string_lossy().to_string(),
                    fs::read(entry.path())?,
                );
            }
        }
        return Ok(members);
    }

    let file = File::open(path)?;
    let mut archive = ZipArchive::new(file).map_err(|e| {
        MnemonError::Bundle(BundleError::Malformed {
            detail: format!("not a bundle directory or zip archive: {e}"),
        })
    })?;
    let mut members = BTreeMap::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|e| {
            MnemonError::Bundle(BundleError::Malformed {
                detail: format!("zip entry {i}: {e}"),
            })
        })?;
        if entry.is_dir() {
            continue;
        }
        let mut bytes = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut bytes)?;
        members.insert(entry.name().to_string(), bytes);
    }
    Ok(members)
}
