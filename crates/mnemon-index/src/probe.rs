//! Capability probe: select the native backend when its library is present
//! for this platform, otherwise fall back silently (with a receipt note).

use std::env::consts::{ARCH, DLL_SUFFIX, OS};
use std::path::{Path, PathBuf};

use mnemon_core::constants::VECTOR_EXT_DIR;
use mnemon_core::traits::VectorIndex;

use crate::flat::FlatIndex;
use crate::native::NativeIndex;

/// The selected backend plus a human-readable note for the receipt.
pub struct ProbeOutcome {
    pub index: Box<dyn VectorIndex>,
    pub backend: String,
    pub note: Option<String>,
}

/// Expected library location: `<store_dir>/vector-ext/<os>-<arch>/vec0<suffix>`.
pub fn native_library_path(store_dir: &Path) -> PathBuf {
    store_dir
        .join(VECTOR_EXT_DIR)
        .join(format!("{OS}-{ARCH}"))
        .join(format!("vec0{DLL_SUFFIX}"))
}

/// Probe for the native backend; the flat index is the guaranteed fallback.
pub fn open_best(store_dir: &Path, dims: usize) -> ProbeOutcome {
    let lib = native_library_path(store_dir);
    if lib.is_file() {
        match NativeIndex::load(&lib, dims) {
            Ok(native) => {
                return ProbeOutcome {
                    index: Box::new(native),
                    backend: "vec0".to_string(),
                    note: None,
                };
            }
            Err(e) => {
                tracing::warn!(error = %e, lib = %lib.display(), "native vector backend failed to load");
                return ProbeOutcome {
                    index: Box::new(FlatIndex::new(dims)),
                    backend: "flat".to_string(),
                    note: Some(format!("native vector backend skipped: {e}")),
                };
            }
        }
    }
    ProbeOutcome {
        index: Box::new(FlatIndex::new(dims)),
        backend: "flat".to_string(),
        note: Some("native vector extension not present; using flat index".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn absent_extension_selects_flat_with_note() {
        let dir = TempDir::new().unwrap();
        let outcome = open_best(dir.path(), 8);
        assert_eq!(outcome.backend, "flat");
        assert!(outcome.note.is_some());
        assert_eq!(outcome.index.stats().backend, "flat");
    }

    #[test]
    fn library_path_follows_platform_triple() {
        let p = native_library_path(Path::new("/tmp/.store"));
        let s = p.to_string_lossy();
        assert!(s.contains("vector-ext"));
        assert!(s.contains(OS));
        assert!(s.contains(ARCH));
    }
}
