//! Post-fusion filters matched against memory metadata.

use globset::{Glob, GlobMatcher};

use mnemon_core::memory::{meta_keys, Memory};
use mnemon_core::SearchFilters;

/// Compile the path glob once per search. An unparseable glob matches
/// nothing (the caller surfaced a warning).
pub fn compile_path_glob(filters: &SearchFilters) -> Option<Result<GlobMatcher, globset::Error>> {
    filters
        .path
        .as_ref()
        .map(|p| Glob::new(p).map(|g| g.compile_matcher()))
}

pub fn matches(memory: &Memory, filters: &SearchFilters, path_glob: Option<&GlobMatcher>) -> bool {
    if let Some(glob) = path_glob {
        match memory.metadata.get(meta_keys::FILE) {
            Some(file) if glob.is_match(file.as_str()) => {}
            _ => return false,
        }
    }
    if let Some(language) = &filters.language {
        if memory.metadata.get(meta_keys::LANGUAGE) != Some(language) {
            return false;
        }
    }
    if let Some(symbol) = &filters.symbol {
        match memory.metadata.get(meta_keys::SYMBOL_NAME) {
            Some(name) if name.contains(symbol.as_str()) => {}
            _ => return false,
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn memory_with(file: &str, language: &str, symbol: &str) -> Memory {
        let mut metadata = BTreeMap::new();
        metadata.insert(meta_keys::FILE.to_string(), file.to_string());
        metadata.insert(meta_keys::LANGUAGE.to_string(), language.to_string());
        metadata.insert(meta_keys::SYMBOL_NAME.to_string(), symbol.to_string());
        Memory {
            id: 1,
            content: String::new(),
            context: "general".into(),
            kind: "code".into(),
            tags: vec![],
            metadata,
            content_hash: String::new(),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn path_glob_filters() {
        let m = memory_with("src/auth/login.ts", "typescript", "login");
        let filters = SearchFilters {
            path: Some("src/auth/**".into()),
            ..Default::default()
        };
        let glob = compile_path_glob(&filters).unwrap().unwrap();
        assert!(matches(&m, &filters, Some(&glob)));

        let filters = SearchFilters {
            path: Some("lib/**".into()),
            ..Default::default()
        };
        let glob = compile_path_glob(&filters).unwrap().unwrap();
        assert!(!matches(&m, &filters, Some(&glob)));
    }

    #[test]
    fn language_is_exact_and_symbol_is_substring() {
        let m = memory_with("a.py", "python", "build_index");
        let filters = SearchFilters {
            language: Some("python".into()),
            symbol: Some("index".into()),
            ..Default::default()
        };
        assert!(matches(&m, &filters, None));

        let filters = SearchFilters {
            language: Some("py".into()),
            ..Default::default()
        };
        assert!(!matches(&m, &filters, None));
    }

    #[test]
    fn missing_metadata_fails_closed() {
        let mut m = memory_with("a.ts", "typescript", "x");
        m.metadata.clear();
        let filters = SearchFilters {
            symbol: Some("x".into()),
            ..Default::default()
        };
        assert!(!matches(&m, &filters, None));
    }
}
