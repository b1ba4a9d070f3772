//! Grammar registry. Languages without a registered grammar fall back to
//! whole-file chunking.

use std::path::Path;

use tree_sitter::Language as TsLanguage;

use mnemon_core::chunk::Language;

/// The tree-sitter grammar for a file, when one is registered.
pub fn grammar_for(path: &Path, language: Language) -> Option<TsLanguage> {
    match language {
        Language::Typescript => {
            let ext = path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or_default()
                .to_lowercase();
            if ext == "tsx" {
                Some(tree_sitter_typescript::LANGUAGE_TSX.into())
            } else {
                Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into())
            }
        }
        Language::Javascript => Some(tree_sitter_javascript::LANGUAGE.into()),
        Language::Python => Some(tree_sitter_python::LANGUAGE.into()),
        _ => None,
    }
}
