//! SearchEngine: orchestrates lexical + vector sub-searches, fusion,
//! filters, and previews.

use tracing::debug;

use mnemon_core::config::SearchConfig;
use mnemon_core::search::TraceEntry;
use mnemon_core::traits::{EmbeddingProvider, MemoryReader, QueryOpts, VectorIndex};
use mnemon_core::{MnemonResult, SearchFilters, SearchMode, SearchResult};

use crate::filters;
use crate::fusion::{self, FusedCandidate};
use crate::preview;

pub struct SearchOutcome {
    pub results: Vec<SearchResult>,
    /// Per-candidate component scores, when tracing was requested.
    pub trace: Option<Vec<TraceEntry>>,
}

pub struct SearchEngine<'a> {
    store: &'a dyn MemoryReader,
    index: &'a dyn VectorIndex,
    embedder: &'a dyn EmbeddingProvider,
    config: SearchConfig,
}

impl<'a> SearchEngine<'a> {
    pub fn new(
        store: &'a dyn MemoryReader,
        index: &'a dyn VectorIndex,
        embedder: &'a dyn EmbeddingProvider,
        config: SearchConfig,
    ) -> Self {
        Self {
            store,
            index,
            embedder,
            config,
        }
    }

    pub fn search(
        &self,
        query: &str,
        mode: SearchMode,
        search_filters: &SearchFilters,
        k: usize,
        preview_lines: usize,
        trace: bool,
    ) -> MnemonResult<SearchOutcome> {
        let fetch = k.saturating_mul(self.config.oversample).max(k);

        let lexical = if mode == SearchMode::Vector {
            Vec::new()
        } else {
            self.store.fts_search(query, fetch)?
        };

        let vector = if mode == SearchMode::Lexical {
            Vec::new()
        } else {
            let embedding = self.embedder.embed(query)?;
            self.index
                .query(&embedding, QueryOpts::top_k(fetch))?
        };

        debug!(
            mode = mode.as_str(),
            lexical = lexical.len(),
            vector = vector.len(),
            "sub-searches complete"
        );

        let alpha = match mode {
            SearchMode::Lexical => 1.0,
            SearchMode::Vector => 0.0,
            SearchMode::Hybrid => self.config.alpha,
        };
        let candidates = fusion::fuse(&lexical, &vector, alpha);

        let trace_entries = trace.then(|| {
            candidates
                .iter()
                .map(|c| TraceEntry {
                    id: c.id,
                    lexical_raw: c.lexical_raw.map(|v| v as f32),
                    lexical_norm: c.lexical_norm,
                    vector_similarity: c.vector_sim,
                    fused: c.score,
                })
                .collect()
        });

        let results = self.materialize(candidates, query, search_filters, k, preview_lines)?;
        Ok(SearchOutcome {
            results,
            trace: trace_entries,
        })
    }

    /// Resolve candidates to memories, apply filters, render previews,
    /// truncate to k.
    fn materialize(
        &self,
        candidates: Vec<FusedCandidate>,
        query: &str,
        search_filters: &SearchFilters,
        k: usize,
        preview_lines: usize,
    ) -> MnemonResult<Vec<SearchResult>> {
        let path_glob = match filters::compile_path_glob(search_filters) {
            Some(Ok(glob)) => Some(glob),
            Some(Err(e)) => {
                tracing::warn!(error = %e, "path filter glob did not parse; matching nothing");
                return Ok(Vec::new());
            }
            None => None,
        };
        let terms = preview::query_terms(query);

        let mut results = Vec::with_capacity(k);
        for candidate in candidates {
            if results.len() == k {
                break;
            }
            let Some(memory) = self.store.get_memory(candidate.id)? else {
                continue;
            };
            if !filters::matches(&memory, search_filters, path_glob.as_ref()) {
                continue;
            }
            results.push(SearchResult {
                id: memory.id,
                score: candidate.score,
                lexical: candidate.lexical_norm,
                vector: candidate.vector_sim,
                context: memory.context,
                kind: memory.kind,
                preview: preview::build_preview(&memory.content, &terms, preview_lines),
                metadata: memory.metadata,
            });
        }
        Ok(results)
    }
}
