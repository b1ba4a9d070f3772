//! The embedding adapter: one lazy provider per engine instance, an L1
//! cache keyed by content digest, and a bounded parallel batch path.

use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use moka::sync::Cache;
use once_cell::sync::OnceCell;
use rayon::prelude::*;
use sha2::{Digest, Sha256};
use tracing::debug;

use mnemon_core::config::EmbeddingConfig;
use mnemon_core::constants::{EMBED_MODEL_ENV, HASHED_MODEL_ID, MODELS_DIR};
use mnemon_core::errors::EmbeddingError;
use mnemon_core::traits::EmbeddingProvider;
use mnemon_core::MnemonResult;

use crate::providers::{HashedEmbedder, OnnxEmbedder};

pub struct EmbeddingAdapter {
    models_dir: PathBuf,
    config: EmbeddingConfig,
    /// Resolved once: config override, then the env var, then the fallback.
    model: String,
    provider: OnceCell<Box<dyn EmbeddingProvider>>,
    cache: Cache<String, Arc<Vec<f32>>>,
    pool: rayon::ThreadPool,
}

impl EmbeddingAdapter {
    /// `store_dir` is the engine's `.store` directory; models live under
    /// `<store_dir>/models/<model-id>/`.
    pub fn new(store_dir: &Path, config: EmbeddingConfig) -> MnemonResult<Self> {
        let threads = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            .min(4);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| mnemon_core::MnemonError::internal(e.to_string()))?;
        let model = config
            .model
            .clone()
            .or_else(|| env::var(EMBED_MODEL_ENV).ok())
            .unwrap_or_else(|| HASHED_MODEL_ID.to_string());
        Ok(Self {
            models_dir: store_dir.join(MODELS_DIR),
            cache: Cache::new(config.l1_cache_size),
            config,
            model,
            provider: OnceCell::new(),
            pool,
        })
    }

    /// The selected model id.
    pub fn model_id(&self) -> &str {
        &self.model
    }

    fn provider(&self) -> MnemonResult<&dyn EmbeddingProvider> {
        let provider = self.provider.get_or_try_init(|| {
            let provider: Box<dyn EmbeddingProvider> = if self.model == HASHED_MODEL_ID {
                Box::new(HashedEmbedder::new(self.config.dimensions))
            } else {
                Box::new(OnnxEmbedder::load(
                    &self.models_dir.join(&self.model),
                    &self.model,
                    self.config.dimensions,
                )?)
            };
            debug!(model = %self.model, dims = self.config.dimensions, "embedding provider initialized");
            Ok::<_, mnemon_core::MnemonError>(provider)
        })?;
        Ok(provider.as_ref())
    }

    fn cache_key(text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        hex::encode(hasher.finalize())
    }

    fn embed_uncached(&self, text: &str) -> MnemonResult<Vec<f32>> {
        let provider = self.provider()?;
        let vector = provider.embed(text)?;
        if vector.len() != self.config.dimensions {
            return Err(EmbeddingError::InferenceFailed {
                reason: format!(
                    "provider `{}` returned {} dims, expected {}",
                    provider.name(),
                    vector.len(),
                    self.config.dimensions
                ),
            }
            .into());
        }
        Ok(vector)
    }
}

impl EmbeddingProvider for EmbeddingAdapter {
    fn embed(&self, text: &str) -> MnemonResult<Vec<f32>> {
        let key = Self::cache_key(text);
        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit.as_ref().clone());
        }
        let vector = self.embed_uncached(text)?;
        self.cache.insert(key, Arc::new(vector.clone()));
        Ok(vector)
    }

    /// Batch form runs on the bounded pool and equals repeated single calls.
    fn embed_batch(&self, texts: &[String]) -> MnemonResult<Vec<Vec<f32>>> {
        // Force provider init on the caller thread so the first error is
        // deterministic rather than raced across workers.
        self.provider()?;
        self.pool
            .install(|| texts.par_iter().map(|t| self.embed(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    fn name(&self) -> &str {
        &self.model
    }

    fn is_available(&self) -> bool {
        self.provider().map(|p| p.is_available()).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn adapter(dims: usize) -> EmbeddingAdapter {
        let dir = TempDir::new().unwrap();
        let config = EmbeddingConfig {
            dimensions: dims,
            model: Some(HASHED_MODEL_ID.to_string()),
            l1_cache_size: 64,
        };
        EmbeddingAdapter::new(dir.path(), config).unwrap()
    }

    #[test]
    fn embeds_through_hashed_provider() {
        let a = adapter(64);
        let v = a.embed("retrieval engine").unwrap();
        assert_eq!(v.len(), 64);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn cache_returns_identical_vectors() {
        let a = adapter(32);
        let first = a.embed("cached text").unwrap();
        let second = a.embed("cached text").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn batch_equals_single_calls() {
        let a = adapter(48);
        let texts = vec!["one".to_string(), "two".to_string(), "three".to_string()];
        let batch = a.embed_batch(&texts).unwrap();
        for (text, vec) in texts.iter().zip(batch.iter()) {
            assert_eq!(vec, &a.embed(text).unwrap());
        }
    }

    #[test]
    fn explicit_model_overrides_env() {
        let a = adapter(16);
        assert_eq!(a.model_id(), HASHED_MODEL_ID);
        assert!(a.is_available());
    }
}
