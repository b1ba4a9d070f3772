//! Abstractions at the component seams. The process may hold exactly one
//! concrete embedder, but every consumer takes the trait so tests can
//! substitute deterministic fakes.

mod embedding;
mod store;
mod vector_index;

pub use embedding::EmbeddingProvider;
pub use store::MemoryReader;
pub use vector_index::{QueryOpts, VectorIndex};
