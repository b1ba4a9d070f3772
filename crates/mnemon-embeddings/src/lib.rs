//! # mnemon-embeddings
//!
//! The embedding adapter: lazy provider selection, an L1 cache, and a
//! bounded parallel batch path. Offline-only: model files are resolved
//! from the local cache directory and no provider ever touches the network.

mod adapter;
pub mod providers;

pub use adapter::EmbeddingAdapter;

/// L2-normalize in place; zero vectors stay zero.
pub(crate) fn l2_normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}
