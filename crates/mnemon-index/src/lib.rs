//! # mnemon-index
//!
//! Vector index backends behind the [`VectorIndex`] trait. The brute-force
//! [`FlatIndex`] is always available and defines the ranking contract; a
//! native sqlite-vec extension is used when its library is present for the
//! platform, and must agree with the flat index on the top-K set.

mod flat;
mod native;
mod probe;

pub use flat::{normalize, FlatIndex};
pub use native::NativeIndex;
pub use probe::{open_best, ProbeOutcome};

pub use mnemon_core::traits::{QueryOpts, VectorIndex};
