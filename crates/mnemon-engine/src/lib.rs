//! # mnemon-engine
//!
//! The command surface of the Mnemon memory engine, as a library: every
//! operation is wrapped by the policy guard, records a receipt, and maps
//! its errors to the exit-code contract. The CLI and editor integrations
//! are external collaborators of this crate.

mod engine;
mod reindex;
mod telemetry;

pub use engine::{GcOptions, Mnemon, SearchRequest};
pub use reindex::IndexOptions;
pub use telemetry::init_tracing;

pub use mnemon_bundle::{BundleKind, ExportOptions};
pub use mnemon_retrieval::SearchOutcome;
pub use mnemon_core::{CancelToken, MnemonConfig, MnemonError, MnemonResult};
pub use mnemon_storage::PassphraseSource;
