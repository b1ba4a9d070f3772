//! # mnemon-policy
//!
//! The enforcement layer around every command: per-command and per-path
//! allow-lists, a scoped process-wide network interceptor, one receipt per
//! invocation, the append-only journal, and the offline proof.

mod config;
mod guard;
mod journal;
pub mod net;
mod proof;
mod receipts;

pub use config::PolicyStore;
pub use guard::{Guard, GuardScope};
pub use journal::Journal;
pub use proof::prove_offline;
pub use receipts::{argv_digest, sha256_hex, ReceiptSink};
