/// Engine version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Directory created under the project root for all engine state.
pub const STORE_DIR: &str = ".store";

/// Encrypted database file name inside [`STORE_DIR`].
pub const DB_FILE: &str = "db";

/// Advisory writer-lock file name.
pub const LOCK_FILE: &str = "db.lock";

/// Embedding model cache directory.
pub const MODELS_DIR: &str = "models";

/// Native vector extension directory (one subdirectory per `<os>-<arch>`).
pub const VECTOR_EXT_DIR: &str = "vector-ext";

/// Per-invocation receipt directory.
pub const RECEIPTS_DIR: &str = "receipts";

/// Append-only audit journal file name.
pub const JOURNAL_FILE: &str = "journal.jsonl";

/// Policy configuration file name.
pub const POLICY_FILE: &str = "policy.json";

/// File digest cache file name.
pub const DIGEST_CACHE_FILE: &str = "digest-cache.json";

/// Machine-bound secret fallback file (used when /etc/machine-id is absent).
pub const MACHINE_SECRET_FILE: &str = "machine-secret";

/// Ed25519 bundle signing key seed file.
pub const SIGNING_KEY_FILE: &str = "signing.key";

/// Canonical bundle extension.
pub const BUNDLE_EXT: &str = "ctx";

/// Bundle manifest schema version.
pub const BUNDLE_SCHEMA_VERSION: u32 = 1;

/// Maximum characters in a single memory's content.
pub const MAX_CONTENT_CHARS: usize = 10_000;

/// Default maximum lines per chunk before splitting.
pub const DEFAULT_MAX_CHUNK_LINES: usize = 400;

/// Default embedding dimensionality.
pub const DEFAULT_EMBEDDING_DIM: usize = 384;

/// Hybrid search oversampling factor: each sub-search fetches `k * OVERSAMPLE`.
pub const HYBRID_OVERSAMPLE: usize = 4;

/// Default lexical weight in hybrid fusion.
pub const DEFAULT_ALPHA: f32 = 0.5;

/// PBKDF2-HMAC-SHA256 iterations for the database key derivation.
pub const KDF_ITERATIONS: u32 = 200_000;

/// Backoff schedule for transient storage errors, in milliseconds.
pub const RETRY_BACKOFF_MS: [u64; 3] = [50, 200, 800];

/// The single environment variable the engine reads: embedding model id.
pub const EMBED_MODEL_ENV: &str = "MNEMON_EMBED_MODEL";

/// Model id selecting the deterministic hashed embedder.
pub const HASHED_MODEL_ID: &str = "hashed";

/// Reserved trust-token key that authorizes network egress while unexpired.
pub const EGRESS_TOKEN: &str = "egress";

/// Every command the engine exposes; the default policy allows all of them.
pub const COMMANDS: &[&str] = &[
    "init",
    "status",
    "remember",
    "search",
    "index-code",
    "reindex-file",
    "reindex-folder",
    "gc",
    "db-doctor",
    "export-context",
    "import-context",
    "prove-offline",
    "record-conversation",
    "policy",
];
