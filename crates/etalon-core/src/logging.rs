//! Structured logging schema and field name constants for etalon.
//!
//! All crates use these names for structured `tracing` fields so log
//! aggregation can query the same keys across every subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Invocation failed, batch not persisted |
//! | WARN  | Recoverable issue (skipped token, retried message) |
//! | INFO  | Lifecycle events, batch completions, flagged fragments |
//! | DEBUG | Decision points, snapshot sizes, config choices |
//! | TRACE | Per-fragment and per-level scores |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "api", "engine", "db", "jobs"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "pipeline", "segmenter", "normalizer", "pool", "worker"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "run", "load_snapshot", "persist", "claim_next"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Text UUID being processed.
pub const TEXT_ID: &str = "text_id";

/// Fragment index within a text.
pub const PART: &str = "part";

/// Queued analysis message UUID.
pub const MESSAGE_ID: &str = "message_id";

/// Corpus partition key.
pub const THEME: &str = "theme";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of input items in a batch.
pub const ITEM_COUNT: &str = "item_count";

/// Number of fragments produced.
pub const FRAGMENT_COUNT: &str = "fragment_count";

/// Number of reference samples in the evaluation set.
pub const REFERENCE_COUNT: &str = "reference_count";

/// Number of fragments flagged above the similarity border.
pub const FLAGGED_COUNT: &str = "flagged_count";

/// Aggregated fragment weight.
pub const WEIGHT: &str = "weight";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";

/// Whether a failure will be retried.
pub const RETRYABLE: &str = "retryable";
