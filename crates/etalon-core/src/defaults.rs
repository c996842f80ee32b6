//! Centralized default constants for etalon.
//!
//! **This module is the single source of truth** for shared default values.
//! Crates reference these constants instead of defining their own magic
//! numbers.

// =============================================================================
// SEGMENTATION
// =============================================================================

/// Sentences per fragment.
pub const MAX_SERIES: usize = 5;

// =============================================================================
// SIGNATURES
// =============================================================================

/// Raw tokens must be strictly longer than this (in characters) to be kept.
pub const MIN_TOKEN_CHARS: usize = 2;

/// The 33-letter lowercase Cyrillic alphabet accepted in signature features.
pub const CYRILLIC_ALPHABET: &str = "абвгдеёжзийклмнопрстуфхцчшщъыьэюя";

/// Level-1 sentence sets merged per Level-2 entry.
pub const ORDER2_GROUP: usize = 2;

/// Level-1 sentence sets merged per Level-3 entry.
pub const ORDER3_GROUP: usize = 3;

// =============================================================================
// SCORING
// =============================================================================

/// Report threshold: unlabeled fragments with weight strictly above are flagged.
pub const SIMILARITY_BORDER: f64 = 0.7;

/// Aggregation weight of the Level-1 ratio.
pub const ORDER1_WEIGHT: f64 = 3.0;

/// Aggregation weight of the Level-2 ratio.
pub const ORDER2_WEIGHT: f64 = 2.0;

/// Aggregation weight of the Level-3 ratio.
pub const ORDER3_WEIGHT: f64 = 1.0;

/// Worker count of the order evaluation pool (one per signature level).
pub const ORDER_WORKERS: usize = 3;

// =============================================================================
// QUEUE / WORKER
// =============================================================================

/// Polling interval when the ingestion queue is empty (milliseconds).
pub const WORKER_POLL_INTERVAL_MS: u64 = 500;

/// Retries for transient failures before a queued batch is marked failed.
pub const QUEUE_MAX_RETRIES: i32 = 3;

/// Upper bound on one queued batch's processing time (seconds).
pub const MESSAGE_TIMEOUT_SECS: u64 = 300;

/// A running message whose claim is older than this (seconds) is reclaimed
/// by the next `claim_next`. Must exceed `MESSAGE_TIMEOUT_SECS`.
pub const QUEUE_LEASE_SECS: u64 = 900;

/// Broadcast capacity for worker events.
pub const EVENT_BUS_CAPACITY: usize = 256;

// =============================================================================
// SERVER
// =============================================================================

/// Default HTTP server port.
pub const SERVER_PORT: u16 = 3000;

/// Default HTTP bind host.
pub const SERVER_HOST: &str = "0.0.0.0";

/// Maximum accepted request body (bytes).
pub const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;
