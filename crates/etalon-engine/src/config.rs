//! Engine configuration.

use std::path::PathBuf;

use etalon_core::defaults;

/// Tunables of the similarity pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Sentences per fragment (at least 1).
    pub max_series: usize,
    /// Report threshold; fragments strictly above are flagged.
    pub similarity_border: f64,
    /// Worker permits of the order evaluation pool.
    pub order_workers: usize,
    /// Optional TSV lexicon for the rule-based normalizer.
    pub lexicon_path: Option<PathBuf>,
    /// JSON corpus file loaded into the store at startup.
    pub corpus_seed_path: Option<PathBuf>,
    /// JSON file the corpus is written to on shutdown.
    pub corpus_dump_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_series: defaults::MAX_SERIES,
            similarity_border: defaults::SIMILARITY_BORDER,
            order_workers: defaults::ORDER_WORKERS,
            lexicon_path: None,
            corpus_seed_path: None,
            corpus_dump_path: None,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `MAX_SERIES` (default: 5, `0` is clamped to 1)
    /// - `SIMILARITY_BORDER` (default: 0.7, clamped into `[0, 1]`)
    /// - `ORDER_WORKERS` (default: 3)
    /// - `LEXICON_PATH` (default: unset)
    /// - `CORPUS_SEED_PATH` (default: unset)
    /// - `CORPUS_DUMP_PATH` (default: unset)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unparseable values fall back to
    /// defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(n) = lookup("MAX_SERIES").and_then(|v| v.trim().parse::<usize>().ok()) {
            config = config.with_max_series(n);
        }
        if let Some(border) =
            lookup("SIMILARITY_BORDER").and_then(|v| v.trim().parse::<f64>().ok())
        {
            config = config.with_similarity_border(border);
        }
        if let Some(n) = lookup("ORDER_WORKERS").and_then(|v| v.trim().parse::<usize>().ok()) {
            config = config.with_order_workers(n);
        }
        if let Some(path) = lookup("LEXICON_PATH").filter(|v| !v.trim().is_empty()) {
            config.lexicon_path = Some(PathBuf::from(path));
        }
        if let Some(path) = lookup("CORPUS_SEED_PATH").filter(|v| !v.trim().is_empty()) {
            config.corpus_seed_path = Some(PathBuf::from(path));
        }
        if let Some(path) = lookup("CORPUS_DUMP_PATH").filter(|v| !v.trim().is_empty()) {
            config.corpus_dump_path = Some(PathBuf::from(path));
        }
        config
    }

    pub fn with_max_series(mut self, max_series: usize) -> Self {
        self.max_series = max_series.max(1);
        self
    }

    pub fn with_similarity_border(mut self, border: f64) -> Self {
        self.similarity_border = if border.is_nan() {
            defaults::SIMILARITY_BORDER
        } else {
            border.clamp(0.0, 1.0)
        };
        self
    }

    pub fn with_order_workers(mut self, workers: usize) -> Self {
        self.order_workers = workers.max(1);
        self
    }

    pub fn with_lexicon_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.lexicon_path = Some(path.into());
        self
    }

    pub fn with_corpus_seed_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.corpus_seed_path = Some(path.into());
        self
    }

    pub fn with_corpus_dump_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.corpus_dump_path = Some(path.into());
        self
    }
}
