//! # etalon-engine
//!
//! Signature-based fragment similarity engine.
//!
//! This crate provides:
//! - Sentence and word tokenization, lemmatization and POS tagging
//!   through a rule-based normalizer with an optional lexicon
//! - Fragment segmentation into runs of at most `max_series` sentences
//! - Three-level fragment signatures (sentence lemmas, noun/verb pairs,
//!   noun triples)
//! - Set comparison and per-level best-match evaluation on a bounded
//!   worker pool
//! - Weighted aggregation and the batch pipeline that scores, persists and
//!   reports fragments
//! - Corpus export and import
//!
//! ## Lemmatization
//!
//! Level-1 matching compares lemmas, so its quality depends on the lexicon.
//! [`RuleBasedNormalizer::new`] only lowercases words it does not know;
//! [`RuleBasedNormalizer::bundled`] adds a seed lexicon of common nouns and
//! verbs. Production deployments should load a full `form<TAB>lemma<TAB>tag`
//! lexicon via `LEXICON_PATH` (see [`lexicon`]).
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use etalon_engine::{EngineConfig, InputBatch, InputItem, Label, Pipeline, RuleBasedNormalizer};
//! use etalon_db::InMemoryReferenceStore;
//!
//! let pipeline = Pipeline::new(
//!     Arc::new(RuleBasedNormalizer::new()),
//!     Arc::new(InMemoryReferenceStore::new()),
//!     EngineConfig::default(),
//! );
//!
//! let batch = InputBatch::new(vec![
//!     InputItem::new("Кошка сидит на окне.", Label::Score(1)),
//!     InputItem::new("Кошка сидит на окне.", Label::Unlabeled),
//! ]);
//! let outcome = pipeline.run(&batch).await?;
//! for flagged in &outcome.report.flagged {
//!     println!("{}_{}: {:.2}", flagged.text_id, flagged.part, flagged.weight);
//! }
//! ```

pub mod aggregator;
pub mod comparator;
pub mod config;
pub mod corpus;
pub mod evaluator;
pub mod lexicon;
pub mod normalizer;
pub mod pipeline;
pub mod segmenter;
pub mod signature;
pub mod test_fixtures;

// Re-export core types
pub use etalon_core::*;

pub use aggregator::{aggregate, classify, exceeds_border};
pub use comparator::{compare, ratio};
pub use config::EngineConfig;
pub use corpus::{
    dump_json, export_corpus, import_corpus, load_json, seed_from_file, validate_sample,
};
pub use evaluator::{best_ratio, join_levels, Candidate, EvaluationPool, LevelScores, OrderEvaluator};
pub use lexicon::{Lexicon, LexiconEntry};
pub use normalizer::RuleBasedNormalizer;
pub use pipeline::Pipeline;
pub use segmenter::{segment_text, split_into_fragments};
pub use signature::{clean_token, SignatureGenerator};
