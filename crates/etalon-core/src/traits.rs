//! Core traits for etalon collaborators.
//!
//! The similarity engine consumes the analyzer, the reference corpus and the
//! ingestion queue only through these interfaces, so concrete backends (and
//! test doubles) are injected at construction time.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// LINGUISTIC NORMALIZER
// =============================================================================

/// A word paired with its part-of-speech tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedWord {
    pub word: String,
    pub tag: String,
}

impl TaggedWord {
    pub fn new(word: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            word: word.into(),
            tag: tag.into(),
        }
    }

    /// Noun-class tag (`S`, `S-PRO`, ...).
    pub fn is_noun(&self) -> bool {
        self.tag.starts_with('S')
    }

    /// Verb-class tag (`V`, ...).
    pub fn is_verb(&self) -> bool {
        self.tag.starts_with('V')
    }
}

/// Sentence/word tokenizer, lemmatizer and part-of-speech tagger.
///
/// Implementations are immutable after construction and shared across the
/// evaluation pool.
pub trait LinguisticNormalizer: Send + Sync {
    /// Split text into ordered, non-empty sentences.
    fn tokenize_sentences(&self, text: &str) -> Vec<String>;

    /// Split one sentence into ordered word tokens.
    fn tokenize_words(&self, sentence: &str) -> Vec<String>;

    /// Most probable lemma of a word, or `None` when the word has no parse.
    fn lemmatize(&self, word: &str) -> Option<String>;

    /// Tag each word; the output is aligned with the input.
    fn pos_tag(&self, words: &[String]) -> Vec<TaggedWord>;
}

// =============================================================================
// REFERENCE CORPUS STORE
// =============================================================================

/// Keyed persistent store of reference samples.
#[async_trait]
pub trait ReferenceStore: Send + Sync {
    /// Full snapshot of the corpus.
    async fn get_all(&self) -> Result<Vec<ReferenceSample>>;

    /// Snapshot of one theme partition.
    async fn get_theme(&self, theme: &str) -> Result<Vec<ReferenceSample>>;

    /// Insert or update samples by `(id, part)`, atomically.
    ///
    /// Returns the number of rows whose content changed.
    async fn upsert_all(&self, samples: &[ReferenceSample]) -> Result<u64>;

    /// Remove every sample.
    async fn clear(&self) -> Result<()>;

    /// Number of stored samples.
    async fn count(&self) -> Result<i64>;
}

// =============================================================================
// INGESTION QUEUE
// =============================================================================

/// Durable queue of analysis batches.
#[async_trait]
pub trait AnalysisQueue: Send + Sync {
    /// Add a batch; returns the message id.
    async fn enqueue(&self, batch: &InputBatch) -> Result<Uuid>;

    /// Claim the oldest pending message and mark it running.
    ///
    /// A running message whose lease has expired is claimable again, with
    /// its retry count bumped, so a worker lost mid-message cannot strand it.
    async fn claim_next(&self) -> Result<Option<AnalysisMessage>>;

    /// Mark a message completed with its report.
    async fn complete(&self, id: Uuid, report: &BatchReport) -> Result<()>;

    /// Record a failure.
    ///
    /// Retryable failures return the message to pending until its retry
    /// budget is spent. Returns the resulting status.
    async fn fail(&self, id: Uuid, error: &str, retryable: bool) -> Result<MessageStatus>;

    /// Look up a message.
    async fn get(&self, id: Uuid) -> Result<Option<AnalysisMessage>>;

    /// Number of pending messages.
    async fn pending_count(&self) -> Result<i64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tagged_word_classes() {
        assert!(TaggedWord::new("кошка", "S").is_noun());
        assert!(TaggedWord::new("он", "S-PRO").is_noun());
        assert!(TaggedWord::new("бежать", "V").is_verb());
        assert!(!TaggedWord::new("быстро", "ADV").is_noun());
        assert!(!TaggedWord::new("на", "PR").is_verb());
    }
}
