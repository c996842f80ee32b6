//! Three-level signature generation.
//!
//! - order1: one set of normalized lemmas per sentence.
//! - order2: consecutive pairs of order1 sets merged, nouns and verbs kept.
//! - order3: consecutive triples of order1 sets merged, nouns kept.
//!
//! A trailing incomplete group is merged and filtered as its own entry, so
//! `order2.len() == ceil(order1.len() / 2)` and
//! `order3.len() == ceil(order1.len() / 3)`.

use std::sync::Arc;

use tracing::warn;

use etalon_core::defaults::{CYRILLIC_ALPHABET, MIN_TOKEN_CHARS, ORDER2_GROUP, ORDER3_GROUP};
use etalon_core::{FeatureSet, LinguisticNormalizer, Signature, SignatureLevel, TaggedWord};

/// Lowercase a raw token and strip everything outside the Cyrillic alphabet.
///
/// Returns `None` for tokens of at most [`MIN_TOKEN_CHARS`] characters or
/// tokens with nothing left after filtering.
pub fn clean_token(raw: &str) -> Option<String> {
    if raw.chars().count() <= MIN_TOKEN_CHARS {
        return None;
    }
    let cleaned: String = raw
        .to_lowercase()
        .chars()
        .filter(|c| CYRILLIC_ALPHABET.contains(*c))
        .collect();
    (!cleaned.is_empty()).then_some(cleaned)
}

/// Builds fragment signatures with an injected normalizer.
#[derive(Clone)]
pub struct SignatureGenerator {
    normalizer: Arc<dyn LinguisticNormalizer>,
}

impl SignatureGenerator {
    pub fn new(normalizer: Arc<dyn LinguisticNormalizer>) -> Self {
        Self { normalizer }
    }

    pub fn normalizer(&self) -> &dyn LinguisticNormalizer {
        self.normalizer.as_ref()
    }

    /// Generate all three levels for a fragment's sentences.
    pub fn generate(&self, sentences: &[String]) -> Signature {
        let order1 = self.first_order(sentences);
        let order2 = self.merge_level(&order1, ORDER2_GROUP, |t| t.is_noun() || t.is_verb());
        let order3 = self.merge_level(&order1, ORDER3_GROUP, TaggedWord::is_noun);
        Signature {
            order1,
            order2,
            order3,
        }
    }

    /// One lemma set per sentence. Sentences without surviving tokens keep
    /// an empty set so positions stay aligned.
    pub fn first_order(&self, sentences: &[String]) -> SignatureLevel {
        sentences.iter().map(|s| self.sentence_set(s)).collect()
    }

    fn sentence_set(&self, sentence: &str) -> FeatureSet {
        let mut set = FeatureSet::new();
        for raw in self.normalizer.tokenize_words(sentence) {
            let Some(token) = clean_token(&raw) else {
                continue;
            };
            match self.normalizer.lemmatize(&token) {
                Some(lemma) if !lemma.is_empty() => {
                    set.insert(lemma);
                }
                _ => warn!(
                    subsystem = "engine",
                    component = "signature",
                    token = %token,
                    "No parse for token, skipped"
                ),
            }
        }
        set
    }

    /// Merge non-overlapping groups of `group` sets and keep the words whose
    /// tag satisfies `keep`.
    pub fn merge_level<F>(&self, first: &SignatureLevel, group: usize, keep: F) -> SignatureLevel
    where
        F: Fn(&TaggedWord) -> bool,
    {
        first
            .chunks(group.max(1))
            .map(|chunk| {
                let union: Vec<String> = chunk
                    .iter()
                    .flatten()
                    .cloned()
                    .collect::<FeatureSet>()
                    .into_iter()
                    .collect();
                self.normalizer
                    .pos_tag(&union)
                    .into_iter()
                    .filter(|tagged| keep(tagged))
                    .map(|tagged| tagged.word)
                    .collect::<FeatureSet>()
            })
            .collect()
    }
}
