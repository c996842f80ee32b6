//! Deterministic collaborators for engine tests.

use std::collections::{HashMap, HashSet};

use etalon_core::{LinguisticNormalizer, TaggedWord};

/// Normalizer driven entirely by explicit tables.
///
/// Sentences end at `.`, `!` or `?`. Words are maximal alphanumeric runs.
/// A word lemmatizes to its table entry or to itself, and is tagged from the
/// tag table or as a noun (`S`). Words marked with [`without_parse`] have no
/// lemma at all.
///
/// [`without_parse`]: FixedNormalizer::without_parse
#[derive(Debug, Default, Clone)]
pub struct FixedNormalizer {
    lemmas: HashMap<String, String>,
    tags: HashMap<String, String>,
    unparsed: HashSet<String>,
}

impl FixedNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lemma(mut self, form: &str, lemma: &str) -> Self {
        self.lemmas.insert(form.to_string(), lemma.to_string());
        self
    }

    pub fn with_tag(mut self, word: &str, tag: &str) -> Self {
        self.tags.insert(word.to_string(), tag.to_string());
        self
    }

    pub fn without_parse(mut self, word: &str) -> Self {
        self.unparsed.insert(word.to_string());
        self
    }
}

impl LinguisticNormalizer for FixedNormalizer {
    fn tokenize_sentences(&self, text: &str) -> Vec<String> {
        text.split_inclusive(['.', '!', '?'])
            .map(str::trim)
            .filter(|s| s.chars().any(char::is_alphanumeric))
            .map(str::to_string)
            .collect()
    }

    fn tokenize_words(&self, sentence: &str) -> Vec<String> {
        sentence
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_string)
            .collect()
    }

    fn lemmatize(&self, word: &str) -> Option<String> {
        if self.unparsed.contains(word) {
            return None;
        }
        Some(
            self.lemmas
                .get(word)
                .cloned()
                .unwrap_or_else(|| word.to_string()),
        )
    }

    fn pos_tag(&self, words: &[String]) -> Vec<TaggedWord> {
        words
            .iter()
            .map(|w| {
                let tag = self.tags.get(w).map(String::as_str).unwrap_or("S");
                TaggedWord::new(w.clone(), tag)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tables_drive_every_answer() {
        let n = FixedNormalizer::new()
            .with_lemma("окне", "окно")
            .with_tag("сидит", "V")
            .without_parse("ыыы");

        assert_eq!(
            n.tokenize_sentences("Кошка сидит. Собака спит!  "),
            vec!["Кошка сидит.", "Собака спит!"]
        );
        assert_eq!(n.tokenize_words("Кошка, на окне."), vec!["Кошка", "на", "окне"]);
        assert_eq!(n.lemmatize("окне"), Some("окно".to_string()));
        assert_eq!(n.lemmatize("кошка"), Some("кошка".to_string()));
        assert_eq!(n.lemmatize("ыыы"), None);

        let tagged = n.pos_tag(&["кошка".to_string(), "сидит".to_string()]);
        assert!(tagged[0].is_noun());
        assert!(tagged[1].is_verb());
    }
}
