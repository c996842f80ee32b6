//! Word-form lexicon for the rule-based normalizer.
//!
//! A lexicon is a UTF-8 TSV file with one `form<TAB>lemma<TAB>tag` entry per
//! line. Lines starting with `#` and blank lines are ignored. Forms are
//! matched case-insensitively; the first entry for a form wins.
//!
//! A small seed lexicon of common nouns and verbs ships with the crate
//! ([`Lexicon::bundled`]). It covers a few hundred forms only; deployments
//! should supply a full lexicon through `LEXICON_PATH`.

use std::collections::HashMap;
use std::path::Path;

use tracing::info;

use etalon_core::{Error, Result};

const BUNDLED_LEXICON: &str = include_str!("../data/lexicon.tsv");

/// Analysis of one word form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexiconEntry {
    pub lemma: String,
    pub tag: String,
}

#[derive(Debug, Clone, Default)]
pub struct Lexicon {
    entries: HashMap<String, LexiconEntry>,
}

impl Lexicon {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse lexicon text.
    pub fn parse(source: &str) -> Result<Self> {
        let mut lexicon = Self::new();
        for (index, raw) in source.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let columns: Vec<&str> = line.split('\t').map(str::trim).collect();
            match columns.as_slice() {
                [form, lemma, tag] if !form.is_empty() && !lemma.is_empty() && !tag.is_empty() => {
                    lexicon.insert(form, lemma, tag);
                }
                _ => {
                    return Err(Error::Normalizer(format!(
                        "lexicon line {}: expected form<TAB>lemma<TAB>tag",
                        index + 1
                    )))
                }
            }
        }
        Ok(lexicon)
    }

    /// Read and parse a lexicon file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)?;
        let lexicon = Self::parse(&source)?;
        info!(
            subsystem = "engine",
            component = "lexicon",
            op = "load",
            path = %path.display(),
            entries = lexicon.len(),
            "Lexicon loaded"
        );
        Ok(lexicon)
    }

    /// The seed lexicon compiled into the crate.
    pub fn bundled() -> Result<Self> {
        Self::parse(BUNDLED_LEXICON)
    }

    /// Add every entry of `other` whose form is not already known.
    pub fn extend(&mut self, other: &Lexicon) {
        for (form, entry) in &other.entries {
            self.insert(form, &entry.lemma, &entry.tag);
        }
    }

    /// Add an entry unless the form is already known.
    pub fn insert(&mut self, form: &str, lemma: &str, tag: &str) {
        self.entries
            .entry(form.to_lowercase())
            .or_insert_with(|| LexiconEntry {
                lemma: lemma.to_lowercase(),
                tag: tag.to_string(),
            });
    }

    pub fn get(&self, form: &str) -> Option<&LexiconEntry> {
        self.entries.get(&form.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
