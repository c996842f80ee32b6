//! Rule-based Russian linguistic normalizer.
//!
//! Sentence and word tokenization use punctuation patterns. Lemmas and
//! part-of-speech tags come from a [`Lexicon`]; words it does not know keep
//! their lowercase form and are tagged by closed-class word lists and suffix
//! heuristics.
//!
//! **Lemmatization is only as good as the lexicon.** An unknown inflected
//! form is not reduced, so `окне` and `окно` stay distinct and an inflected
//! copy of a sentence scores lower at level 1 than it should.
//! [`RuleBasedNormalizer::new`] has no lexicon at all;
//! [`RuleBasedNormalizer::bundled`] carries the small seed lexicon, and a full
//! one should be supplied through `LEXICON_PATH` in production.
//!
//! Tags follow the Russian National Corpus convention: `S` noun, `V` verb,
//! `A` adjective, `ADV` adverb, `PR` preposition, `CONJ` conjunction,
//! `PART` particle, `NUM` numeral, `S-PRO`/`A-PRO` pronouns.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use etalon_core::{LinguisticNormalizer, Result, TaggedWord};

use crate::lexicon::Lexicon;

/// Terminal punctuation run, optional closing quotes/brackets, then space or end.
static SENTENCE_END: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[.!?…]+[»"”’')\]]*(?:\s+|$)"#).expect("valid sentence regex"));

static BLANK_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n[ \t\r]*\n").expect("valid blank line regex"));

/// Letter/digit runs with inner hyphens or apostrophes (`кто-то`).
static WORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\p{L}\p{N}]+(?:[-'’][\p{L}\p{N}]+)*").expect("valid word regex")
});

static PREPOSITIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "в", "во", "на", "с", "со", "к", "ко", "по", "о", "об", "обо", "от", "ото", "из", "изо",
        "за", "под", "подо", "над", "надо", "при", "про", "для", "без", "безо", "до", "через",
        "между", "перед", "передо", "у", "около", "вокруг", "после", "среди", "сквозь", "вдоль",
        "возле", "кроме", "мимо", "против", "ради", "вместо", "внутри", "из-за", "из-под",
    ]
    .into_iter()
    .collect()
});

static CONJUNCTIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "и", "а", "но", "или", "что", "чтобы", "если", "когда", "потому", "хотя", "либо", "зато",
        "однако", "также", "тоже", "будто", "словно", "пока", "поэтому", "ибо", "причем", "да",
    ]
    .into_iter()
    .collect()
});

static PARTICLES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "не", "ни", "же", "ли", "бы", "вот", "вон", "даже", "только", "лишь", "ведь", "разве",
        "неужели", "уж", "именно", "-то",
    ]
    .into_iter()
    .collect()
});

static NOUN_PRONOUNS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "я", "ты", "он", "она", "оно", "мы", "вы", "они", "себя", "кто", "никто", "ничто",
        "кто-то", "что-то", "кто-нибудь", "что-нибудь", "нечто", "некто", "меня", "тебя", "его",
        "её", "ее", "нас", "вас", "них", "ему", "ей", "им", "мне", "тебе", "нам", "вам",
    ]
    .into_iter()
    .collect()
});

static ADJECTIVE_PRONOUNS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "мой", "твой", "свой", "наш", "ваш", "этот", "тот", "такой", "какой", "который", "весь",
        "сам", "самый", "каждый", "любой", "всякий", "чей", "их", "эта", "это", "эти", "та",
        "те", "все", "вся", "всё", "моя", "твоя", "своя", "наша", "ваша",
    ]
    .into_iter()
    .collect()
});

static NUMERALS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "один", "одна", "одно", "два", "две", "три", "четыре", "пять", "шесть", "семь", "восемь",
        "девять", "десять", "двадцать", "тридцать", "сорок", "пятьдесят", "сто", "двести",
        "тысяча", "миллион", "оба", "обе",
    ]
    .into_iter()
    .collect()
});

static ADVERBS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "очень", "быстро", "медленно", "здесь", "там", "тут", "теперь", "сейчас", "всегда",
        "никогда", "иногда", "потом", "тогда", "снова", "опять", "уже", "ещё", "еще", "вчера",
        "сегодня", "завтра", "хорошо", "плохо", "много", "мало", "почти", "совсем", "вместе",
        "далеко", "близко", "рано", "поздно", "скоро", "давно", "долго", "туда", "сюда",
        "откуда", "куда", "где", "зачем", "почему", "как", "так", "слишком", "весьма",
    ]
    .into_iter()
    .collect()
});

/// Nouns whose endings would otherwise read as verbs.
static NOUN_EXCEPTIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "мать", "дочь", "ночь", "речь", "мощь", "путь", "часть", "власть", "смерть", "сеть",
        "нить", "честь", "весть", "страсть", "пасть", "снасть", "масть", "треть", "плеть",
        "медь", "печать", "благодать", "кровать", "тетрадь", "солдат", "брат", "предмет",
        "ответ", "совет", "билет", "портрет", "секрет", "кредит", "аппетит", "институт",
        "маршрут", "минут", "прут",
    ]
    .into_iter()
    .collect()
});

const NOUN_SUFFIXES: &[&str] = &[
    "ость", "ность", "есть", "ство", "ение", "ание", "тель", "ция", "изм",
];

const VERB_SUFFIXES: &[&str] = &[
    "ться", "тись", "чься", "ть", "ти", "чь", "тся", "ится", "ется", "ался", "ился", "ешь",
    "ишь", "ёшь", "ет", "ёт", "ит", "ют", "ят", "ут", "ает", "яет", "ала", "ила", "ела", "ало", "ило",
    "али", "или", "ели",
];

const ADJECTIVE_SUFFIXES: &[&str] = &[
    "ый", "ий", "ой", "ая", "яя", "ое", "ее", "ые", "ие", "ого", "его", "ому", "ему", "ыми",
    "ими", "ых",
];

/// Shortest stem left after stripping a suffix for the heuristic to apply.
const MIN_STEM_CHARS: usize = 2;

/// Default [`LinguisticNormalizer`] backed by rules and an optional lexicon.
#[derive(Debug, Clone, Default)]
pub struct RuleBasedNormalizer {
    lexicon: Lexicon,
}

impl RuleBasedNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lexicon(lexicon: Lexicon) -> Self {
        Self { lexicon }
    }

    /// Normalizer over the seed lexicon that ships with the crate.
    pub fn bundled() -> Result<Self> {
        Ok(Self::with_lexicon(Lexicon::bundled()?))
    }

    pub fn lexicon(&self) -> &Lexicon {
        &self.lexicon
    }

    /// Tag one word without consulting context.
    pub fn tag_word(&self, word: &str) -> String {
        let lower = word.to_lowercase();
        if let Some(entry) = self.lexicon.get(&lower) {
            return entry.tag.clone();
        }
        heuristic_tag(&lower).to_string()
    }
}

/// Closed-class lookups first, then suffix heuristics, defaulting to noun.
fn heuristic_tag(word: &str) -> &'static str {
    let w = word;
    if PREPOSITIONS.contains(w) {
        return "PR";
    }
    if CONJUNCTIONS.contains(w) {
        return "CONJ";
    }
    if PARTICLES.contains(w) {
        return "PART";
    }
    if NOUN_PRONOUNS.contains(w) {
        return "S-PRO";
    }
    if ADJECTIVE_PRONOUNS.contains(w) {
        return "A-PRO";
    }
    if NUMERALS.contains(w) {
        return "NUM";
    }
    if ADVERBS.contains(w) {
        return "ADV";
    }
    if NOUN_EXCEPTIONS.contains(w) || has_suffix(w, NOUN_SUFFIXES) {
        return "S";
    }
    if has_suffix(w, VERB_SUFFIXES) {
        return "V";
    }
    if has_suffix(w, ADJECTIVE_SUFFIXES) {
        return "A";
    }
    "S"
}

fn has_suffix(word: &str, suffixes: &[&str]) -> bool {
    let chars = word.chars().count();
    suffixes
        .iter()
        .any(|s| word.ends_with(s) && chars >= s.chars().count() + MIN_STEM_CHARS)
}

/// Whether the text after a terminator starts a new sentence.
fn starts_sentence(rest: &str) -> bool {
    match rest.chars().next() {
        None => true,
        Some(c) => {
            c.is_uppercase() || c.is_ascii_digit() || matches!(c, '«' | '"' | '“' | '„' | '(')
        }
    }
}

impl LinguisticNormalizer for RuleBasedNormalizer {
    fn tokenize_sentences(&self, text: &str) -> Vec<String> {
        let mut sentences = Vec::new();
        for paragraph in BLANK_LINE.split(text) {
            let mut start = 0;
            for mat in SENTENCE_END.find_iter(paragraph) {
                if !starts_sentence(&paragraph[mat.end()..]) {
                    continue;
                }
                let sentence = paragraph[start..mat.end()].trim();
                if !sentence.is_empty() {
                    sentences.push(sentence.to_string());
                }
                start = mat.end();
            }
            let tail = paragraph[start..].trim();
            if !tail.is_empty() {
                sentences.push(tail.to_string());
            }
        }
        sentences
    }

    fn tokenize_words(&self, sentence: &str) -> Vec<String> {
        WORD.find_iter(sentence)
            .map(|m| m.as_str().to_string())
            .collect()
    }

    fn lemmatize(&self, word: &str) -> Option<String> {
        let lower = word.trim().to_lowercase();
        if lower.is_empty() {
            return None;
        }
        match self.lexicon.get(&lower) {
            Some(entry) => Some(entry.lemma.clone()),
            None => Some(lower),
        }
    }

    fn pos_tag(&self, words: &[String]) -> Vec<TaggedWord> {
        words
            .iter()
            .map(|w| TaggedWord::new(w.clone(), self.tag_word(w)))
            .collect()
    }
}
