//! Fragment segmentation.
//!
//! A text is cut into consecutive windows of `max_series` sentences. The last
//! window holds the remainder, so no sentence is dropped and concatenating
//! the fragments in `part` order restores the sentence sequence.

use tracing::trace;
use uuid::Uuid;

use etalon_core::{Error, Fragment, LinguisticNormalizer, Result};

/// Slice sentences into windows of at most `max_series` (`0` is treated as 1).
pub fn split_into_fragments(sentences: Vec<String>, max_series: usize) -> Vec<Vec<String>> {
    let size = max_series.max(1);
    let mut windows = Vec::with_capacity(sentences.len().div_ceil(size));
    let mut iter = sentences.into_iter().peekable();
    while iter.peek().is_some() {
        windows.push(iter.by_ref().take(size).collect());
    }
    windows
}

/// Tokenize `text` into sentences and segment it into fragments.
///
/// Fails with [`Error::EmptyText`] when the text has no sentences.
pub fn segment_text(
    normalizer: &dyn LinguisticNormalizer,
    text_id: Uuid,
    text: &str,
    max_series: usize,
) -> Result<Vec<Fragment>> {
    let sentences = normalizer.tokenize_sentences(text);
    if sentences.is_empty() {
        return Err(Error::EmptyText(text_id));
    }
    let sentence_count = sentences.len();

    let fragments: Vec<Fragment> = split_into_fragments(sentences, max_series)
        .into_iter()
        .enumerate()
        .map(|(part, sentences)| Fragment {
            text_id,
            part: part as i32,
            sentences,
        })
        .collect();

    trace!(
        subsystem = "engine",
        component = "segmenter",
        text_id = %text_id,
        sentence_count,
        fragment_count = fragments.len(),
        "Text segmented"
    );
    Ok(fragments)
}
