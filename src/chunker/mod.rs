//! Token-aware chunking of cleaned page content
//!
//! Content is split on paragraph boundaries first. A paragraph that alone
//! exceeds the limit is split at sentence ends, and a sentence that still
//! exceeds it is cut into windows of whole tokens. The resulting units are
//! packed greedily into chunks of at most `max_tokens` tokens.
//!
//! Chunk texts are contiguous slices of the content, so concatenating the
//! chunks of a page in index order reproduces the content exactly.

mod tokenizer;

pub use tokenizer::{count_tokens, tokenize, TokenSpan, MAX_PIECE_CHARS};

use crate::crawler::PageRecord;
use std::ops::Range;

/// A bounded-size slice of a page's cleaned text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// URL of the page this chunk came from
    pub source_url: String,

    /// Position in the page's chunk sequence, starting at 0
    pub sequence_index: usize,

    /// Chunk text
    pub text: String,

    /// Number of tokens in `text`
    pub token_count: usize,
}

/// Splits a page record into chunks of at most `max_tokens` tokens
pub fn chunk(record: &PageRecord, max_tokens: usize) -> Vec<Chunk> {
    chunk_text(record.url.as_str(), &record.cleaned_content, max_tokens)
}

/// Splits `text` into chunks of at most `max_tokens` tokens
///
/// A `max_tokens` of 0 is treated as 1.
///
/// # Examples
///
/// ```
/// use context_scraper::chunker::chunk_text;
///
/// let chunks = chunk_text("https://example.com/", "One.\n\nTwo.", 2);
/// assert_eq!(chunks.len(), 2);
/// assert_eq!(chunks[0].text, "One.\n\n");
/// assert_eq!(chunks[1].sequence_index, 1);
/// ```
pub fn chunk_text(source_url: &str, text: &str, max_tokens: usize) -> Vec<Chunk> {
    let max_tokens = max_tokens.max(1);
    let spans = tokenize(text);
    if spans.is_empty() {
        return Vec::new();
    }

    let units = split_units(text, &spans, max_tokens);
    pack_units(&units, max_tokens)
        .into_iter()
        .enumerate()
        .map(|(sequence_index, range)| Chunk {
            source_url: source_url.to_string(),
            sequence_index,
            text: text[spans[range.start].start..spans[range.end - 1].end].to_string(),
            token_count: range.len(),
        })
        .collect()
}

/// Breaks the token sequence into units no larger than `max_tokens`
fn split_units(text: &str, spans: &[TokenSpan], max_tokens: usize) -> Vec<Range<usize>> {
    let mut units = Vec::new();

    for paragraph in split_after(spans, 0..spans.len(), |s| is_paragraph_end(text, s)) {
        if paragraph.len() <= max_tokens {
            units.push(paragraph);
            continue;
        }

        for sentence in split_after(spans, paragraph, |s| is_sentence_end(text, s)) {
            if sentence.len() <= max_tokens {
                units.push(sentence);
                continue;
            }

            let mut start = sentence.start;
            while start < sentence.end {
                let end = (start + max_tokens).min(sentence.end);
                units.push(start..end);
                start = end;
            }
        }
    }

    units
}

/// Splits `range` into runs that each end at a token matching `is_end`
///
/// The final run ends at the range end whether or not its last token matches.
fn split_after<F>(spans: &[TokenSpan], range: Range<usize>, is_end: F) -> Vec<Range<usize>>
where
    F: Fn(&TokenSpan) -> bool,
{
    let mut runs = Vec::new();
    let mut start = range.start;

    for idx in range.clone() {
        if is_end(&spans[idx]) || idx + 1 == range.end {
            runs.push(start..idx + 1);
            start = idx + 1;
        }
    }

    runs
}

/// Greedily merges adjacent units while the total stays within `max_tokens`
fn pack_units(units: &[Range<usize>], max_tokens: usize) -> Vec<Range<usize>> {
    let mut chunks: Vec<Range<usize>> = Vec::new();

    for unit in units {
        match chunks.last_mut() {
            Some(current) if current.len() + unit.len() <= max_tokens => {
                current.end = unit.end;
            }
            _ => chunks.push(unit.clone()),
        }
    }

    chunks
}

fn is_paragraph_end(text: &str, span: &TokenSpan) -> bool {
    span.trailing(text).matches('\n').count() >= 2
}

fn is_sentence_end(text: &str, span: &TokenSpan) -> bool {
    matches!(span.core(text), "." | "!" | "?") && !span.trailing(text).is_empty()
}
