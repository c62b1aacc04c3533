//! Deterministic tokenizer used for chunk sizing
//!
//! A token is a "core" plus the whitespace that follows it. A core is either
//! a run of at most `MAX_PIECE_CHARS` alphanumeric characters (longer runs are
//! cut into pieces of that size) or one other non-whitespace character.
//! Whitespace at the very start of a text forms a token of its own.
//!
//! Spans cover the whole input without gaps, so slicing a text at token
//! boundaries and recounting the pieces gives back the same total.

/// Longest alphanumeric run kept as a single token
pub const MAX_PIECE_CHARS: usize = 6;

/// Byte range of one token within the source text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenSpan {
    /// First byte of the token
    pub start: usize,

    /// End of the core (start of the trailing whitespace)
    pub core_end: usize,

    /// End of the token including trailing whitespace
    pub end: usize,
}

impl TokenSpan {
    /// The token without its trailing whitespace
    pub fn core<'a>(&self, text: &'a str) -> &'a str {
        &text[self.start..self.core_end]
    }

    /// Whitespace that follows the core
    pub fn trailing<'a>(&self, text: &'a str) -> &'a str {
        &text[self.core_end..self.end]
    }
}

/// Splits `text` into token spans
pub fn tokenize(text: &str) -> Vec<TokenSpan> {
    let mut spans = Vec::new();
    let mut chars = text.char_indices().peekable();

    let mut leading_end = 0;
    while let Some(&(i, c)) = chars.peek() {
        if !c.is_whitespace() {
            break;
        }
        leading_end = i + c.len_utf8();
        chars.next();
    }
    if leading_end > 0 {
        spans.push(TokenSpan {
            start: 0,
            core_end: leading_end,
            end: leading_end,
        });
    }

    while let Some((start, c)) = chars.next() {
        let mut core_end = start + c.len_utf8();

        if c.is_alphanumeric() {
            let mut piece_len = 1;
            while piece_len < MAX_PIECE_CHARS {
                match chars.peek() {
                    Some(&(i, next)) if next.is_alphanumeric() => {
                        core_end = i + next.len_utf8();
                        piece_len += 1;
                        chars.next();
                    }
                    _ => break,
                }
            }
        }

        let mut end = core_end;
        while let Some(&(i, next)) = chars.peek() {
            if !next.is_whitespace() {
                break;
            }
            end = i + next.len_utf8();
            chars.next();
        }

        spans.push(TokenSpan {
            start,
            core_end,
            end,
        });
    }

    spans
}

/// Counts tokens in `text`
///
/// # Examples
///
/// ```
/// use context_scraper::chunker::count_tokens;
///
/// assert_eq!(count_tokens("Hello, world!"), 4);
/// assert_eq!(count_tokens(""), 0);
/// ```
pub fn count_tokens(text: &str) -> usize {
    tokenize(text).len()
}
