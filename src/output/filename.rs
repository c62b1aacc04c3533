//! Deterministic file names derived from page URLs

use sha2::{Digest, Sha256};
use url::Url;

/// Longest sanitized path kept in a file stem
pub const MAX_STEM_PATH_CHARS: usize = 80;

/// Number of hex characters of the URL hash appended to each stem
const HASH_CHARS: usize = 8;

/// Builds the file stem for a page: `<sanitized-path>--<hash8>`
///
/// The hash covers the whole normalized URL (query included), so two URLs
/// that sanitize to the same path still get distinct files, and the same
/// URL always maps to the same file across runs.
///
/// # Examples
///
/// ```
/// use context_scraper::output::file_stem;
/// use url::Url;
///
/// let stem = file_stem(&Url::parse("https://docs.example.com/guide/intro").unwrap());
/// assert!(stem.starts_with("guide_intro--"));
/// assert_eq!(stem.len(), "guide_intro--".len() + 8);
/// ```
pub fn file_stem(url: &Url) -> String {
    let digest = hex::encode(Sha256::digest(url.as_str().as_bytes()));
    format!("{}--{}", sanitize_path(url.path()), &digest[..HASH_CHARS])
}

/// Turns a URL path into a safe file name fragment
///
/// Keeps ASCII alphanumerics, `.`, `-` and `_`; every other character
/// becomes `_`. The root path becomes `index`.
pub fn sanitize_path(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return "index".to_string();
    }

    let sanitized: String = trimmed
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .take(MAX_STEM_PATH_CHARS)
        .collect();

    // a stem made only of dots would be a hidden or relative path
    if sanitized.chars().all(|c| c == '.') {
        sanitized.replace('.', "_")
    } else {
        sanitized
    }
}
