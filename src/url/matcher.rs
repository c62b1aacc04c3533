/// Checks if a host matches a wildcard pattern
///
/// Two kinds of patterns are supported:
/// 1. Exact match: "docs.example.com" matches only "docs.example.com"
/// 2. Wildcard match: "*.example.com" matches the bare domain and any subdomain
///
/// Comparison is ASCII case-insensitive.
///
/// # Examples
///
/// ```
/// use context_scraper::url::matches_wildcard;
///
/// assert!(matches_wildcard("example.com", "example.com"));
/// assert!(!matches_wildcard("example.com", "other.com"));
/// assert!(matches_wildcard("*.example.com", "example.com"));
/// assert!(matches_wildcard("*.example.com", "api.v2.example.com"));
/// assert!(!matches_wildcard("*.example.com", "notexample.com"));
/// ```
pub fn matches_wildcard(pattern: &str, candidate: &str) -> bool {
    let pattern = pattern.to_ascii_lowercase();
    let candidate = candidate.to_ascii_lowercase();

    if let Some(base) = pattern.strip_prefix("*.") {
        candidate == base || candidate.ends_with(&format!(".{}", base))
    } else {
        candidate == pattern
    }
}

/// Checks if a path lies under a prefix on a segment boundary
///
/// "/docs" matches "/docs", "/docs/" and "/docs/intro" but not "/docsearch".
pub fn matches_path_prefix(prefix: &str, path: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return true;
    }

    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}
