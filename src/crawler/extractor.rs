//! HTML extractor for clean page records
//!
//! This module handles parsing fetched payloads to extract:
//! - The page title
//! - Cleaned main content, with navigation and boilerplate removed
//! - Links to follow (from <a> tags and canonical links)

use super::fetcher::FetchedPage;
use crate::chunker::count_tokens;
use crate::config::ExtractConfig;
use crate::ConfigError;
use chrono::{DateTime, Utc};
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use thiserror::Error;
use url::Url;

/// Elements whose content forms a block of its own
const BLOCK_ELEMENTS: &[&str] = &[
    "p", "h1", "h2", "h3", "h4", "h5", "h6", "li", "blockquote", "dt", "dd", "tr",
    "figcaption", "div", "section", "article", "main", "ul", "ol", "dl", "table", "thead",
    "tbody", "tfoot", "figure", "details", "summary", "caption", "hr", "body",
];

/// Candidate content roots, most specific first
const CONTENT_ROOTS: &[&str] = &["main", "article", "[role=main]", "body"];

/// Extraction failures
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Payload looks binary (contains NUL bytes)")]
    Binary,

    #[error("Malformed document: {0}")]
    Malformed(String),
}

/// Clean record of one page
#[derive(Debug, Clone)]
pub struct PageRecord {
    /// Normalized URL the page was requested under
    pub url: Url,

    pub title: String,

    /// Main content as blocks separated by blank lines
    pub cleaned_content: String,

    /// Absolute links in order of first appearance, without duplicates
    pub discovered_links: Vec<Url>,

    /// Token count of `cleaned_content`
    pub token_count: usize,

    /// When the record was extracted
    pub timestamp: DateTime<Utc>,
}

/// Turns fetched payloads into page records
#[derive(Debug, Clone)]
pub struct Extractor {
    exclude: Vec<Selector>,
}

impl Extractor {
    /// Compiles the configured exclusion selectors
    pub fn new(config: &ExtractConfig) -> Result<Self, ConfigError> {
        let exclude = config
            .exclude_selectors
            .iter()
            .map(|s| {
                Selector::parse(s).map_err(|e| ConfigError::InvalidSelector(format!("'{}': {:?}", s, e)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { exclude })
    }

    /// Extracts a page record from a fetched payload
    ///
    /// `url` is the normalized URL the page was requested under; relative
    /// links resolve against the final URL after redirects. A page with no
    /// extractable text yields a record with empty content, not an error.
    pub fn extract(&self, url: &Url, page: &FetchedPage) -> Result<PageRecord, ExtractError> {
        if page.payload.contains('\0') {
            return Err(ExtractError::Binary);
        }
        if is_mostly_undecodable(&page.payload) {
            return Err(ExtractError::Malformed(
                "payload is not valid UTF-8 text".to_string(),
            ));
        }

        let (title, cleaned_content, discovered_links) = if is_plain_text(&page.content_type) {
            (url.to_string(), clean_plain_text(&page.payload), Vec::new())
        } else {
            let document = Html::parse_document(&page.payload);
            let title = extract_title(&document).unwrap_or_else(|| url.to_string());
            let content = self.extract_content(&document);
            let links = extract_links(&document, &page.final_url);
            (title, content, links)
        };

        Ok(PageRecord {
            url: url.clone(),
            title,
            token_count: count_tokens(&cleaned_content),
            cleaned_content,
            discovered_links,
            timestamp: Utc::now(),
        })
    }

    fn extract_content(&self, document: &Html) -> String {
        let root = CONTENT_ROOTS
            .iter()
            .filter_map(|s| Selector::parse(s).ok())
            .find_map(|selector| document.select(&selector).next())
            .unwrap_or_else(|| document.root_element());

        let mut blocks = BlockBuilder::default();
        if !self.is_excluded(&root) {
            self.walk(root, &mut blocks);
        }
        blocks.finish()
    }

    fn is_excluded(&self, element: &ElementRef<'_>) -> bool {
        self.exclude.iter().any(|selector| selector.matches(element))
    }

    /// Collects text under `element`, skipping excluded subtrees
    fn walk(&self, element: ElementRef<'_>, blocks: &mut BlockBuilder) {
        for child in element.children() {
            match child.value() {
                Node::Text(text) => blocks.push_inline(text),
                Node::Element(_) => {
                    let Some(child) = ElementRef::wrap(child) else {
                        continue;
                    };
                    if self.is_excluded(&child) {
                        continue;
                    }

                    match child.value().name() {
                        "pre" => {
                            blocks.flush();
                            blocks.push_preformatted(&child.text().collect::<String>());
                        }
                        "br" => blocks.push_inline(" "),
                        "td" | "th" => {
                            self.walk(child, blocks);
                            blocks.push_inline(" ");
                        }
                        name if BLOCK_ELEMENTS.contains(&name) => {
                            blocks.flush();
                            self.walk(child, blocks);
                            blocks.flush();
                        }
                        _ => self.walk(child, blocks),
                    }
                }
                _ => {}
            }
        }
    }
}

/// Accumulates inline text into whitespace-collapsed blocks
#[derive(Debug, Default)]
struct BlockBuilder {
    blocks: Vec<String>,
    inline: String,
}

impl BlockBuilder {
    fn push_inline(&mut self, text: &str) {
        self.inline.push_str(text);
    }

    fn push_preformatted(&mut self, text: &str) {
        let lines: Vec<&str> = text.lines().map(str::trim_end).collect();
        let block = lines.join("\n");
        let block = block.trim_matches('\n');
        if !block.trim().is_empty() {
            self.blocks.push(block.to_string());
        }
    }

    fn flush(&mut self) {
        let collapsed = self.inline.split_whitespace().collect::<Vec<_>>().join(" ");
        if !collapsed.is_empty() {
            self.blocks.push(collapsed);
        }
        self.inline.clear();
    }

    fn finish(mut self) -> String {
        self.flush();
        self.blocks.join("\n\n")
    }
}

/// Returns true if lossy decoding replaced more than a tenth of the characters
fn is_mostly_undecodable(payload: &str) -> bool {
    let total = payload.chars().count();
    let replaced = payload.chars().filter(|&c| c == char::REPLACEMENT_CHARACTER).count();
    total > 0 && replaced * 10 > total
}

fn is_plain_text(content_type: &str) -> bool {
    content_type
        .trim_start()
        .to_ascii_lowercase()
        .starts_with("text/plain")
}

/// Normalizes line endings and trims a plain-text payload
fn clean_plain_text(payload: &str) -> String {
    payload
        .replace("\r\n", "\n")
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Extracts the page title: `<title>`, then the first `<h1>`, then `og:title`
fn extract_title(document: &Html) -> Option<String> {
    let text_of = |selector: &str| -> Option<String> {
        let selector = Selector::parse(selector).ok()?;
        document
            .select(&selector)
            .map(|element| collapse(&element.text().collect::<String>()))
            .find(|s| !s.is_empty())
    };

    text_of("title").or_else(|| text_of("h1")).or_else(|| {
        let selector = Selector::parse("meta[property='og:title'][content]").ok()?;
        document
            .select(&selector)
            .filter_map(|element| element.value().attr("content"))
            .map(collapse)
            .find(|s| !s.is_empty())
    })
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Extracts followable links from the whole document, deduplicated in order
fn extract_links(document: &Html, base_url: &Url) -> Vec<Url> {
    let mut seen = HashSet::new();
    let mut links = Vec::new();
    let mut push = |url: Url| {
        if seen.insert(url.to_string()) {
            links.push(url);
        }
    };

    if let Ok(a_selector) = Selector::parse("a[href]") {
        for element in document.select(&a_selector) {
            if element.value().attr("download").is_some() {
                continue;
            }
            if let Some(url) = element.value().attr("href").and_then(|h| resolve_link(h, base_url)) {
                push(url);
            }
        }
    }

    if let Ok(canonical_selector) = Selector::parse("link[rel='canonical'][href]") {
        for element in document.select(&canonical_selector) {
            if let Some(url) = element.value().attr("href").and_then(|h| resolve_link(h, base_url)) {
                push(url);
            }
        }
    }

    links
}

/// Resolves a link href to an absolute URL
///
/// Returns None for empty hrefs, fragment-only anchors, pseudo-schemes
/// (`javascript:`, `mailto:`, `tel:`, `data:`) and hrefs that do not parse.
fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }

    base_url.join(href).ok()
}
