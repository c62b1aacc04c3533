//! PDF rendering of cleaned page content
//!
//! `TextPdfRenderer` writes a plain PDF 1.4 document: the title followed by
//! the word-wrapped content in Helvetica, paginated on US Letter pages.

use super::{ExportError, ExportResult};
use std::fmt::Write as _;

/// Renders a page's title and cleaned content to PDF bytes
pub trait PdfRenderer: Send + Sync {
    fn render(&self, title: &str, content: &str) -> ExportResult<Vec<u8>>;
}

/// Paginated plain-text PDF renderer
#[derive(Debug, Clone)]
pub struct TextPdfRenderer {
    pub page_width: u32,
    pub page_height: u32,
    pub margin: u32,
    pub font_size: u32,
    pub leading: u32,
    /// Wrap width in characters
    pub line_chars: usize,
}

impl Default for TextPdfRenderer {
    fn default() -> Self {
        Self {
            page_width: 612,
            page_height: 792,
            margin: 72,
            font_size: 10,
            leading: 13,
            line_chars: 90,
        }
    }
}

impl TextPdfRenderer {
    fn lines_per_page(&self) -> usize {
        let usable = self.page_height.saturating_sub(2 * self.margin);
        ((usable / self.leading.max(1)) as usize).max(1)
    }

    /// Lays out title and content as wrapped lines
    fn layout_lines(&self, title: &str, content: &str) -> Vec<String> {
        let mut lines = wrap(title, self.line_chars);
        lines.push(String::new());
        for line in content.lines() {
            if line.trim().is_empty() {
                lines.push(String::new());
            } else {
                lines.extend(wrap(line, self.line_chars));
            }
        }
        lines
    }

    fn content_stream(&self, lines: &[String]) -> String {
        let mut stream = String::new();
        let _ = writeln!(stream, "BT");
        let _ = writeln!(stream, "/F1 {} Tf", self.font_size);
        let _ = writeln!(stream, "{} TL", self.leading);
        let _ = writeln!(
            stream,
            "{} {} Td",
            self.margin,
            self.page_height.saturating_sub(self.margin)
        );
        for line in lines {
            let _ = writeln!(stream, "({}) Tj", escape_pdf_text(line));
            let _ = writeln!(stream, "T*");
        }
        let _ = write!(stream, "ET");
        stream
    }
}

impl PdfRenderer for TextPdfRenderer {
    fn render(&self, title: &str, content: &str) -> ExportResult<Vec<u8>> {
        if self.line_chars == 0 {
            return Err(ExportError::Render("line width must be positive".to_string()));
        }

        let lines = self.layout_lines(title, content);
        let pages: Vec<&[String]> = lines.chunks(self.lines_per_page()).collect();

        // 1 catalog, 2 page tree, 3 font, then (page, contents) pairs
        let page_ids: Vec<usize> = (0..pages.len()).map(|i| 4 + 2 * i).collect();
        let kids = page_ids
            .iter()
            .map(|id| format!("{} 0 R", id))
            .collect::<Vec<_>>()
            .join(" ");

        let mut objects = vec![
            "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
            format!("<< /Type /Pages /Kids [{}] /Count {} >>", kids, pages.len()),
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
                .to_string(),
        ];
        for (page_lines, page_id) in pages.iter().zip(&page_ids) {
            objects.push(format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {} {}] \
                 /Resources << /Font << /F1 3 0 R >> >> /Contents {} 0 R >>",
                self.page_width,
                self.page_height,
                page_id + 1
            ));
            let stream = self.content_stream(page_lines);
            objects.push(format!(
                "<< /Length {} >>\nstream\n{}\nendstream",
                stream.len(),
                stream
            ));
        }

        let mut out = String::from("%PDF-1.4\n");
        let mut offsets = Vec::with_capacity(objects.len());
        for (i, body) in objects.iter().enumerate() {
            offsets.push(out.len());
            let _ = write!(out, "{} 0 obj\n{}\nendobj\n", i + 1, body);
        }

        let xref_offset = out.len();
        let _ = write!(out, "xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
        for offset in offsets {
            let _ = write!(out, "{:010} 00000 n \n", offset);
        }
        let _ = write!(
            out,
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_offset
        );

        Ok(out.into_bytes())
    }
}

/// Word-wraps one line to at most `width` characters
///
/// Words longer than the width are hard-split.
fn wrap(line: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in line.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > width {
            if current_len > 0 {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let rest = word.split_off(width);
            lines.push(word.into_iter().collect());
            word = rest;
        }

        let needed = if current_len == 0 { word.len() } else { current_len + 1 + word.len() };
        if needed > width && current_len > 0 {
            lines.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current_len += word.len();
        current.extend(word);
    }

    if current_len > 0 || lines.is_empty() {
        lines.push(current);
    }
    lines
}

/// Escapes a line for a PDF literal string
///
/// Characters outside printable ASCII are replaced with `?`, since the
/// standard Helvetica font carries no glyphs for them.
fn escape_pdf_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '(' | ')' | '\\' => {
                escaped.push('\\');
                escaped.push(c);
            }
            ' '..='~' => escaped.push(c),
            _ => escaped.push('?'),
        }
    }
    escaped
}
