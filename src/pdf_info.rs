//! Local PDF inspection: page count plus a short preview of the first page's text.

use anyhow::{anyhow, Result};
use lopdf::Document;
use std::io::Cursor;

/// Characters of first-page text returned in the preview.
pub const PREVIEW_CHARS: usize = 100;

/// Content types accepted as PDF. `application/octet-stream` is kept because
/// browsers and HTTP clients often label PDFs that way.
const PDF_CONTENT_TYPES: &[&str] = &["application/pdf", "application/octet-stream"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfInfo {
    pub pages: usize,
    pub first_page_text_preview: String,
}

pub fn is_pdf_content_type(content_type: &str) -> bool {
    PDF_CONTENT_TYPES.contains(&content_type)
}

/// Parse `data` with lopdf, count its pages and extract the first page's text.
///
/// A document without pages is an error, as is a first page whose content
/// stream cannot be decoded.
pub fn inspect_pdf(data: &[u8]) -> Result<PdfInfo> {
    let doc = Document::load_from(Cursor::new(data)).map_err(|e| anyhow!("{}", e))?;

    let pages = doc.get_pages();
    let first_page = *pages
        .keys()
        .next()
        .ok_or_else(|| anyhow!("document has no pages"))?;

    let text = doc
        .extract_text(&[first_page])
        .map_err(|e| anyhow!("failed to extract text from page {}: {}", first_page, e))?;

    Ok(PdfInfo {
        pages: pages.len(),
        first_page_text_preview: preview(&text, PREVIEW_CHARS),
    })
}

/// First `max_chars` characters of `text` (not bytes; never splits a code point).
fn preview(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
