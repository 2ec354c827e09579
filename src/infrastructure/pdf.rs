use crate::domain::error::{AppError, Result};
use lopdf::Document;
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub struct PdfPage {
    /// 0-based position in the document.
    pub index: usize,
    pub content: String,
}

/// Text of every page in page order. Pages without a text layer are kept
/// with empty content so indices stay aligned with the document.
pub fn load_pdf_pages(path: &Path) -> Result<Vec<PdfPage>> {
    let document = Document::load(path).map_err(|e| {
        AppError::ParseError(format!("Failed to load PDF {}: {}", path.display(), e))
    })?;

    let mut pages = Vec::new();
    for (index, page_number) in document.get_pages().into_keys().enumerate() {
        let content = match document.extract_text(&[page_number]) {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                tracing::warn!(
                    "No text on page {} of {}: {}",
                    page_number,
                    path.display(),
                    e
                );
                String::new()
            }
        };
        pages.push(PdfPage { index, content });
    }

    tracing::debug!("Loaded {} pages from {}", pages.len(), path.display());
    Ok(pages)
}

pub fn join_pages(pages: &[PdfPage], separator: &str) -> String {
    pages
        .iter()
        .map(|page| page.content.as_str())
        .collect::<Vec<_>>()
        .join(separator)
}
