pub mod activity_list;
pub mod catalog;
pub mod crawler;
pub mod video_page;

use crate::domain::error::{AppError, Result};
use scraper::{ElementRef, Selector};
use std::path::Path;
use url::Url;

pub const SOFATUTOR_URL: &str = "https://www.sofatutor.com";
pub const USER_AGENT: &str = "Mozilla/5.0";

pub(crate) fn selector(css: &str) -> Selector {
    // Only called with literal selectors.
    Selector::parse(css).unwrap()
}

/// Concatenated text of an element, trimmed.
pub(crate) fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Decodes HTML bytes as UTF-8, falling back to Windows-1252 for exports
/// saved by older browsers.
pub fn decode_html(bytes: &[u8]) -> String {
    let (text, _, had_errors) = encoding_rs::UTF_8.decode(bytes);
    if !had_errors {
        return text.into_owned();
    }
    tracing::debug!("Input is not valid UTF-8, decoding as Windows-1252");
    let (text, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
    text.into_owned()
}

pub fn read_html_file(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)
        .map_err(|e| AppError::IoError(format!("Failed to read {}: {}", path.display(), e)))?;
    Ok(decode_html(&bytes))
}

/// Resolves a link from a Sofatutor page against the site root.
pub(crate) fn absolute_url(href: &str) -> String {
    match Url::parse(SOFATUTOR_URL).and_then(|base| base.join(href)) {
        Ok(url) => url.to_string(),
        Err(_) => format!("{}{}", SOFATUTOR_URL, href),
    }
}
