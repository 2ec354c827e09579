use super::{decode_html, element_text, selector, USER_AGENT};
use crate::domain::error::{AppError, Result};
use crate::infrastructure::storage::{read_json, write_json};
use once_cell::sync::Lazy;
use reqwest::Client;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::PathBuf;

static TITLE: Lazy<Selector> = Lazy::new(|| selector("a.videos-accordion__title b"));
static TITLE_FALLBACK: Lazy<Selector> = Lazy::new(|| selector("a.videos-accordion__title"));
static DESCRIPTION_PARAGRAPH: Lazy<Selector> =
    Lazy::new(|| selector("div.videos-accordion__content p"));
static DESCRIPTION: Lazy<Selector> = Lazy::new(|| selector("div.videos-accordion__content"));
static TRANSCRIPT: Lazy<Selector> =
    Lazy::new(|| selector("div.videos-transcript-accordion__inner div.markdown"));
static TRANSCRIPT_FALLBACK: Lazy<Selector> =
    Lazy::new(|| selector("div.videos-transcript-accordion__inner"));

const LOGIN_PROMPT: &str = "Noch nicht angemeldet?";
const SOCIAL_PROOF: &str = "Schülerinnen und Schüler haben bereits unsere Übungen absolviert.";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VideoPage {
    pub video_url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub transcript: Option<String>,
}

pub fn parse_video_page(url: &str, html: &str) -> VideoPage {
    let document = Html::parse_document(html);

    let title = document
        .select(&TITLE)
        .next()
        .or_else(|| document.select(&TITLE_FALLBACK).next())
        .map(element_text)
        .filter(|t| !t.is_empty());

    let description = document
        .select(&DESCRIPTION_PARAGRAPH)
        .next()
        .or_else(|| document.select(&DESCRIPTION).next())
        .map(element_text)
        .map(|d| strip_site_boilerplate(&d))
        .filter(|d| !d.is_empty());

    let transcript = document
        .select(&TRANSCRIPT)
        .next()
        .or_else(|| document.select(&TRANSCRIPT_FALLBACK).next())
        .map(element_text)
        .filter(|t| !t.is_empty());

    VideoPage {
        video_url: url.to_string(),
        title,
        description,
        transcript,
    }
}

/// Cuts the login prompt and the "students already did our exercises"
/// line together with everything after them.
fn strip_site_boilerplate(description: &str) -> String {
    let mut desc = match description.split_once(LOGIN_PROMPT) {
        Some((head, _)) => head.trim().to_string(),
        None => description.trim().to_string(),
    };
    if desc.contains(SOCIAL_PROOF) {
        desc = desc
            .lines()
            .take_while(|line| !line.contains(SOCIAL_PROOF))
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string();
    }
    desc
}

/// Downloads video pages and keeps the parsed result as JSON per URL.
pub struct VideoPageFetcher {
    client: Client,
    cache_dir: PathBuf,
}

impl VideoPageFetcher {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .user_agent(USER_AGENT)
                .build()
                .unwrap_or_else(|_| Client::new()),
            cache_dir,
        }
    }

    pub(crate) fn cache_path(&self, url: &str) -> PathBuf {
        let digest = hex::encode(Sha256::digest(url.as_bytes()));
        self.cache_dir.join(format!("{}.json", &digest[..16]))
    }

    pub async fn fetch(&self, url: &str) -> Result<VideoPage> {
        let cache_path = self.cache_path(url);
        if cache_path.is_file() {
            tracing::debug!("Video page cache hit for {}", url);
            return read_json(&cache_path);
        }

        tracing::info!("Fetching video page {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to fetch URL: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Internal(format!(
                "HTTP error {}: {}",
                response.status(),
                url
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to read response body: {}", e)))?;
        let page = parse_video_page(url, &decode_html(&bytes));

        write_json(&cache_path, &page)?;
        Ok(page)
    }
}
