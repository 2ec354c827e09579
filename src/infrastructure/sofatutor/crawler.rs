use super::video_page::{parse_video_page, VideoPage};
use super::{absolute_url, decode_html, element_text, selector, USER_AGENT};
use crate::domain::error::{AppError, Result};
use crate::domain::sofatutor::YearType;
use futures::future::{join_all, BoxFuture};
use once_cell::sync::Lazy;
use reqwest::Client;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Semaphore;

pub const SUBJECT_LEVEL_COOKIE: &str = "_sofatutor_subject_level";
const MAX_TOPIC_DEPTH: usize = 8;

static SUBJECT_CARDS: Lazy<Selector> = Lazy::new(|| selector("ul.subject-cards-list li"));
static LINK: Lazy<Selector> = Lazy::new(|| selector("a[href]"));
static SPAN: Lazy<Selector> = Lazy::new(|| selector("span"));
static STRUCTURE_HEADER: Lazy<Selector> =
    Lazy::new(|| selector("section.content-structure-header h1"));
static STRUCTURE_TEXT: Lazy<Selector> = Lazy::new(|| selector("section.content-structure-text"));
static STRUCTURE_TOPICS: Lazy<Selector> =
    Lazy::new(|| selector("section.content-structure-topics"));
static LIST_ITEM: Lazy<Selector> = Lazy::new(|| selector("li"));
static TOPIC_DESCRIPTION: Lazy<Selector> =
    Lazy::new(|| selector("section.content-topic-description"));
static VIDEO_LINKS: Lazy<Selector> = Lazy::new(|| selector("ul.list-video-meta li a[href]"));

/// Which levels of a subject get crawled.
#[derive(Debug, Clone, Copy)]
pub struct SubjectPlan {
    pub subject: &'static str,
    pub year_type: YearType,
    pub years: &'static [i32],
}

pub const CRAWL_PLAN: &[SubjectPlan] = &[
    SubjectPlan {
        subject: "Mathematik",
        year_type: YearType::Grade,
        years: &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13],
    },
    SubjectPlan {
        subject: "Deutsch",
        year_type: YearType::Grade,
        years: &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13],
    },
    SubjectPlan {
        subject: "Biologie",
        year_type: YearType::Grade,
        years: &[5, 6, 7, 8, 9, 10, 11, 12, 13],
    },
    SubjectPlan {
        subject: "Physik",
        year_type: YearType::Grade,
        years: &[5, 6, 7, 8, 9, 10, 11, 12, 13],
    },
    SubjectPlan {
        subject: "Chemie",
        year_type: YearType::Grade,
        years: &[6, 7, 8, 9, 10, 11, 12, 13],
    },
    SubjectPlan {
        subject: "Sachunterricht",
        year_type: YearType::Grade,
        years: &[1, 2, 3, 4],
    },
    SubjectPlan {
        subject: "Musik",
        year_type: YearType::Grade,
        years: &[5, 6, 7, 8, 9, 10, 11, 12, 13],
    },
    SubjectPlan {
        subject: "Englisch",
        year_type: YearType::LearnYear,
        years: &[1, 2, 3, 4, 5, 6, 7],
    },
];

#[derive(Debug, Clone, PartialEq)]
pub struct SubjectLink {
    pub subject: String,
    pub href: String,
}

impl SubjectLink {
    /// Last path segment of the subject link, e.g. `mathematik`.
    pub fn code(&self) -> &str {
        self.href.trim_end_matches('/').rsplit('/').next().unwrap_or("")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TopicVideos {
    pub topic: String,
    pub topic_description: Option<String>,
    pub videos: Vec<VideoPage>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubTopic {
    pub label: String,
    pub content: TopicNode,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TopicNode {
    pub href: String,
    pub url: String,
    pub topic: String,
    #[serde(default)]
    pub content_structure_text: Option<String>,
    #[serde(default)]
    pub sub_topics: Vec<SubTopic>,
    #[serde(default)]
    pub video_content: Option<TopicVideos>,
}

/// Everything crawled for one subject level, stored as `<Subject>-<year>.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LevelDetails {
    pub subject: String,
    pub year: i32,
    pub year_type: YearType,
    pub topic_overview: Option<String>,
    #[serde(default)]
    pub topics: Vec<TopicNode>,
}

#[derive(Debug, Default, PartialEq)]
struct TopicPage {
    header: Option<String>,
    structure_text: Option<String>,
    topic_description: Option<String>,
    sub_topics: Vec<(String, String)>,
    video_hrefs: Vec<String>,
}

#[derive(Debug, Default, PartialEq)]
struct LevelPage {
    topic_overview: Option<String>,
    topic_hrefs: Vec<String>,
}

fn parse_subjects(html: &str) -> Vec<SubjectLink> {
    let document = Html::parse_document(html);
    document
        .select(&SUBJECT_CARDS)
        .filter_map(|li| {
            let href = li.select(&LINK).next()?.value().attr("href")?.to_string();
            let subject = li.select(&SPAN).next().map(element_text)?;
            Some(SubjectLink { subject, href })
        })
        .collect()
}

fn parse_level_page(html: &str) -> LevelPage {
    let document = Html::parse_document(html);
    let topic_overview = document
        .select(&STRUCTURE_TEXT)
        .map(element_text)
        .filter(|text| text.contains("Themenübersicht"))
        .last();

    let topic_hrefs = document
        .select(&STRUCTURE_TOPICS)
        .filter(|section| element_text(*section).contains("Themenbereiche"))
        .last()
        .map(|section| {
            section
                .select(&LIST_ITEM)
                .filter_map(|li| li.select(&LINK).next()?.value().attr("href").map(String::from))
                .collect()
        })
        .unwrap_or_default();

    LevelPage {
        topic_overview,
        topic_hrefs,
    }
}

fn parse_topic_page(html: &str) -> TopicPage {
    let document = Html::parse_document(html);

    let sub_topics = document
        .select(&STRUCTURE_TOPICS)
        .flat_map(|section| section.select(&LIST_ITEM).collect::<Vec<_>>())
        .filter_map(|li| {
            let a = li.select(&LINK).next()?;
            let href = a.value().attr("href")?.to_string();
            let label = a
                .value()
                .attr("data-tracking-label")
                .map(String::from)
                .unwrap_or_else(|| element_text(a));
            Some((href, label))
        })
        .collect();

    TopicPage {
        header: document.select(&STRUCTURE_HEADER).next().map(element_text),
        structure_text: document
            .select(&STRUCTURE_TEXT)
            .map(element_text)
            .find(|text| text.contains("Themenübersicht")),
        topic_description: document.select(&TOPIC_DESCRIPTION).next().map(element_text),
        sub_topics,
        video_hrefs: document
            .select(&VIDEO_LINKS)
            .filter_map(|a| a.value().attr("href").map(String::from))
            .collect(),
    }
}

/// Walks the public topic trees of the site. Requests share one
/// semaphore so nested topics never exceed `max_concurrent` connections.
pub struct SofatutorCrawler {
    client: Client,
    permits: Arc<Semaphore>,
}

impl SofatutorCrawler {
    pub fn new(max_concurrent: usize) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        })
    }

    /// `None` for non-success responses.
    async fn get_html(&self, url: &str, cookie: Option<&str>) -> Result<Option<String>> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| AppError::Internal(format!("Semaphore closed: {}", e)))?;

        let mut request = self.client.get(url);
        if let Some(cookie) = cookie {
            request = request.header(reqwest::header::COOKIE, cookie);
        }
        let response = request
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to fetch URL: {}", e)))?;

        if !response.status().is_success() {
            tracing::warn!("HTTP error {}: {}", response.status(), url);
            return Ok(None);
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to read response body: {}", e)))?;
        Ok(Some(decode_html(&bytes)))
    }

    pub async fn get_subjects(&self) -> Result<Vec<SubjectLink>> {
        let html = self
            .get_html(super::SOFATUTOR_URL, None)
            .await?
            .ok_or_else(|| AppError::NotFound("Failed to retrieve the home page".to_string()))?;
        Ok(parse_subjects(&html))
    }

    pub fn level_cookie(subject: &SubjectLink, year_type: YearType, year: i32) -> String {
        format!(
            "{}={}-{}-{}",
            SUBJECT_LEVEL_COOKIE,
            year_type.url_segment(),
            year,
            subject.code()
        )
    }

    pub fn level_url(subject: &SubjectLink, year_type: YearType, year: i32) -> String {
        format!(
            "{}/{}-{}",
            absolute_url(subject.href.trim_end_matches('/')),
            year_type.url_segment(),
            year
        )
    }

    /// Crawls one subject level; `None` when the level page does not exist.
    pub async fn crawl_level(
        &self,
        subject: &SubjectLink,
        year_type: YearType,
        year: i32,
    ) -> Result<Option<LevelDetails>> {
        let cookie = Self::level_cookie(subject, year_type, year);
        let url = format!("{}?ref=videos", Self::level_url(subject, year_type, year));
        tracing::info!("Crawling {} ({})", url, cookie);

        let Some(html) = self.get_html(&url, Some(&cookie)).await? else {
            return Ok(None);
        };
        let level = parse_level_page(&html);
        if level.topic_hrefs.is_empty() {
            tracing::warn!("No topics found for {}", url);
        }

        let walks = level
            .topic_hrefs
            .iter()
            .map(|href| self.walk_topics(href.clone(), &cookie, 0));
        let mut topics = Vec::new();
        for (href, result) in level.topic_hrefs.iter().zip(join_all(walks).await) {
            match result {
                Ok(Some(topic)) => topics.push(topic),
                Ok(None) => tracing::warn!("Topic page without content: {}", href),
                Err(e) => tracing::error!("Failed to process topic {}: {}", href, e),
            }
        }

        Ok(Some(LevelDetails {
            subject: subject.subject.clone(),
            year,
            year_type,
            topic_overview: level.topic_overview,
            topics,
        }))
    }

    fn walk_topics<'a>(
        &'a self,
        href: String,
        cookie: &'a str,
        depth: usize,
    ) -> BoxFuture<'a, Result<Option<TopicNode>>> {
        Box::pin(async move {
            let url = absolute_url(&href);
            tracing::debug!("Processing topic {}", url);
            let Some(html) = self.get_html(&url, Some(cookie)).await? else {
                return Ok(None);
            };
            let page = parse_topic_page(&html);
            let Some(topic) = page.header.clone() else {
                return Ok(None);
            };

            if page.sub_topics.is_empty() || depth >= MAX_TOPIC_DEPTH {
                let video_content = self.collect_videos(&topic, &page).await;
                return Ok(Some(TopicNode {
                    href,
                    url,
                    topic,
                    content_structure_text: page.structure_text,
                    sub_topics: Vec::new(),
                    video_content: Some(video_content),
                }));
            }

            let walks = page
                .sub_topics
                .iter()
                .map(|(sub_href, _)| self.walk_topics(sub_href.clone(), cookie, depth + 1));
            let mut sub_topics = Vec::new();
            for ((sub_href, label), result) in page.sub_topics.iter().zip(join_all(walks).await) {
                match result {
                    Ok(Some(content)) => sub_topics.push(SubTopic {
                        label: label.clone(),
                        content,
                    }),
                    Ok(None) => {}
                    Err(e) => tracing::error!("Failed to process topic {}: {}", sub_href, e),
                }
            }

            Ok(Some(TopicNode {
                href,
                url,
                topic,
                content_structure_text: page.structure_text,
                sub_topics,
                video_content: None,
            }))
        })
    }

    async fn collect_videos(&self, topic: &str, page: &TopicPage) -> TopicVideos {
        let fetches = page.video_hrefs.iter().map(|href| async move {
            let url = absolute_url(href);
            tracing::info!("Processing video page {}", url);
            match self.get_html(&url, None).await {
                Ok(Some(html)) => Some(parse_video_page(&url, &html)),
                Ok(None) => None,
                Err(e) => {
                    tracing::error!("Failed to fetch video {}: {}", url, e);
                    None
                }
            }
        });
        let videos = join_all(fetches).await.into_iter().flatten().collect();

        TopicVideos {
            topic: topic.to_string(),
            topic_description: page.topic_description.clone(),
            videos,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_subjects() {
        let html = r#"<ul class="subject-cards-list">
            <li><a href="/mathematik"><span>Mathematik</span></a></li>
            <li><a href="/englisch"><span>Englisch</span></a></li>
        </ul>"#;
        let subjects = parse_subjects(html);
        assert_eq!(subjects.len(), 2);
        assert_eq!(subjects[0].subject, "Mathematik");
        assert_eq!(subjects[1].code(), "englisch");
    }

    #[test]
    fn test_level_url_and_cookie() {
        let subject = SubjectLink {
            subject: "Mathematik".to_string(),
            href: "/mathematik".to_string(),
        };
        assert_eq!(
            SofatutorCrawler::level_url(&subject, YearType::Grade, 2),
            "https://www.sofatutor.com/mathematik/klasse-2"
        );
        assert_eq!(
            SofatutorCrawler::level_cookie(&subject, YearType::LearnYear, 3),
            "_sofatutor_subject_level=lernjahr-3-mathematik"
        );
    }

    #[test]
    fn test_parse_level_page() {
        let html = r#"
            <section class="content-structure-text"><p>Themenübersicht Mathe</p></section>
            <section class="content-structure-topics"><h2>Themenbereiche</h2>
              <ul><li><a href="/mathematik/zahlen">Zahlen</a></li>
                  <li><a href="/mathematik/geometrie">Geometrie</a></li></ul>
            </section>"#;
        let level = parse_level_page(html);
        assert_eq!(level.topic_overview.as_deref(), Some("Themenübersicht Mathe"));
        assert_eq!(level.topic_hrefs, vec!["/mathematik/zahlen", "/mathematik/geometrie"]);
    }

    #[test]
    fn test_parse_topic_page_with_videos() {
        let html = r#"
            <section class="content-structure-header"><h1>Addition</h1></section>
            <section class="content-topic-description">Plus rechnen</section>
            <ul class="list-video-meta">
              <li><a href="/mathematik/videos/plus-bis-10">Plus bis 10</a></li>
              <li><a href="/mathematik/videos/plus-bis-20">Plus bis 20</a></li>
            </ul>"#;
        let page = parse_topic_page(html);
        assert_eq!(page.header.as_deref(), Some("Addition"));
        assert_eq!(page.topic_description.as_deref(), Some("Plus rechnen"));
        assert!(page.sub_topics.is_empty());
        assert_eq!(page.video_hrefs.len(), 2);
    }

    #[test]
    fn test_parse_topic_page_with_sub_topics() {
        let html = r#"
            <section class="content-structure-header"><h1>Zahlen</h1></section>
            <section class="content-structure-topics"><ul>
              <li><a href="/m/zahlen/bis-20" data-tracking-label="Zahlen bis 20">x</a></li>
              <li><a href="/m/zahlen/bis-100">Zahlen bis 100</a></li>
            </ul></section>"#;
        let page = parse_topic_page(html);
        assert_eq!(
            page.sub_topics,
            vec![
                ("/m/zahlen/bis-20".to_string(), "Zahlen bis 20".to_string()),
                ("/m/zahlen/bis-100".to_string(), "Zahlen bis 100".to_string()),
            ]
        );
    }

    #[test]
    fn test_level_details_round_trip_defaults() {
        let raw = r#"{"subject": "Mathematik", "year": 2, "year_type": "grade",
            "topic_overview": null,
            "topics": [{"href": "/a", "url": "https://www.sofatutor.com/a", "topic": "A"}]}"#;
        let details: LevelDetails = serde_json::from_str(raw).unwrap();
        assert_eq!(details.topics[0].sub_topics.len(), 0);
        assert!(details.topics[0].video_content.is_none());
    }
}
