use super::{element_text, read_html_file, selector};
use crate::domain::error::Result;
use crate::domain::sofatutor::{parse_date_string, JOBS_PAGE_URL};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use std::path::Path;

static CONTAINER: Lazy<Selector> =
    Lazy::new(|| selector("div.account-activity-list-item-container"));
static DIV: Lazy<Selector> = Lazy::new(|| selector("div"));
static ITEM: Lazy<Selector> = Lazy::new(|| selector("ul"));
static LINK: Lazy<Selector> = Lazy::new(|| selector("a[href]"));
static SUBJECT_LABEL: Lazy<Selector> =
    Lazy::new(|| selector("div.acccount-activity-item__subject-label span"));
static TITLE: Lazy<Selector> = Lazy::new(|| selector("div.acccount-activity-item__title b"));
static TASK_ICON: Lazy<Selector> = Lazy::new(|| selector("i.content-item-state-icon"));
static COMPLETED_ICON: Lazy<Selector> =
    Lazy::new(|| selector("i.content-item-state-icon--complete"));
static YELLOW_STAR: Lazy<Selector> = Lazy::new(|| selector("i.icon--star.yellow"));

/// One entry of the "Mein Sofa" activity list.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityListItem {
    pub date_ref: NaiveDate,
    pub url: String,
    pub subject_label: String,
    pub title: String,
    pub total_tasks: u32,
    pub tasks_completed: u32,
}

pub fn parse_export_file(path: &Path) -> Result<Vec<ActivityListItem>> {
    let html = read_html_file(path)?;
    Ok(parse_activity_list(&html))
}

/// Completed activities with a subject, skipping the site's jobs banner.
pub fn parse_activity_list(html: &str) -> Vec<ActivityListItem> {
    let document = Html::parse_document(html);
    let mut activities = Vec::new();

    for container in document.select(&CONTAINER) {
        let date_text = container.select(&DIV).next().map(element_text).unwrap_or_default();
        let Some(date_ref) = parse_date_string(&date_text) else {
            tracing::warn!("Skipping activity group with unreadable date {:?}", date_text);
            continue;
        };

        for item in container.select(&ITEM) {
            if let Some(activity) = parse_item(item, date_ref) {
                activities.push(activity);
            }
        }
    }

    activities
}

fn parse_item(item: ElementRef<'_>, date_ref: NaiveDate) -> Option<ActivityListItem> {
    let url = item
        .select(&LINK)
        .next()
        .and_then(|a| a.value().attr("href"))?
        .trim()
        .to_string();
    if url == JOBS_PAGE_URL {
        return None;
    }

    let subject_label = item.select(&SUBJECT_LABEL).next().map(element_text)?;

    let mut tasks_completed = item.select(&COMPLETED_ICON).count();
    if tasks_completed == 0 {
        tasks_completed = item.select(&YELLOW_STAR).count();
    }
    if tasks_completed == 0 {
        return None;
    }

    let Some(title) = item.select(&TITLE).next().map(element_text) else {
        tracing::warn!("Activity without title: {}", url);
        return None;
    };

    Some(ActivityListItem {
        date_ref,
        url,
        subject_label,
        title,
        total_tasks: item.select(&TASK_ICON).count() as u32,
        tasks_completed: tasks_completed as u32,
    })
}
