use crate::application::use_cases::batch::BatchReport;
use crate::domain::error::Result;
use crate::domain::sofatutor::{
    clean_description, ActivityType, SofatutorLearningActivity, YearType, TEST_MARKER,
};
use crate::infrastructure::sofatutor::activity_list::{parse_export_file, ActivityListItem};
use crate::infrastructure::sofatutor::catalog::{rows_from_details, VideoCatalog};
use crate::infrastructure::sofatutor::crawler::{LevelDetails, SofatutorCrawler, CRAWL_PLAN};
use crate::infrastructure::sofatutor::video_page::VideoPageFetcher;
use crate::infrastructure::storage::{list_files, load_json_dir, write_json, DataLayout};

#[derive(Debug, Clone, Copy, Default)]
pub struct ImportOptions {
    /// Overwrite activities that were imported before.
    pub force: bool,
    /// Fetch video pages for URLs missing from the catalogue.
    pub fetch_missing: bool,
}

/// Turns "Mein Sofa" exports into one activity file per completed item.
pub struct SofatutorImporter {
    layout: DataLayout,
    catalog: VideoCatalog,
    options: ImportOptions,
    fetcher: Option<VideoPageFetcher>,
}

impl SofatutorImporter {
    pub fn new(layout: DataLayout, catalog: VideoCatalog, options: ImportOptions) -> Self {
        let fetcher = options
            .fetch_missing
            .then(|| VideoPageFetcher::new(layout.sofa_video_cache_dir()));
        Self {
            layout,
            catalog,
            options,
            fetcher,
        }
    }

    /// Catalogue data for the item. URLs containing `practice_app` carry none.
    pub fn build_activity(&self, item: &ActivityListItem) -> (SofatutorLearningActivity, bool) {
        let url = item.url.trim();
        let activity_type = ActivityType::from_url(url);
        let mut activity = SofatutorLearningActivity {
            date_ref: item.date_ref,
            subject_label: item.subject_label.clone(),
            title: item.title.clone(),
            activity_type,
            total_tasks: item.total_tasks,
            tasks_completed: item.tasks_completed,
            url: url.to_string(),
            related_years: None,
            year_type: None,
            topic_chain: None,
            description: None,
        };
        if activity_type == ActivityType::Practice {
            return (activity, true);
        }

        let lookup_url = url.replace(TEST_MARKER, "");
        match self.catalog.lookup(&lookup_url) {
            Some(found) => {
                activity.related_years = Some(found.related_years.clone());
                activity.year_type = found.year_type();
                activity.topic_chain = found.row.topic_chain.clone();
                activity.description = found.row.description.as_deref().map(clean_description);
                (activity, true)
            }
            None => {
                tracing::warn!("No catalogue entry for {}", lookup_url);
                (activity, false)
            }
        }
    }

    async fn fill_from_video_page(&self, activity: &mut SofatutorLearningActivity) {
        let Some(fetcher) = &self.fetcher else {
            return;
        };
        let url = activity.url.replace(TEST_MARKER, "");
        match fetcher.fetch(&url).await {
            Ok(page) => {
                activity.description = page.description.as_deref().map(clean_description);
            }
            Err(e) => tracing::warn!("Could not fetch video page {}: {}", url, e),
        }
    }

    pub async fn import_all(&self) -> Result<BatchReport> {
        let out_dir = self.layout.sofa_activities_dir();
        let mut report = BatchReport::default();

        for export in self.layout.sofa_export_pages()? {
            tracing::info!("Parsing {}", export.display());
            let items = match parse_export_file(&export) {
                Ok(items) => items,
                Err(e) => {
                    report.fail(export.display().to_string(), &e);
                    continue;
                }
            };

            for item in &items {
                let (mut activity, found) = self.build_activity(item);
                let out_path = out_dir.join(activity.default_file_name());
                if out_path.is_file() && !self.options.force {
                    report.skipped += 1;
                    continue;
                }
                if !found {
                    self.fill_from_video_page(&mut activity).await;
                }
                match write_json(&out_path, &activity) {
                    Ok(()) => report.written += 1,
                    Err(e) => report.fail(out_path.display().to_string(), &e),
                }
            }
        }
        tracing::info!("Sofatutor import: {}", report);
        Ok(report)
    }
}

/// Crawls every planned subject level that has no details file yet.
pub async fn crawl_catalog(layout: &DataLayout, crawler: &SofatutorCrawler) -> Result<BatchReport> {
    let details_dir = layout.sofa_details_dir();
    let mut report = BatchReport::default();

    let subjects = crawler.get_subjects().await?;
    for plan in CRAWL_PLAN {
        let Some(subject) = subjects.iter().find(|s| s.subject == plan.subject) else {
            tracing::warn!("Subject {} not listed on the home page", plan.subject);
            continue;
        };
        for &year in plan.years {
            let out_path = details_dir.join(detail_file_name(plan.subject, year));
            if out_path.is_file() {
                report.skip(&out_path);
                continue;
            }
            match crawler.crawl_level(subject, plan.year_type, year).await {
                Ok(Some(details)) => match write_json(&out_path, &details) {
                    Ok(()) => report.wrote(&out_path),
                    Err(e) => report.fail(format!("{}-{}", plan.subject, year), &e),
                },
                Ok(None) => tracing::warn!("No level page for {} {} {}", plan.subject, level_label(plan.year_type), year),
                Err(e) => report.fail(format!("{}-{}", plan.subject, year), &e),
            }
        }
    }
    Ok(report)
}

pub fn detail_file_name(subject: &str, year: i32) -> String {
    format!("{}-{}.json", subject, year)
}

fn level_label(year_type: YearType) -> &'static str {
    match year_type {
        YearType::Grade => "Klasse",
        YearType::LearnYear => "Lernjahr",
    }
}

/// Flattens every details file into the CSV catalogue.
pub fn export_catalog(layout: &DataLayout) -> Result<VideoCatalog> {
    let details_dir = layout.sofa_details_dir();
    tracing::info!(
        "Exporting {} details files",
        list_files(&details_dir, "json")?.len()
    );
    let details: Vec<LevelDetails> = load_json_dir(&details_dir)?;
    let rows = details.iter().flat_map(rows_from_details).collect();
    let catalog = VideoCatalog::new(rows);
    catalog.write_csv(&layout.sofa_catalog_csv())?;
    tracing::info!(
        "Wrote {} videos to {}",
        catalog.rows().len(),
        layout.sofa_catalog_csv().display()
    );
    Ok(catalog)
}
