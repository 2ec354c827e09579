use crate::application::use_cases::batch::BatchReport;
use crate::application::use_cases::prompt_engine::{PromptTemplate, PromptVars};
use crate::application::use_cases::structured_output::{generate_structured, ChainSettings, RESPONSE_LANGUAGE_VAR};
use crate::domain::error::{AppError, Result};
use crate::domain::nomy::{parse_data_file_name, parse_filename_info, NomyWeekSummaries, NomyWeekSummary};
use crate::domain::week::{get_date_range_for_week, is_valid_week_number, IsoWeek};
use crate::infrastructure::llm_clients::LLMClient;
use crate::infrastructure::pdf::{join_pages, load_pdf_pages};
use crate::infrastructure::storage::{list_files, write_json, DataLayout};
use chrono::{Datelike, Local};
use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

static PARSE_NOMY_WEEK: Lazy<PromptTemplate> = Lazy::new(|| {
    PromptTemplate::new(
        r#"
    |SYSTEM|

    # Expert school report parser

    You are parsing a weekly report from the Nomy School. The report contains activities for different
    subjects, with the teacher's name in parentheses. Parse this into a structured format.

    The report may contain one or more weeks. Each week starts with a header like "KW X | DD.MM.-DD.MM."
    followed by subject sections. Extract all weeks from the report.

    |USER|

    ## Report year and weeks

    Year: {year}
    Week numbers: {weeks}

    ## Weekly report content

    {content}

    ## Response format

    {response_format}

    ## Response language

    {response_language}
"#,
        &["year", "weeks", "content", "response_format", "response_language"],
    )
});

pub struct NomyReportParser {
    llm_client: Arc<dyn LLMClient + Send + Sync>,
    settings: ChainSettings,
}

impl NomyReportParser {
    pub fn new(llm_client: Arc<dyn LLMClient + Send + Sync>, settings: ChainSettings) -> Self {
        Self {
            llm_client,
            settings,
        }
    }

    pub async fn parse_pdf(&self, pdf_path: &Path) -> Result<Vec<NomyWeekSummary>> {
        let file_name = report_file_name(pdf_path);
        let (year, weeks) = parse_filename_info(&file_name, Local::now().year()).ok_or_else(|| {
            AppError::ValidationError(format!(
                "Could not parse year and week numbers from filename: {}",
                file_name
            ))
        })?;
        let pages = load_pdf_pages(pdf_path)?;
        self.parse_report(year, &weeks, &join_pages(&pages, "\n\n")).await
    }

    /// Asks for every week in `content`, then pins year and dates to what the
    /// file name says since the model tends to guess them wrong.
    pub async fn parse_report(&self, year: i32, weeks: &[u32], content: &str) -> Result<Vec<NomyWeekSummary>> {
        let vars = PromptVars::from([
            ("year", year.to_string()),
            ("weeks", format!("{:?}", weeks)),
            ("content", content.to_string()),
            (RESPONSE_LANGUAGE_VAR, self.settings.output_language.clone()),
        ]);
        let parsed: NomyWeekSummaries = generate_structured(
            self.llm_client.as_ref(),
            &self.settings.llm,
            &PARSE_NOMY_WEEK,
            &vars,
            self.settings.structured_retries,
        )
        .await?;

        parsed
            .summaries
            .into_iter()
            .map(|mut summary| {
                if !is_valid_week_number(summary.week_number) {
                    return Err(AppError::ValidationError(format!(
                        "Invalid week number in report: {}",
                        summary.week_number
                    )));
                }
                let (start_date, end_date) = get_date_range_for_week(year, summary.week_number)?;
                summary.year = year;
                summary.start_date = start_date;
                summary.end_date = end_date;
                Ok(summary)
            })
            .collect()
    }

    pub fn save_summaries(&self, layout: &DataLayout, summaries: &[NomyWeekSummary]) -> Result<Vec<PathBuf>> {
        let out_dir = layout.nomy_data_dir();
        let mut written = Vec::new();
        for summary in summaries {
            let path = out_dir.join(summary.file_name());
            write_json(&path, summary)?;
            written.push(path);
        }
        Ok(written)
    }

    /// Parses every report PDF that covers a week without a data file yet.
    pub async fn process_all(&self, layout: &DataLayout) -> Result<BatchReport> {
        let mut processed = processed_weeks(layout)?;
        let mut report = BatchReport::default();
        let current_year = Local::now().year();

        for pdf_path in list_files(&layout.nomy_reports_dir(), "pdf")? {
            tracing::info!("Checking {}", pdf_path.display());
            let file_name = report_file_name(&pdf_path);
            let Some((year, weeks)) = parse_filename_info(&file_name, current_year) else {
                tracing::warn!(
                    "Could not parse year and week numbers from filename: {}",
                    file_name
                );
                continue;
            };

            if weeks.iter().all(|week| processed.contains(&IsoWeek::new(year, *week))) {
                tracing::info!("Skipping {} - all weeks already processed", pdf_path.display());
                report.skipped += 1;
                continue;
            }

            tracing::info!("Processing {}", pdf_path.display());
            let saved = match self.parse_pdf(&pdf_path).await {
                Ok(summaries) => self.save_summaries(layout, &summaries).map(|paths| (summaries, paths)),
                Err(e) => Err(e),
            };
            match saved {
                Ok((summaries, paths)) => {
                    for summary in &summaries {
                        tracing::info!(
                            "Adding {} {} to processed weeks",
                            summary.year,
                            summary.week_number
                        );
                        processed.insert(summary.iso_week());
                    }
                    for path in paths {
                        report.wrote(&path);
                    }
                }
                Err(e) => report.fail(pdf_path.display().to_string(), &e),
            }
        }
        Ok(report)
    }
}

fn report_file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn processed_weeks(layout: &DataLayout) -> Result<HashSet<IsoWeek>> {
    let mut weeks = HashSet::new();
    for path in list_files(&layout.nomy_data_dir(), "json")? {
        let file_name = report_file_name(&path);
        match parse_data_file_name(&file_name) {
            Some(week) => {
                weeks.insert(week);
            }
            None => tracing::warn!("Could not parse year and week from {}", path.display()),
        }
    }
    Ok(weeks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::use_cases::test_support::{chain_settings, ScriptedLlmClient};
    use crate::infrastructure::storage::{read_json, write_text};
    use chrono::NaiveDate;

    const MODEL_ANSWER: &str = r#"{"summaries": [
        {"week_number": 5, "year": 2023, "start_date": "2023-01-01", "end_date": "2023-01-01",
         "subjects": [{"subject": "Deutsch", "teacher": "(Frau Klein)", "activities": ["Diktat"]}]},
        {"week_number": 6, "year": 2023, "start_date": "2023-01-01", "end_date": "2023-01-01",
         "subjects": []}
    ]}"#;

    #[tokio::test]
    async fn test_parse_report_corrects_year_and_dates() {
        let llm = Arc::new(ScriptedLlmClient::new(vec![Ok(MODEL_ANSWER.to_string())]));
        let parser = NomyReportParser::new(llm.clone(), chain_settings());

        let summaries = parser.parse_report(2025, &[5, 6], "KW 5 | 27.01.-31.01.").await.unwrap();

        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].year, 2025);
        assert_eq!(summaries[0].start_date, NaiveDate::from_ymd_opt(2025, 1, 27).unwrap());
        assert_eq!(summaries[0].end_date, NaiveDate::from_ymd_opt(2025, 2, 2).unwrap());
        assert_eq!(summaries[1].start_date, NaiveDate::from_ymd_opt(2025, 2, 3).unwrap());
        assert!(llm.prompts()[0].1.contains("Year: 2025\nWeek numbers: [5, 6]"));
    }

    #[tokio::test]
    async fn test_parse_report_rejects_impossible_week_number() {
        let answer = r#"{"summaries": [{"week_number": 4000000000, "year": 2025,
            "start_date": "2025-01-01", "end_date": "2025-01-01", "subjects": []}]}"#;
        let llm = Arc::new(ScriptedLlmClient::new(vec![Ok(answer.to_string())]));
        let parser = NomyReportParser::new(llm, chain_settings());

        let result = parser.parse_report(2025, &[5], "KW 5").await;
        assert!(matches!(result, Err(AppError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_save_summaries_uses_two_digit_weeks() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DataLayout::new(dir.path(), &dir.path().join("sofatutor"), "Schuljahre 1-2");
        let llm = Arc::new(ScriptedLlmClient::new(vec![Ok(MODEL_ANSWER.to_string())]));
        let parser = NomyReportParser::new(llm, chain_settings());

        let summaries = parser.parse_report(2025, &[5, 6], "").await.unwrap();
        let paths = parser.save_summaries(&layout, &summaries).unwrap();

        assert!(paths[0].ends_with("nomy_week_2025_05.json"));
        let loaded: NomyWeekSummary = read_json(&paths[0]).unwrap();
        assert_eq!(loaded, summaries[0]);
    }

    #[tokio::test]
    async fn test_process_all_skips_fully_processed_reports() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DataLayout::new(dir.path(), &dir.path().join("sofatutor"), "Schuljahre 1-2");
        write_text(&layout.nomy_reports_dir().join("Wochenberichte_2025_KW_5_6.pdf"), "").unwrap();
        write_text(&layout.nomy_reports_dir().join("Notizen.pdf"), "").unwrap();
        write_text(&layout.nomy_data_dir().join("nomy_week_2025_05.json"), "{}").unwrap();
        write_text(&layout.nomy_data_dir().join("nomy_week_2025_06.json"), "{}").unwrap();

        let llm = Arc::new(ScriptedLlmClient::new(vec![]));
        let parser = NomyReportParser::new(llm.clone(), chain_settings());
        let report = parser.process_all(&layout).await.unwrap();

        assert_eq!(report.skipped, 1);
        assert!(report.failed.is_empty());
        assert!(llm.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_process_all_reports_unreadable_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DataLayout::new(dir.path(), &dir.path().join("sofatutor"), "Schuljahre 1-2");
        write_text(&layout.nomy_reports_dir().join("Wochenberichte_2025_KW_7.pdf"), "kein pdf").unwrap();

        let parser = NomyReportParser::new(Arc::new(ScriptedLlmClient::new(vec![])), chain_settings());
        let report = parser.process_all(&layout).await.unwrap();

        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.written, 0);
    }
}
