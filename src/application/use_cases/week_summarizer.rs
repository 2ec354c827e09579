use crate::application::use_cases::batch::BatchReport;
use crate::application::use_cases::context::StudentContext;
use crate::application::use_cases::prompt_engine::{PromptTemplate, PromptVars};
use crate::application::use_cases::structured_output::{
    generate_structured, generate_text, ChainSettings, RESPONSE_LANGUAGE_VAR,
};
use crate::domain::error::{AppError, Result};
use crate::domain::learn_log::LearnLogMessage;
use crate::domain::nomy::NomyWeekSummary;
use crate::domain::sofatutor::SofatutorLearningActivity;
use crate::domain::week::{
    week_file_stem, IsoWeek, WeekActivities, WeekSourceCounts, WeekWindow, WeeklySummary,
};
use crate::infrastructure::llm_clients::LLMClient;
use crate::infrastructure::storage::{write_json, write_text};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use std::sync::Arc;

const NO_ENTRIES: &str = "No entries for this week.";

static LIST_WEEK_ACTIVITIES: Lazy<PromptTemplate> = Lazy::new(|| {
    PromptTemplate::new(
        r#"
    |SYSTEM|

    # Expert home schooling learning assistant

    You receive the homeschooling activities of a single student with age {age} recorded during the week:
    free-text logs written by the parents, the weekly report of the school the student attends part-time,
    and the completed activities of the Sofatutor learning platform. List the week's activities in a clear
    and readable format. Group the activities by school subject, using only the known subjects from the
    list provided in the user instructions. If the activity is not related to a school subject, group it
    under the "Other" category. Not all subjects need to be present in the logs.

    |USER|

    ## Logs for the week

    {logs}

    ## School report for the week

    {nomy}

    ## Sofatutor activities of the week

    {sofatutor}

    ## Known subjects

    {known_subjects}

    ## Additional explanations

    {additional_explanations}

    ## Further instructions
      - Only provide responses for subjects that really occur in the logs
      - Stick close to the actual logs, making only edits to improve readability and to give
        a standardized format
      - Do not make anything up

    ## Response format

    {response_format}

    ## Response language

    {response_language}
"#,
        &[
            "age",
            "logs",
            "nomy",
            "sofatutor",
            "known_subjects",
            "additional_explanations",
            "response_format",
            "response_language",
        ],
    )
});

static SUMMARIZE_WEEK: Lazy<PromptTemplate> = Lazy::new(|| {
    PromptTemplate::new(
        r#"
    |SYSTEM|

    # Expert home schooling learning assistant

    You receive a list of homeschooling activities of a single student with age {age} logged during the week.
    Write a short summary to explain what progress the student made during the week. The summary should be
    concise but informative. The target reader is an external instructor who monitors the student's progress
    and uses this to give advice to the parents.

    |USER|

    ## Activities

    {activities}

    ## Summary of the previous week

    {previous_summary}

    ## Further instructions
      - Respond with an unstructured text summary (no sections, paragraphs, bullet points or lists)
      - Do not judge or evaluate the activities, just summarize them
      - Do not list the activities again, except to give examples. You should rather describe general
        categories and the progress that was made. Be concise.
      - Where the previous week is given, point out continuations but do not repeat it

    ## Response language

    {response_language}
"#,
        &["age", "activities", "previous_summary", "response_language"],
    )
});

/// Everything recorded for one week.
#[derive(Debug, Clone)]
pub struct WeekSources {
    pub window: WeekWindow,
    pub logs: Vec<LearnLogMessage>,
    pub nomy: Vec<NomyWeekSummary>,
    pub sofatutor: Vec<SofatutorLearningActivity>,
    pub previous: Option<WeeklySummary>,
}

impl WeekSources {
    pub fn collect(context: &StudentContext, window: WeekWindow) -> Result<Self> {
        let logs: Vec<LearnLogMessage> = context
            .load_logs()?
            .into_iter()
            .filter(|log| window.contains(log.date()))
            .collect();

        let nomy: Vec<NomyWeekSummary> = context
            .load_nomy_summaries()?
            .into_iter()
            .filter(|summary| {
                summary.iso_week() == window.week || window.overlaps(summary.start_date, summary.end_date)
            })
            .collect();

        let mut sofatutor: Vec<SofatutorLearningActivity> = context
            .load_sofa_activities()?
            .into_iter()
            .filter(|activity| window.contains(activity.date_ref))
            .collect();
        sofatutor.sort_by(|a, b| a.date_ref.cmp(&b.date_ref).then_with(|| a.title.cmp(&b.title)));

        let previous = context
            .load_weekly_summaries()?
            .into_iter()
            .filter(|summary| summary.end_date < window.start)
            .max_by_key(|summary| summary.end_date);

        let sources = Self {
            window,
            logs,
            nomy,
            sofatutor,
            previous,
        };
        if sources.is_empty() {
            return Err(AppError::ValidationError(format!(
                "No activity found for {} ({} - {})",
                window.week, window.start, window.end
            )));
        }
        Ok(sources)
    }

    pub fn is_empty(&self) -> bool {
        self.logs.is_empty() && self.nomy.is_empty() && self.sofatutor.is_empty()
    }

    pub fn counts(&self) -> WeekSourceCounts {
        WeekSourceCounts {
            logs: self.logs.len(),
            nomy_subjects: self.nomy.iter().map(|summary| summary.subjects.len()).sum(),
            sofatutor: self.sofatutor.len(),
        }
    }

    pub fn logs_text(&self) -> String {
        joined_or_placeholder(self.logs.iter().map(|log| log.str_fmt()))
    }

    pub fn nomy_text(&self) -> String {
        joined_or_placeholder(self.nomy.iter().map(|summary| summary.str_fmt()))
    }

    pub fn sofatutor_text(&self) -> String {
        joined_or_placeholder(self.sofatutor.iter().map(|activity| activity.str_fmt(false)))
    }
}

fn joined_or_placeholder(parts: impl Iterator<Item = String>) -> String {
    let text: String = parts.collect();
    if text.trim().is_empty() {
        NO_ENTRIES.to_string()
    } else {
        text.trim().to_string()
    }
}

pub struct WeekSummarizer {
    llm_client: Arc<dyn LLMClient + Send + Sync>,
    settings: ChainSettings,
    context: StudentContext,
    age: i32,
}

impl WeekSummarizer {
    pub fn new(
        llm_client: Arc<dyn LLMClient + Send + Sync>,
        settings: ChainSettings,
        context: StudentContext,
        today: NaiveDate,
    ) -> Self {
        let age = context.student_age(today);
        Self {
            llm_client,
            settings,
            context,
            age,
        }
    }

    pub async fn summarize_week(&self, start_date: NaiveDate, end_date: NaiveDate) -> Result<WeeklySummary> {
        let window = WeekWindow::new(start_date, end_date)?;
        let sources = WeekSources::collect(&self.context, window)?;
        tracing::info!(
            "Week {}: {} logs, {} Nomy weeks, {} Sofatutor activities",
            window.week,
            sources.logs.len(),
            sources.nomy.len(),
            sources.sofatutor.len()
        );

        let activities = self.list_activities(&sources).await?;
        let summary = self.write_summary(&activities, sources.previous.as_ref()).await?;

        Ok(WeeklySummary {
            week_number: window.week.week,
            year: window.week.year,
            start_date,
            end_date,
            summary,
            activities: activities.activities,
            sources: sources.counts(),
        })
    }

    async fn list_activities(&self, sources: &WeekSources) -> Result<WeekActivities> {
        let known_subjects: Vec<String> = self.context.load_curricula()?.into_keys().collect();
        let additional = self
            .context
            .load_additional_explanations()?
            .unwrap_or_else(|| "None".to_string());

        let vars = PromptVars::from([
            ("age", self.age.to_string()),
            ("logs", sources.logs_text()),
            ("nomy", sources.nomy_text()),
            ("sofatutor", sources.sofatutor_text()),
            ("known_subjects", format_known_subjects(&known_subjects)),
            ("additional_explanations", additional),
            (RESPONSE_LANGUAGE_VAR, self.settings.output_language.clone()),
        ]);
        let activities: WeekActivities = generate_structured(
            self.llm_client.as_ref(),
            &self.settings.llm,
            &LIST_WEEK_ACTIVITIES,
            &vars,
            self.settings.structured_retries,
        )
        .await?;
        Ok(activities.normalize(&known_subjects))
    }

    async fn write_summary(&self, activities: &WeekActivities, previous: Option<&WeeklySummary>) -> Result<String> {
        let previous_summary = previous
            .map(|summary| summary.summary.clone())
            .unwrap_or_else(|| "Not available.".to_string());
        let vars = PromptVars::from([
            ("age", self.age.to_string()),
            ("activities", activities.str_fmt()),
            ("previous_summary", previous_summary),
            (RESPONSE_LANGUAGE_VAR, self.settings.output_language.clone()),
        ]);
        generate_text(
            self.llm_client.as_ref(),
            &self.settings.llm,
            &SUMMARIZE_WEEK,
            &vars,
        )
        .await
    }

    /// Writes `<stem>.md` and then `<stem>.json` per week. The JSON file
    /// marks a week as done: weeks that have one are skipped unless `force`
    /// is set.
    pub async fn summarize_weeks(&self, weeks: &[IsoWeek], force: bool) -> Result<BatchReport> {
        let out_dir = self.context.layout().weekly_summaries_dir();
        let mut report = BatchReport::default();

        for &week in weeks {
            let (start, end) = match week.date_range() {
                Ok(range) => range,
                Err(e) => {
                    report.fail(format!("week {}", week), &e);
                    continue;
                }
            };
            let stem = week_file_stem(week, start, end);
            let json_path = out_dir.join(format!("{}.json", stem));
            let md_path = out_dir.join(format!("{}.md", stem));

            if json_path.exists() {
                if !force {
                    report.skip(&json_path);
                    continue;
                }
                tracing::warn!("Overwriting existing summary for week {}", week);
            }

            tracing::info!("Processing week {} ({} to {})", week, start, end);
            let written = self.summarize_week(start, end).await.and_then(|summary| {
                write_text(&md_path, &summary.to_markdown(&self.settings.output_language))?;
                write_json(&json_path, &summary)
            });
            match written {
                Ok(()) => report.wrote(&md_path),
                Err(e) => report.fail(format!("week {}", week), &e),
            }
        }
        Ok(report)
    }
}

fn format_known_subjects(subjects: &[String]) -> String {
    subjects
        .iter()
        .map(|subject| format!("  - {}", subject))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Weeks selected on the command line: the given offsets, or else the
/// current (`current`) or previous week.
pub fn target_weeks(today: NaiveDate, offsets: &[i64], current: bool) -> Result<Vec<IsoWeek>> {
    if offsets.is_empty() {
        let offset = if current { 0 } else { 1 };
        Ok(vec![IsoWeek::offset_from(today, offset)?])
    } else {
        offsets
            .iter()
            .map(|&offset| IsoWeek::offset_from(today, offset))
            .collect()
    }
}
