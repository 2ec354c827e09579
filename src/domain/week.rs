use chrono::{Datelike, Duration, NaiveDate, Weekday};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::domain::error::{AppError, Result};

pub const OTHER_SUBJECT: &str = "Other";
pub const MAX_ISO_WEEK: u32 = 53;

/// An ISO 8601 calendar week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IsoWeek {
    pub year: i32,
    pub week: u32,
}

impl IsoWeek {
    pub fn new(year: i32, week: u32) -> Self {
        Self { year, week }
    }

    pub fn from_date(date: NaiveDate) -> Self {
        let iso = date.iso_week();
        Self {
            year: iso.year(),
            week: iso.week(),
        }
    }

    /// The week `offset` weeks before the one containing `today`.
    pub fn offset_from(today: NaiveDate, offset: i64) -> Result<Self> {
        Duration::try_weeks(offset)
            .and_then(|delta| today.checked_sub_signed(delta))
            .map(Self::from_date)
            .ok_or_else(|| AppError::ValidationError(format!("Week offset out of range: {}", offset)))
    }

    pub fn date_range(&self) -> Result<(NaiveDate, NaiveDate)> {
        Ok((self.monday()?, self.sunday()?))
    }

    pub fn monday(&self) -> Result<NaiveDate> {
        Ok(get_date_range_for_week(self.year, self.week)?.0)
    }

    pub fn sunday(&self) -> Result<NaiveDate> {
        Ok(get_date_range_for_week(self.year, self.week)?.1)
    }
}

impl std::fmt::Display for IsoWeek {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.year, self.week)
    }
}

/// Monday and Sunday of `week` in `year`, extrapolated from the Monday of
/// week 1. Dates chrono cannot represent are a `ValidationError`.
pub fn get_date_range_for_week(year: i32, week: u32) -> Result<(NaiveDate, NaiveDate)> {
    let out_of_range = || AppError::ValidationError(format!("Week {} of {} is out of range", week, year));
    let first_day = NaiveDate::from_ymd_opt(year, 1, 1).ok_or_else(out_of_range)?;

    let weekday = first_day.weekday().num_days_from_monday() as i64;
    // Jan 1 on Fri/Sat/Sun belongs to the last week of the previous year.
    let days_to_week_1 = if weekday > 3 { 7 - weekday } else { -weekday };
    let weeks_after_1 = Duration::try_weeks(week as i64 - 1).ok_or_else(out_of_range)?;

    let target_monday = first_day
        .checked_add_signed(Duration::days(days_to_week_1))
        .and_then(|monday_week_1| monday_week_1.checked_add_signed(weeks_after_1))
        .ok_or_else(out_of_range)?;
    let target_sunday = target_monday
        .checked_add_signed(Duration::days(6))
        .ok_or_else(out_of_range)?;
    Ok((target_monday, target_sunday))
}

/// Whether `week` can be an ISO week number at all.
pub fn is_valid_week_number(week: u32) -> bool {
    (1..=MAX_ISO_WEEK).contains(&week)
}

/// A Monday-to-Sunday date window covering exactly one ISO week.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub week: IsoWeek,
}

impl WeekWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start.weekday() != Weekday::Mon {
            return Err(AppError::ValidationError(format!(
                "Start date must be a Monday: {}",
                start
            )));
        }
        if end.weekday() != Weekday::Sun {
            return Err(AppError::ValidationError(format!(
                "End date must be a Sunday: {}",
                end
            )));
        }
        let week = IsoWeek::from_date(start);
        if week != IsoWeek::from_date(end) {
            return Err(AppError::ValidationError(format!(
                "Start and end date must be in the same week: {} - {}",
                start, end
            )));
        }
        Ok(Self { start, end, week })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn overlaps(&self, start: NaiveDate, end: NaiveDate) -> bool {
        start <= self.end && self.start <= end
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct WeekSubjectActivities {
    /// The school subject
    pub subject: String,
    /// The activities of the week for this subject
    pub activities: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct WeekActivities {
    /// The learning activities of the week per subject
    pub activities: Vec<WeekSubjectActivities>,
}

impl WeekActivities {
    pub fn str_fmt(&self) -> String {
        format_subject_activities(&self.activities)
    }

    /// Maps subjects onto `known` (case-insensitively), folds everything else
    /// into [`OTHER_SUBJECT`], merges duplicates and orders the result like
    /// `known` with `Other` last.
    pub fn normalize(self, known: &[String]) -> WeekActivities {
        let mut merged: Vec<WeekSubjectActivities> = Vec::new();

        for entry in self.activities {
            let wanted = entry.subject.trim().to_lowercase();
            let subject = known
                .iter()
                .find(|k| k.to_lowercase() == wanted)
                .cloned()
                .unwrap_or_else(|| OTHER_SUBJECT.to_string());

            let index = match merged.iter().position(|m| m.subject == subject) {
                Some(index) => index,
                None => {
                    merged.push(WeekSubjectActivities {
                        subject,
                        activities: Vec::new(),
                    });
                    merged.len() - 1
                }
            };

            for activity in entry.activities {
                let activity = activity.trim();
                if activity.is_empty() {
                    continue;
                }
                let target = &mut merged[index].activities;
                if !target.iter().any(|a| a == activity) {
                    target.push(activity.to_string());
                }
            }
        }

        merged.retain(|m| !m.activities.is_empty());
        merged.sort_by_key(|m| {
            known
                .iter()
                .position(|k| *k == m.subject)
                .unwrap_or(known.len())
        });

        WeekActivities { activities: merged }
    }
}

fn format_subject_activities(activities: &[WeekSubjectActivities]) -> String {
    let mut formatted = String::new();
    for subject_activity in activities {
        formatted.push_str(&format!("## {}\n", subject_activity.subject));
        for activity in &subject_activity.activities {
            formatted.push_str(&format!("  - {}\n", activity));
        }
        formatted.push('\n');
    }
    formatted
}

/// How many records of each source went into a weekly summary.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct WeekSourceCounts {
    pub logs: usize,
    pub nomy_subjects: usize,
    pub sofatutor: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeeklySummary {
    pub week_number: u32,
    pub year: i32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub summary: String,
    pub activities: Vec<WeekSubjectActivities>,
    #[serde(default)]
    pub sources: WeekSourceCounts,
}

impl WeeklySummary {
    pub fn file_stem(&self) -> String {
        week_file_stem(
            IsoWeek::new(self.year, self.week_number),
            self.start_date,
            self.end_date,
        )
    }

    pub fn str_fmt(&self) -> String {
        format!(
            "\n# {}/{} ({} - {})\n\n{}\n\n{}\n",
            self.year,
            self.week_number,
            self.start_date,
            self.end_date,
            self.summary,
            format_subject_activities(&self.activities)
        )
    }

    /// Markdown for the summary file with the catch-all heading localized.
    pub fn to_markdown(&self, output_language: &str) -> String {
        let md = self.str_fmt();
        let other = other_heading(output_language);
        if other == OTHER_SUBJECT {
            return md;
        }
        md.replace(
            &format!("## {}\n", OTHER_SUBJECT),
            &format!("## {}\n", other),
        )
    }
}

pub fn week_file_stem(week: IsoWeek, start: NaiveDate, end: NaiveDate) -> String {
    format!("{}_week_{}_{}-{}", week.year, week.week, start, end)
}

fn other_heading(output_language: &str) -> &'static str {
    match output_language.trim().to_lowercase().as_str() {
        "de" | "deutsch" | "german" => "Weiteres",
        _ => OTHER_SUBJECT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_date_range_matches_iso_calendar() {
        for (year, expected) in [
            (2020, date(2019, 12, 30)),
            (2021, date(2021, 1, 4)),
            (2024, date(2024, 1, 1)),
            (2026, date(2025, 12, 29)),
            (2027, date(2027, 1, 4)),
        ] {
            let (monday, sunday) = get_date_range_for_week(year, 1).unwrap();
            assert_eq!(monday, expected, "year {}", year);
            assert_eq!(sunday, expected + Duration::days(6));
        }
        let (monday, _) = get_date_range_for_week(2024, 36).unwrap();
        assert_eq!(monday, date(2024, 9, 2));
    }

    #[test]
    fn test_date_range_out_of_range_is_error() {
        assert!(matches!(
            get_date_range_for_week(2025, 4_000_000_000),
            Err(AppError::ValidationError(_))
        ));
        assert!(get_date_range_for_week(i32::MAX, 1).is_err());
        assert!(is_valid_week_number(53));
        assert!(!is_valid_week_number(0));
        assert!(!is_valid_week_number(54));
    }

    #[test]
    fn test_offset_crosses_year_boundary() {
        let week = IsoWeek::offset_from(date(2025, 1, 8), 2).unwrap();
        assert_eq!(week, IsoWeek::new(2024, 52));
        // Dec 30 2024 is already in ISO week 1 of 2025.
        assert_eq!(IsoWeek::offset_from(date(2025, 1, 8), 1).unwrap(), IsoWeek::new(2025, 1));
    }

    #[test]
    fn test_huge_offset_is_error() {
        assert!(IsoWeek::offset_from(date(2025, 1, 8), i64::MAX).is_err());
        assert!(IsoWeek::offset_from(date(2025, 1, 8), -100_000_000).is_err());
    }

    #[test]
    fn test_window_validation() {
        assert!(WeekWindow::new(date(2024, 9, 2), date(2024, 9, 8)).is_ok());
        assert!(WeekWindow::new(date(2024, 9, 3), date(2024, 9, 8)).is_err());
        assert!(WeekWindow::new(date(2024, 9, 2), date(2024, 9, 7)).is_err());
        assert!(WeekWindow::new(date(2024, 9, 2), date(2024, 9, 15)).is_err());
    }

    #[test]
    fn test_window_contains_and_overlaps() {
        let window = WeekWindow::new(date(2024, 9, 2), date(2024, 9, 8)).unwrap();
        assert_eq!(window.week, IsoWeek::new(2024, 36));
        assert!(window.contains(date(2024, 9, 2)));
        assert!(window.contains(date(2024, 9, 8)));
        assert!(!window.contains(date(2024, 9, 9)));
        assert!(window.overlaps(date(2024, 8, 30), date(2024, 9, 2)));
        assert!(!window.overlaps(date(2024, 8, 26), date(2024, 9, 1)));
    }

    #[test]
    fn test_normalize_merges_and_orders() {
        let known = vec!["Deutsch".to_string(), "Mathematik".to_string()];
        let raw = WeekActivities {
            activities: vec![
                WeekSubjectActivities {
                    subject: "Kunst".to_string(),
                    activities: vec!["Gemalt".to_string()],
                },
                WeekSubjectActivities {
                    subject: "mathematik".to_string(),
                    activities: vec!["Plus bis 20".to_string()],
                },
                WeekSubjectActivities {
                    subject: "Deutsch".to_string(),
                    activities: vec!["Diktat".to_string(), " ".to_string()],
                },
                WeekSubjectActivities {
                    subject: "Mathematik".to_string(),
                    activities: vec!["Plus bis 20".to_string(), "Uhr lesen".to_string()],
                },
            ],
        };

        let normalized = raw.normalize(&known);
        let subjects: Vec<_> = normalized.activities.iter().map(|a| a.subject.as_str()).collect();
        assert_eq!(subjects, vec!["Deutsch", "Mathematik", OTHER_SUBJECT]);
        assert_eq!(normalized.activities[0].activities, vec!["Diktat"]);
        assert_eq!(normalized.activities[1].activities, vec!["Plus bis 20", "Uhr lesen"]);
    }

    #[test]
    fn test_markdown_localizes_other_heading() {
        let summary = WeeklySummary {
            week_number: 36,
            year: 2024,
            start_date: date(2024, 9, 2),
            end_date: date(2024, 9, 8),
            summary: "Eine ruhige Woche.".to_string(),
            activities: vec![WeekSubjectActivities {
                subject: OTHER_SUBJECT.to_string(),
                activities: vec!["Schwimmen".to_string()],
            }],
            sources: WeekSourceCounts::default(),
        };
        assert_eq!(summary.file_stem(), "2024_week_36_2024-09-02-2024-09-08");
        let md = summary.to_markdown("de");
        assert!(md.contains("## Weiteres\n  - Schwimmen"));
        assert!(summary.to_markdown("en").contains("## Other\n"));
    }

    #[test]
    fn test_summary_without_sources_deserializes() {
        let raw = r#"{"week_number": 1, "year": 2025, "start_date": "2024-12-30",
            "end_date": "2025-01-05", "summary": "s", "activities": []}"#;
        let summary: WeeklySummary = serde_json::from_str(raw).unwrap();
        assert_eq!(summary.sources, WeekSourceCounts::default());
    }
}
