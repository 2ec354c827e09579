use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::domain::week::{is_valid_week_number, IsoWeek};

// Matches "Wochenberichte_2025_KW_1_2_Stufe_2.pdf",
// "Wochenberichte_Stufe_2A_KW_5_6.pdf" and "Wochenberichte_Stufe_2_A_KW_7_9.pdf".
static REPORT_FILENAME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"Wochenberichte_(\d{4})(?:_Stufe_\w+)?_KW_(\d+)(?:_(\d+))?|Wochenberichte_Stufe_\w+(?:_\w+)?_KW_(\d+)(?:_(\d+))?",
    )
    .unwrap()
});

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct NomySubjectActivity {
    /// The school subject
    pub subject: String,
    /// The teacher's name in parentheses
    pub teacher: String,
    /// List of activities done in this subject
    pub activities: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct NomyWeekSummary {
    /// The calendar week number
    pub week_number: u32,
    /// The year
    pub year: i32,
    /// Start date of the week
    pub start_date: NaiveDate,
    /// End date of the week
    pub end_date: NaiveDate,
    /// List of subject activities
    pub subjects: Vec<NomySubjectActivity>,
}

impl NomyWeekSummary {
    pub fn iso_week(&self) -> IsoWeek {
        IsoWeek::new(self.year, self.week_number)
    }

    pub fn file_name(&self) -> String {
        format!("nomy_week_{}_{:02}.json", self.year, self.week_number)
    }

    pub fn str_fmt(&self) -> String {
        let mut result = format!(
            "# Week {}/{} ({} - {})\n\n",
            self.week_number, self.year, self.start_date, self.end_date
        );
        for subject in &self.subjects {
            result.push_str(&format!("## {} ({})\n", subject.subject, subject.teacher));
            for activity in &subject.activities {
                result.push_str(&format!("- {}\n", activity));
            }
            result.push('\n');
        }
        result
    }
}

/// Wrapper model for list of week summaries
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct NomyWeekSummaries {
    /// List of weekly summaries
    pub summaries: Vec<NomyWeekSummary>,
}

/// Year and week numbers encoded in a report file name. Names without an
/// explicit year use `current_year`.
pub fn parse_filename_info(filename: &str, current_year: i32) -> Option<(i32, Vec<u32>)> {
    let captures = REPORT_FILENAME_PATTERN.captures(filename)?;

    let (year, first, second) = match captures.get(1) {
        Some(year) => (
            year.as_str().parse::<i32>().ok()?,
            captures.get(2)?.as_str().parse::<u32>().ok()?,
            captures.get(3),
        ),
        None => (
            current_year,
            captures.get(4)?.as_str().parse::<u32>().ok()?,
            captures.get(5),
        ),
    };

    if !is_valid_week_number(first) {
        return None;
    }
    let mut weeks = vec![first];
    if let Some(second) = second {
        let second = second.as_str().parse::<u32>().ok()?;
        if !is_valid_week_number(second) {
            return None;
        }
        // "KW_1_2" lists two weeks, "KW_7_9" is a range.
        let next = first.checked_add(1)?;
        if second <= next {
            weeks.push(second);
        } else {
            weeks.extend(next..=second);
        }
    }

    Some((year, weeks))
}

/// Inverse of [`NomyWeekSummary::file_name`].
pub fn parse_data_file_name(file_name: &str) -> Option<IsoWeek> {
    let stem = file_name.strip_suffix(".json").unwrap_or(file_name);
    let parts: Vec<&str> = stem.split('_').collect();
    match parts.as_slice() {
        ["nomy", "week", year, week] => Some(IsoWeek::new(year.parse().ok()?, week.parse().ok()?)),
        _ => None,
    }
}
