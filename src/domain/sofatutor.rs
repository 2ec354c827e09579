use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const TEST_MARKER: &str = "?launchpad=test";
pub const PRACTICE_MARKER: &str = "practice_app";
pub const JOBS_PAGE_URL: &str = "https://jobs.sofatutor.com/ueber-uns";

static WHITESPACE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static TEST_YOUR_KNOWLEDGE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\|*\s*Teste dein Wissen.*?(\.|!|\?)").unwrap());
static NON_SLUG_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

// "MÃ¤rz" is how "März" reads when an export was decoded with the wrong charset.
const GERMAN_MONTHS: &[(&str, &str)] = &[
    ("Januar", "January"),
    ("Februar", "February"),
    ("MÃ¤rz", "March"),
    ("März", "March"),
    ("April", "April"),
    ("Mai", "May"),
    ("Juni", "June"),
    ("Juli", "July"),
    ("August", "August"),
    ("September", "September"),
    ("Oktober", "October"),
    ("November", "November"),
    ("Dezember", "December"),
];

const DATE_FORMATS: &[&str] = &["%d. %B %Y", "%d %B %Y", "%d.%m.%Y", "%d. %m. %Y", "%Y-%m-%d"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityType {
    Video,
    Test,
    Practice,
}

impl ActivityType {
    pub fn from_url(url: &str) -> Self {
        if url.contains(PRACTICE_MARKER) {
            ActivityType::Practice
        } else if url.contains(TEST_MARKER) {
            ActivityType::Test
        } else {
            ActivityType::Video
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::Video => "video",
            ActivityType::Test => "test",
            ActivityType::Practice => "practice",
        }
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum YearType {
    Grade,
    LearnYear,
}

impl YearType {
    pub fn as_str(&self) -> &'static str {
        match self {
            YearType::Grade => "grade",
            YearType::LearnYear => "learn_year",
        }
    }

    /// Path segment and cookie prefix used by the site.
    pub fn url_segment(&self) -> &'static str {
        match self {
            YearType::Grade => "klasse",
            YearType::LearnYear => "lernjahr",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "grade" => Some(YearType::Grade),
            "learn_year" => Some(YearType::LearnYear),
            _ => None,
        }
    }
}

/// A completed video, test or practice session scraped from an account export.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SofatutorLearningActivity {
    pub date_ref: NaiveDate,
    pub subject_label: String,
    pub title: String,
    pub activity_type: ActivityType,
    pub total_tasks: u32,
    pub tasks_completed: u32,
    pub url: String,
    pub related_years: Option<Vec<i32>>,
    pub year_type: Option<YearType>,
    pub topic_chain: Option<String>,
    pub description: Option<String>,
}

impl SofatutorLearningActivity {
    pub fn default_file_name(&self) -> String {
        format!(
            "{}_{}_{}_{}.json",
            self.date_ref,
            self.subject_label,
            slugify(&self.title),
            self.activity_type
        )
    }

    pub fn str_fmt(&self, with_url: bool) -> String {
        let url = if with_url {
            format!("\n  - URL: {}\n", self.url)
        } else {
            String::new()
        };
        let years = self
            .related_years
            .as_ref()
            .map(|years| {
                years
                    .iter()
                    .map(|y| y.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .unwrap_or_else(|| "n/a".to_string());

        format!(
            "\n### Sofatutor Learning Activity\n\n#### General Properties\n  - Date: {}\n  - Subject: {}\n  - Title: {}\n  - Activity type: {}\n  - Score: {}/{}\n  - Categorization: {} {} - {}{}\n\n#### Description\n{}\n\n",
            self.date_ref,
            self.subject_label,
            self.title,
            self.activity_type,
            self.tasks_completed,
            self.total_tasks,
            self.year_type.map(|y| y.as_str()).unwrap_or("n/a"),
            years,
            self.topic_chain.as_deref().unwrap_or("n/a"),
            url,
            self.description.as_deref().unwrap_or("n/a"),
        )
    }
}

/// Parses dates like "Montag, 29. Juli 2024" from the activity list.
pub fn parse_date_string(value: &str) -> Option<NaiveDate> {
    let mut normalized = value.split_whitespace().collect::<Vec<_>>().join(" ");
    for (de, en) in GERMAN_MONTHS {
        normalized = normalized.replace(de, en);
    }

    let without_weekday = match normalized.split_once(", ") {
        Some((_, rest)) => rest.trim().to_string(),
        None => normalized.trim().to_string(),
    };

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(&without_weekday, format).ok())
}

/// Flattens a catalogue description into a single line and drops the
/// "Teste dein Wissen…" call to action.
pub fn clean_description(input: &str) -> String {
    let collapsed = WHITESPACE_PATTERN.replace_all(input, " ");
    let quoted = collapsed.replace('"', "“");
    let stripped = TEST_YOUR_KNOWLEDGE_PATTERN.replace_all(&quoted, "");
    stripped.trim().trim_matches('|').trim().to_string()
}

pub fn slugify(value: &str) -> String {
    let mut ascii = String::with_capacity(value.len());
    for ch in value.to_lowercase().chars() {
        match ch {
            'ä' | 'à' | 'á' | 'â' | 'å' => ascii.push('a'),
            'ö' | 'ò' | 'ó' | 'ô' => ascii.push('o'),
            'ü' | 'ù' | 'ú' | 'û' => ascii.push('u'),
            'é' | 'è' | 'ê' | 'ë' => ascii.push('e'),
            'í' | 'ì' | 'î' | 'ï' => ascii.push('i'),
            'ç' => ascii.push('c'),
            'ñ' => ascii.push('n'),
            'ß' => ascii.push_str("ss"),
            other => ascii.push(other),
        }
    }
    NON_SLUG_PATTERN
        .replace_all(&ascii, "-")
        .trim_matches('-')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_german_date_with_weekday() {
        assert_eq!(parse_date_string("Montag, 29. Juli 2024"), Some(date(2024, 7, 29)));
        assert_eq!(parse_date_string("  Freitag,\n 1. März 2024 "), Some(date(2024, 3, 1)));
        assert_eq!(parse_date_string("Freitag, 1. MÃ¤rz 2024"), Some(date(2024, 3, 1)));
    }

    #[test]
    fn test_parse_numeric_date() {
        assert_eq!(parse_date_string("Dienstag, 03.09.2024"), Some(date(2024, 9, 3)));
        assert_eq!(parse_date_string("kein Datum"), None);
    }

    #[test]
    fn test_activity_type_from_url() {
        assert_eq!(
            ActivityType::from_url("https://www.sofatutor.com/mathematik/videos/x?launchpad=test"),
            ActivityType::Test
        );
        assert_eq!(
            ActivityType::from_url("https://www.sofatutor.com/practice_app/123"),
            ActivityType::Practice
        );
        assert_eq!(
            ActivityType::from_url("https://www.sofatutor.com/mathematik/videos/x"),
            ActivityType::Video
        );
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Präpositionen – Die Übersicht!"), "prapositionen-die-ubersicht");
        assert_eq!(slugify("Straße   bauen"), "strasse-bauen");
    }

    #[test]
    fn test_default_file_name() {
        let activity = SofatutorLearningActivity {
            date_ref: date(2024, 7, 29),
            subject_label: "Englisch".to_string(),
            title: "Prepositions – die Präpositionen".to_string(),
            activity_type: ActivityType::Test,
            total_tasks: 5,
            tasks_completed: 4,
            url: "https://www.sofatutor.com/englisch/videos/prepositions?launchpad=test".to_string(),
            related_years: Some(vec![3, 4]),
            year_type: Some(YearType::LearnYear),
            topic_chain: None,
            description: None,
        };
        assert_eq!(
            activity.default_file_name(),
            "2024-07-29_Englisch_prepositions-die-prapositionen_test.json"
        );
        let formatted = activity.str_fmt(true);
        assert!(formatted.contains("  - Score: 4/5"));
        assert!(formatted.contains("  - Categorization: learn_year 3, 4 - n/a"));
        assert!(formatted.contains("URL: https://www.sofatutor.com/englisch"));
    }

    #[test]
    fn test_clean_description() {
        let raw = "Lerne \"Plus\" rechnen.\n\nEinfach erklärt. Teste dein Wissen in den Übungen! Viel Spaß";
        assert_eq!(
            clean_description(raw),
            "Lerne “Plus“ rechnen. Einfach erklärt. Viel Spaß"
        );
    }

    #[test]
    fn test_serialized_enums_are_lowercase() {
        assert_eq!(serde_json::to_string(&ActivityType::Practice).unwrap(), "\"practice\"");
        assert_eq!(serde_json::to_string(&YearType::LearnYear).unwrap(), "\"learn_year\"");
    }
}
