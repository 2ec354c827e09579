use chrono::{DateTime, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::error::{AppError, Result};

static TEXT_FIELD_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?s)"text"\s*:\s*"(.*)"\s*\}"#).unwrap());

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

const OFFSET_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%z"];

/// A free-text log entry, exported one message per JSON file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LearnLogMessage {
    #[serde(alias = "User")]
    pub user: String,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: NaiveDateTime,
    pub text: String,
}

impl LearnLogMessage {
    /// Parses an exported message. Exports sometimes carry raw quotes and
    /// newlines inside `text`; those are escaped before a second attempt.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        match serde_json::from_str::<Self>(raw) {
            Ok(message) => Ok(message),
            Err(strict_err) => {
                let repaired = repair_text_field(raw).ok_or_else(|| {
                    AppError::ParseError(format!("Invalid log message: {}", strict_err))
                })?;
                serde_json::from_str::<Self>(&repaired).map_err(|e| {
                    AppError::ParseError(format!(
                        "Invalid log message after repair: {} (strict parse: {})",
                        e, strict_err
                    ))
                })
            }
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    pub fn str_fmt(&self) -> String {
        format!(
            "\n### Log Message\n\n#### Time when log was created:\n{}\n\n#### Message text:\n{}\n",
            self.timestamp.format("%Y-%m-%dT%H:%M:%S"),
            self.text
        )
    }
}

fn repair_text_field(raw: &str) -> Option<String> {
    let captures = TEXT_FIELD_PATTERN.captures(raw)?;
    let text = captures.get(1)?;

    let mut repaired = String::with_capacity(raw.len() + 16);
    repaired.push_str(&raw[..text.start()]);
    repaired.push_str(&escape_text_value(text.as_str()));
    repaired.push_str(&raw[text.end()..]);
    Some(repaired)
}

fn escape_text_value(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    let mut previous = None;
    for ch in text.chars() {
        match ch {
            '"' if previous != Some('\\') => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            '\t' => escaped.push_str("\\t"),
            '\r' => escaped.push_str("\\r"),
            other => escaped.push(other),
        }
        previous = Some(ch);
    }
    escaped
}

/// Accepts RFC 3339, naive ISO date-times, plain dates and Unix seconds.
/// Offsets are dropped after converting to the wall-clock time they describe.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_local());
    }
    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(value, format) {
            return Some(dt.naive_local());
        }
    }
    for format in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }
    value.parse::<f64>().ok().and_then(from_unix_seconds)
}

fn from_unix_seconds(seconds: f64) -> Option<NaiveDateTime> {
    let secs = seconds.trunc() as i64;
    let nanos = ((seconds.fract()) * 1_000_000_000.0).round() as u32;
    DateTime::from_timestamp(secs, nanos.min(999_999_999)).map(|dt| dt.naive_utc())
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> std::result::Result<NaiveDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let value = serde_json::Value::deserialize(deserializer)?;
    match &value {
        serde_json::Value::String(s) => parse_timestamp(s)
            .ok_or_else(|| D::Error::custom(format!("unrecognised timestamp: {}", s))),
        serde_json::Value::Number(n) => n
            .as_f64()
            .and_then(from_unix_seconds)
            .ok_or_else(|| D::Error::custom(format!("timestamp out of range: {}", n))),
        other => Err(D::Error::custom(format!("unexpected timestamp: {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_capitalised_user_key() {
        let raw = r#"{"User": "anna", "timestamp": "2024-09-02T08:15:00", "text": "Lesen geübt"}"#;
        let message = LearnLogMessage::from_json_str(raw).unwrap();
        assert_eq!(message.user, "anna");
        assert_eq!(message.date(), NaiveDate::from_ymd_opt(2024, 9, 2).unwrap());
    }

    #[test]
    fn test_repairs_raw_quotes_and_newlines() {
        let raw = "{\"user\": \"anna\", \"timestamp\": \"2024-09-02 08:15:00\", \"text\": \"Buch \"Die kleine Hexe\" gelesen\nDanach gemalt\"}";
        let message = LearnLogMessage::from_json_str(raw).unwrap();
        assert_eq!(message.text, "Buch \"Die kleine Hexe\" gelesen\nDanach gemalt");
    }

    #[test]
    fn test_keeps_already_escaped_quotes() {
        let raw = "{\"user\": \"anna\", \"timestamp\": \"2024-09-02\", \"text\": \"Sagte \\\"hallo\\\"\nund ging\"}";
        let message = LearnLogMessage::from_json_str(raw).unwrap();
        assert_eq!(message.text, "Sagte \"hallo\"\nund ging");
    }

    #[test]
    fn test_offset_timestamp_keeps_local_wall_clock() {
        let ts = parse_timestamp("2024-09-01T23:30:00+02:00").unwrap();
        assert_eq!(ts.date(), NaiveDate::from_ymd_opt(2024, 9, 1).unwrap());
    }

    #[test]
    fn test_unix_seconds_timestamp() {
        let raw = r#"{"user": "anna", "timestamp": 1725264000.5, "text": "x"}"#;
        let message = LearnLogMessage::from_json_str(raw).unwrap();
        assert_eq!(message.date(), NaiveDate::from_ymd_opt(2024, 9, 2).unwrap());
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(LearnLogMessage::from_json_str("not json").is_err());
    }

    #[test]
    fn test_str_fmt_contains_iso_time() {
        let message = LearnLogMessage {
            user: "anna".to_string(),
            timestamp: parse_timestamp("2024-09-02T08:15:00").unwrap(),
            text: "Rechnen".to_string(),
        };
        let formatted = message.str_fmt();
        assert!(formatted.contains("2024-09-02T08:15:00"));
        assert!(formatted.contains("#### Message text:\nRechnen"));
    }
}
