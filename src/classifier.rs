use std::sync::OnceLock;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;

use crate::error::ValidationError;

/// Folder names produced by `bucket_name`.
const BUCKET_FORMAT: &str = "%Y-%m-%d";

fn date_line_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^([01]\d|2[0-3]):([0-5]\d)$").expect("valid regex"))
}

fn bucket_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid regex"))
}

/// Parse a strict `HH:MM` date line.
pub fn parse_date_line(text: &str) -> Result<NaiveTime, ValidationError> {
    let caps = date_line_pattern()
        .captures(text.trim())
        .ok_or_else(|| ValidationError::MalformedDateLine(text.to_string()))?;
    let hour: u32 = caps[1].parse().map_err(|_| ValidationError::MalformedDateLine(text.to_string()))?;
    let minute: u32 = caps[2].parse().map_err(|_| ValidationError::MalformedDateLine(text.to_string()))?;
    NaiveTime::from_hms_opt(hour, minute, 0)
        .ok_or_else(|| ValidationError::MalformedDateLine(text.to_string()))
}

/// The logical day a file belongs to.
///
/// Anything captured strictly before `date_line` counts as the previous day,
/// so a late-night session that runs past midnight stays in one folder.
pub fn organizing_date(captured_at: NaiveDateTime, date_line: NaiveTime) -> NaiveDate {
    let date = captured_at.date();
    if captured_at.time() < date_line {
        date.pred_opt().unwrap_or(date)
    } else {
        date
    }
}

pub fn bucket_name(date: NaiveDate) -> String {
    date.format(BUCKET_FORMAT).to_string()
}

/// True for folder names that look like a date bucket (`YYYY-MM-DD`).
pub fn is_bucket_name(name: &str) -> bool {
    bucket_pattern().is_match(name) && NaiveDate::parse_from_str(name, BUCKET_FORMAT).is_ok()
}
