use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone};
use log::trace;

use crate::{DeskError, Result};

// Helper method for parsing tags
pub fn parse_tags(tags: Option<String>) -> Vec<String> {
    tags.map(|t| {
        t.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
    .unwrap_or_default()
}

/// Parses an "HH:MM" clock string into a time of day.
///
/// Single-digit fields ("9:05") are accepted and anything after the minute
/// field ("09:05:30") is ignored.
pub fn parse_clock(value: &str) -> Result<NaiveTime> {
    let invalid = || DeskError::InvalidTime {
        value: value.to_string(),
    };

    let mut fields = value.trim().split(':');
    let hours = fields
        .next()
        .and_then(|h| h.trim().parse::<u32>().ok())
        .ok_or_else(invalid)?;
    let minutes = fields
        .next()
        .and_then(|m| m.trim().parse::<u32>().ok())
        .ok_or_else(invalid)?;

    NaiveTime::from_hms_opt(hours, minutes, 0).ok_or_else(invalid)
}

/// Validates a clock string and rewrites it as zero-padded "HH:MM".
pub fn normalize_clock(value: &str) -> Result<String> {
    Ok(parse_clock(value)?.format("%H:%M").to_string())
}

/// Parses a "YYYY-MM-DD" calendar date.
pub fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| DeskError::InvalidDate {
        value: value.to_string(),
    })
}

/// Combines a calendar date with an "HH:MM" clock in the given time zone.
///
/// Local times that fall into a DST gap are rejected; ambiguous ones resolve
/// to the earlier instant.
pub fn at_clock<Tz: TimeZone>(tz: &Tz, date: NaiveDate, clock: &str) -> Result<DateTime<Tz>> {
    let time = parse_clock(clock)?;
    let instant = tz
        .from_local_datetime(&date.and_time(time))
        .earliest()
        .ok_or_else(|| DeskError::InvalidTime {
            value: clock.to_string(),
        })?;
    trace!("Resolved {} {} to a local instant", date, clock);
    Ok(instant)
}

/// Start of the given calendar day in the time zone.
pub fn start_of_day<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> Option<DateTime<Tz>> {
    tz.from_local_datetime(&date.and_time(NaiveTime::MIN)).earliest()
}

/// First `max_chars` characters of `text`, with "..." appended when cut.
pub fn preview(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}
