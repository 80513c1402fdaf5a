//! Date and time text handling for slot lookups.

use std::sync::OnceLock;

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;

/// Day-first date format used throughout the sheet.
pub const DATE_FORMAT: &str = "%d-%m-%Y";

/// Date plus 24-hour time.
pub const DATE_TIME_FORMAT: &str = "%d-%m-%Y %H:%M";

/// Number of leading characters of a slot string compared when booking.
pub const SLOT_PREFIX_LEN: usize = 16;

fn date_only_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{2}-\d{2}-\d{4}$").expect("date pattern compiles"))
}

/// Whether the text is exactly `DD-MM-YYYY`.
pub fn is_date_only(text: &str) -> bool {
    date_only_re().is_match(text)
}

/// Canonicalize a day-first date; fall back to the input unchanged.
pub fn normalize_date(raw: &str) -> String {
    match NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT) {
        Ok(date) => date.format(DATE_FORMAT).to_string(),
        Err(_) => raw.to_string(),
    }
}

/// Strictly parse `DD-MM-YYYY HH:MM`.
pub fn parse_date_time(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, DATE_TIME_FORMAT).ok()
}

/// Render as `DD-MM-YYYY H.MM`.
pub fn slot_label(at: &NaiveDateTime) -> String {
    at.format("%d-%m-%Y %-H.%M").to_string()
}

/// `HH:MM` to `H:MM AM|PM`; `None` when the text is not a clock time.
pub fn to_am_pm(time: &str) -> Option<String> {
    let (hours, minutes) = time.split_once(':')?;
    let hours: u32 = hours.trim().parse().ok()?;
    let minutes: u32 = minutes.trim().parse().ok()?;

    let period = if hours < 12 { "AM" } else { "PM" };
    let display = match hours % 12 {
        0 => 12,
        h => h,
    };
    Some(format!("{}:{:02} {}", display, minutes, period))
}

/// First `SLOT_PREFIX_LEN` characters.
pub fn slot_prefix(text: &str) -> &str {
    match text.char_indices().nth(SLOT_PREFIX_LEN) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
