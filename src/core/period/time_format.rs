//! Parsing and conversion of schedule boundary strings.
//!
//! Boundaries are stored as 12-hour display strings (`"6:00 PM"`); settings
//! forms work with 24-hour strings (`"18:00"`). Both directions round-trip
//! exactly for valid input, including the `00:00` ↔ `12:00 AM` and
//! `12:00` ↔ `12:00 PM` edges.

use chrono::{NaiveTime, Timelike};
use once_cell::sync::Lazy;
use regex::Regex;

static TWELVE_HOUR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(1[0-2]|0?[1-9]):([0-5][0-9])\s*(AM|PM)\s*$")
        .expect("12-hour pattern compiles")
});

static TWENTY_FOUR_HOUR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([01]?[0-9]|2[0-3]):([0-5][0-9])\s*$").expect("24-hour pattern compiles")
});

/// Parse a `"H:MM AM/PM"` or `"HH:MM AM/PM"` string into a wall time.
///
/// Returns `None` for anything else; callers substitute the documented
/// default boundary.
pub fn parse_time_12h(input: &str) -> Option<NaiveTime> {
    let captures = TWELVE_HOUR.captures(input)?;
    let hour: u32 = captures[1].parse().ok()?;
    let minute: u32 = captures[2].parse().ok()?;
    let pm = captures[3].eq_ignore_ascii_case("PM");

    let hour = match (hour, pm) {
        (12, false) => 0,
        (12, true) => 12,
        (h, false) => h,
        (h, true) => h + 12,
    };
    NaiveTime::from_hms_opt(hour, minute, 0)
}

/// Parse a `"HH:MM"` 24-hour string into a wall time.
pub fn parse_time_24h(input: &str) -> Option<NaiveTime> {
    let captures = TWENTY_FOUR_HOUR.captures(input)?;
    let hour: u32 = captures[1].parse().ok()?;
    let minute: u32 = captures[2].parse().ok()?;
    NaiveTime::from_hms_opt(hour, minute, 0)
}

/// Canonical 12-hour display form, e.g. `"6:05 PM"`, `"12:00 AM"`.
pub fn format_time_12h(time: NaiveTime) -> String {
    let (pm, hour) = time.hour12();
    let suffix = if pm { "PM" } else { "AM" };
    format!("{}:{:02} {}", hour, time.minute(), suffix)
}

/// Canonical 24-hour form, e.g. `"18:05"`, `"00:00"`.
pub fn format_time_24h(time: NaiveTime) -> String {
    format!("{:02}:{:02}", time.hour(), time.minute())
}

/// `"6:00 PM"` → `"18:00"`.
pub fn convert_to_24_hour(twelve_hour: &str) -> Option<String> {
    parse_time_12h(twelve_hour).map(format_time_24h)
}

/// `"18:00"` → `"6:00 PM"`.
pub fn convert_from_24_hour(twenty_four_hour: &str) -> Option<String> {
    parse_time_24h(twenty_four_hour).map(format_time_12h)
}

/// Minutes since local midnight.
pub fn minutes_since_midnight(time: NaiveTime) -> u32 {
    time.hour() * 60 + time.minute()
}
