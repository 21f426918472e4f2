//! Derived instants and durations for the schedule.
//!
//! Pure functions over a `now` timestamp: when the current period began,
//! when the next period or the next daytime begins, and a short human
//! rendering of the distance between two instants.

use chrono::{DateTime, Duration as ChronoDuration, Local, NaiveTime};

use super::{Period, Schedule, classify_period};
use crate::time::local_instant;

/// Instant at which `period` most recently began.
///
/// Today's occurrence of the period's boundary, or yesterday's when today's
/// is still ahead of `now`. The second case covers the Bedtime arc after
/// midnight: at 2:00 AM with a 10:00 PM bedtime the period began yesterday.
pub fn period_start_timestamp(
    now: DateTime<Local>,
    period: Period,
    schedule: &Schedule,
) -> DateTime<Local> {
    let boundary = schedule.boundary(period);
    let today = local_instant(now.date_naive(), boundary);
    if today > now {
        local_instant(now.date_naive() - ChronoDuration::days(1), boundary)
    } else {
        today
    }
}

/// Next future instant of the daytime boundary: today if it has not passed
/// yet, tomorrow otherwise.
pub fn next_daytime_start(now: DateTime<Local>, daytime_start: NaiveTime) -> DateTime<Local> {
    next_occurrence(now, daytime_start)
}

/// The next instant at which the classification changes, with the period
/// entered at that instant.
///
/// Returns `None` when the boundary order leaves only one reachable period.
pub fn next_period_start(
    now: DateTime<Local>,
    schedule: &Schedule,
) -> Option<(Period, DateTime<Local>)> {
    let current = classify_period(now, schedule);

    let mut upcoming: Vec<DateTime<Local>> = Period::ALL
        .iter()
        .map(|period| next_occurrence(now, schedule.boundary(*period)))
        .collect();
    upcoming.sort();

    // Two passes over the day cover boundaries that only change the
    // classification on their second occurrence
    let later: Vec<DateTime<Local>> = upcoming
        .iter()
        .map(|instant| *instant + ChronoDuration::days(1))
        .collect();

    upcoming.into_iter().chain(later).find_map(|instant| {
        let period = classify_period(instant, schedule);
        (period != current).then_some((period, instant))
    })
}

/// Short relative description: `"in 2h 5m"`, `"45m ago"`, `"now"`.
///
/// Rounded to the nearest minute.
pub fn human_delta(from: DateTime<Local>, to: DateTime<Local>) -> String {
    let seconds = (to - from).num_seconds();
    let minutes = (seconds.abs() + 30) / 60;
    if minutes == 0 {
        return "now".to_string();
    }

    let hours = minutes / 60;
    let rest = minutes % 60;
    let amount = match (hours, rest) {
        (0, m) => format!("{m}m"),
        (h, 0) => format!("{h}h"),
        (h, m) => format!("{h}h {m}m"),
    };

    if seconds > 0 {
        format!("in {amount}")
    } else {
        format!("{amount} ago")
    }
}

fn next_occurrence(now: DateTime<Local>, time: NaiveTime) -> DateTime<Local> {
    let today = local_instant(now.date_naive(), time);
    if today > now {
        today
    } else {
        local_instant(now.date_naive() + ChronoDuration::days(1), time)
    }
}
