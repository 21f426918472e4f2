//! Period classification for the circadian schedule.
//!
//! The day is split into three named arcs by three boundary times. The
//! boundaries may be in any order on the clock; the only rule is the
//! midnight-wrap check in [`classify_time`], which is also the single
//! tie-break for times that land exactly on a boundary (start-inclusive).
//!
//! ## Key Functionality
//! - **Period Detection**: [`classify_period`] for a timestamp
//! - **Boundary Handling**: [`Schedule`] with per-boundary default fallback
//! - **Derived Times**: period start, next daytime start, human deltas
//!   (see [`calculations`])
//! - **Time Strings**: 12/24-hour parsing and conversion (see [`time_format`])

pub mod calculations;
pub mod time_format;

pub use calculations::{
    human_delta, next_daytime_start, next_period_start, period_start_timestamp,
};
pub use time_format::{
    convert_from_24_hour, convert_to_24_hour, format_time_12h, minutes_since_midnight,
    parse_time_12h,
};

use chrono::{DateTime, Local, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::common::constants::{DEFAULT_BEDTIME_START, DEFAULT_DAYTIME_START, DEFAULT_SUNSET_START};

/// A named arc of the 24-hour schedule.
#[derive(Debug, PartialEq, Eq, Hash, Copy, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    /// From the daytime boundary until sunset - neutral light
    Daytime,
    /// From the sunset boundary until bedtime - warm evening tint
    Sunset,
    /// From the bedtime boundary until daytime, usually across midnight
    Bedtime,
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Period {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daytime" | "day" => Ok(Period::Daytime),
            "sunset" => Ok(Period::Sunset),
            "bedtime" | "night" => Ok(Period::Bedtime),
            other => anyhow::bail!("Unknown period '{other}' (expected daytime, sunset or bedtime)"),
        }
    }
}

impl Period {
    pub const ALL: [Period; 3] = [Period::Daytime, Period::Sunset, Period::Bedtime];

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Daytime => "Daytime",
            Self::Sunset => "Sunset",
            Self::Bedtime => "Bedtime",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Daytime => "☀",
            Self::Sunset => "◐",
            Self::Bedtime => "☾",
        }
    }

    /// The period that follows this one on the clock.
    pub fn next_period(&self) -> Self {
        match self {
            Self::Daytime => Self::Sunset,
            Self::Sunset => Self::Bedtime,
            Self::Bedtime => Self::Daytime,
        }
    }
}

/// The three boundary times of the schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    pub daytime_start: NaiveTime,
    pub sunset_start: NaiveTime,
    pub bedtime_start: NaiveTime,
}

impl Default for Schedule {
    fn default() -> Self {
        Self::from_strings(DEFAULT_DAYTIME_START, DEFAULT_SUNSET_START, DEFAULT_BEDTIME_START)
    }
}

impl Schedule {
    pub fn new(daytime_start: NaiveTime, sunset_start: NaiveTime, bedtime_start: NaiveTime) -> Self {
        Self {
            daytime_start,
            sunset_start,
            bedtime_start,
        }
    }

    /// Build a schedule from stored 12-hour strings.
    ///
    /// A string that fails to parse is replaced by that boundary's default
    /// (6:00 AM / 6:00 PM / 10:00 PM) and a warning is logged.
    pub fn from_strings(daytime_start: &str, sunset_start: &str, bedtime_start: &str) -> Self {
        Self {
            daytime_start: parse_or_default("daytime_start", daytime_start, DEFAULT_DAYTIME_START),
            sunset_start: parse_or_default("sunset_start", sunset_start, DEFAULT_SUNSET_START),
            bedtime_start: parse_or_default("bedtime_start", bedtime_start, DEFAULT_BEDTIME_START),
        }
    }

    /// Periods that no minute of the day classifies into.
    ///
    /// Arbitrary boundary orders are accepted; this lets callers warn when an
    /// ordering leaves a period unreachable.
    pub fn unreachable_periods(&self) -> Vec<Period> {
        let mut seen = [false; 3];
        for minute in 0..(24 * 60) {
            if let Some(time) = NaiveTime::from_hms_opt(minute / 60, minute % 60, 0) {
                let index = match classify_time(time, self) {
                    Period::Daytime => 0,
                    Period::Sunset => 1,
                    Period::Bedtime => 2,
                };
                seen[index] = true;
            }
        }
        Period::ALL
            .into_iter()
            .zip(seen)
            .filter_map(|(period, reached)| (!reached).then_some(period))
            .collect()
    }

    /// Boundary at which `period` begins.
    pub fn boundary(&self, period: Period) -> NaiveTime {
        match period {
            Period::Daytime => self.daytime_start,
            Period::Sunset => self.sunset_start,
            Period::Bedtime => self.bedtime_start,
        }
    }
}

fn parse_or_default(field: &str, value: &str, default: &str) -> NaiveTime {
    if let Some(time) = parse_time_12h(value) {
        return time;
    }
    log_warning!("Invalid {field} '{value}', falling back to {default}");
    // Defaults are compile-time constants in the accepted format
    parse_time_12h(default).unwrap_or(NaiveTime::MIN)
}

/// Classify a timestamp's local wall time against the schedule.
pub fn classify_period(now: DateTime<Local>, schedule: &Schedule) -> Period {
    classify_time(now.time(), schedule)
}

/// Classify a wall time against the schedule.
///
/// When bedtime falls numerically before daytime the Bedtime arc wraps past
/// midnight: anything at or after bedtime, or before daytime, is Bedtime.
/// Otherwise the arcs are `[daytime, sunset)`, `[sunset, bedtime)` and the
/// remainder is Bedtime.
pub fn classify_time(time: NaiveTime, schedule: &Schedule) -> Period {
    let now = minutes_since_midnight(time);
    let daytime = minutes_since_midnight(schedule.daytime_start);
    let sunset = minutes_since_midnight(schedule.sunset_start);
    let bedtime = minutes_since_midnight(schedule.bedtime_start);

    if bedtime < daytime {
        if now >= bedtime || now < daytime {
            Period::Bedtime
        } else if now < sunset {
            Period::Daytime
        } else {
            Period::Sunset
        }
    } else if now >= daytime && now < sunset {
        Period::Daytime
    } else if now >= sunset && now < bedtime {
        Period::Sunset
    } else {
        Period::Bedtime
    }
}
