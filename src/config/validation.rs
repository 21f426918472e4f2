//! Configuration validation functionality.
//!
//! Rejects values that would make the schedule or the timers meaningless.
//! Boundary orderings are not restricted: any order is a valid schedule,
//! but an order that leaves a period unreachable is reported as a warning.

use anyhow::Result;

use super::Config;
use crate::common::constants::*;
use crate::core::period::{Period, Schedule, parse_time_12h};

/// Comprehensive configuration validation
pub fn validate_config(config: &Config) -> Result<()> {
    // Temperature range first, the period temperatures are checked against it
    for (name, value) in [("min_temp", config.min_temp), ("max_temp", config.max_temp)] {
        if let Some(temp) = value
            && !(MINIMUM_TEMP..=MAXIMUM_TEMP).contains(&temp)
        {
            anyhow::bail!(
                "{} ({}) must be between {} and {} Kelvin",
                name,
                temp,
                MINIMUM_TEMP,
                MAXIMUM_TEMP
            );
        }
    }

    let range = config.range();
    if range.min >= range.max {
        anyhow::bail!(
            "min_temp ({}) must be lower than max_temp ({})",
            range.min,
            range.max
        );
    }

    for (name, value) in [
        ("daytime_temp", config.daytime_temp),
        ("sunset_temp", config.sunset_temp),
        ("bedtime_temp", config.bedtime_temp),
    ] {
        if let Some(temp) = value
            && !(range.min..=range.max).contains(&temp)
        {
            anyhow::bail!(
                "{} ({}) must be between min_temp ({}) and max_temp ({}) Kelvin",
                name,
                temp,
                range.min,
                range.max
            );
        }
    }

    // Boundaries must be parseable 12-hour times
    let mut boundaries = [None; 3];
    for (index, (name, value)) in [
        ("daytime_start", &config.daytime_start),
        ("sunset_start", &config.sunset_start),
        ("bedtime_start", &config.bedtime_start),
    ]
    .into_iter()
    .enumerate()
    {
        if let Some(text) = value {
            match parse_time_12h(text) {
                Some(time) => boundaries[index] = Some(time),
                None => anyhow::bail!(
                    "Invalid {} '{}'. Use the H:MM AM/PM format, e.g. \"6:30 PM\"",
                    name,
                    text
                ),
            }
        }
    }

    let schedule = Schedule::default();
    let schedule = Schedule::new(
        boundaries[0].unwrap_or(schedule.daytime_start),
        boundaries[1].unwrap_or(schedule.sunset_start),
        boundaries[2].unwrap_or(schedule.bedtime_start),
    );
    warn_unreachable(&schedule.unreachable_periods());

    // Preview timing
    let hold = config.preview_hold.unwrap_or(DEFAULT_PREVIEW_HOLD_SECS);
    let exit = config.preview_exit.unwrap_or(DEFAULT_PREVIEW_EXIT_SECS);
    for (name, secs) in [("preview_hold", hold), ("preview_exit", exit)] {
        if !(MINIMUM_PREVIEW_SECS..=MAXIMUM_PREVIEW_SECS).contains(&secs) {
            anyhow::bail!(
                "{} ({} seconds) must be between {} and {} seconds",
                name,
                secs,
                MINIMUM_PREVIEW_SECS,
                MAXIMUM_PREVIEW_SECS
            );
        }
    }
    if exit >= hold {
        anyhow::bail!(
            "preview_exit ({}s) must be shorter than preview_hold ({}s) so the popup leaves preview before the override lapses",
            exit,
            hold
        );
    }

    // Overlay timing
    for (name, value) in [
        ("auto_animation_ms", config.auto_animation_ms),
        ("preview_animation_ms", config.preview_animation_ms),
    ] {
        if let Some(ms) = value
            && ms > MAXIMUM_ANIMATION_MS
        {
            anyhow::bail!(
                "{} ({} ms) must be at most {} milliseconds",
                name,
                ms,
                MAXIMUM_ANIMATION_MS
            );
        }
    }

    if let Some(delta) = config.throttle_delta
        && delta > MAXIMUM_THROTTLE_DELTA
    {
        anyhow::bail!(
            "throttle_delta ({}K) must be at most {} Kelvin",
            delta,
            MAXIMUM_THROTTLE_DELTA
        );
    }

    if let Some(window) = config.throttle_window_ms
        && window > MAXIMUM_THROTTLE_WINDOW_MS
    {
        anyhow::bail!(
            "throttle_window_ms ({} ms) must be at most {} milliseconds",
            window,
            MAXIMUM_THROTTLE_WINDOW_MS
        );
    }

    if let Some(tick) = config.safety_tick
        && !(MINIMUM_SAFETY_TICK_SECS..=MAXIMUM_SAFETY_TICK_SECS).contains(&tick)
    {
        anyhow::bail!(
            "safety_tick ({} seconds) must be between {} and {} seconds",
            tick,
            MINIMUM_SAFETY_TICK_SECS,
            MAXIMUM_SAFETY_TICK_SECS
        );
    }

    Ok(())
}

fn warn_unreachable(periods: &[Period]) {
    if periods.is_empty() {
        return;
    }
    let names: Vec<&str> = periods.iter().map(Period::display_name).collect();
    log_pipe!();
    log_warning!(
        "With these boundaries {} is never reached",
        names.join(" and ")
    );
    if periods.contains(&Period::Daytime) {
        log_indented!("A bedtime earlier on the clock than daytime makes Bedtime cover the whole day");
    }
}
