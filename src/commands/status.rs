//! Status command - display the live period and temperature.
//!
//! Reads the shared store directly, so the output reflects what every page
//! of a running instance is showing, including an active preview override.

use anyhow::Result;

use super::CommandContext;
use crate::args::GlobalOptions;
use crate::common::logger::Log;
use crate::core::period::Period;
use crate::popup::PopupStatus;

pub async fn handle_status_command(options: &GlobalOptions, json: bool) -> Result<()> {
    // Keep stdout machine-readable
    if json {
        Log::set_enabled(false);
    }

    let context = CommandContext::open(options)?;
    let status = context.popup().status().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        display_human_readable(&status);
    }
    Ok(())
}

fn display_human_readable(status: &PopupStatus) {
    if !status.enabled {
        println!("        Status: disabled");
    }

    println!(
        "Current period: {} {}",
        status.period.symbol(),
        status.period
    );
    println!("       Started: {}", status.period_started);
    println!("     Scheduled: {}K", status.scheduled_temp);
    match status.current_temp {
        Some(current) => println!("       Current: {current}K"),
        None => println!("       Current: not resolved yet"),
    }

    if let Some((temperature, remaining_ms)) = status.forced {
        println!(
            "      Override: {temperature}K for {:.1}s",
            remaining_ms as f64 / 1000.0
        );
    }

    if let Some((next, when)) = &status.next_period {
        println!("   Next period: {next} {when}");
    }
    println!("  Next daytime: {}", status.next_daytime);

    if !status.excluded_hostnames.is_empty() {
        println!("      Excluded: {}", status.excluded_hostnames.join(", "));
    }

    if !status.unreachable_periods.is_empty() {
        let names: Vec<&str> = status
            .unreachable_periods
            .iter()
            .map(Period::display_name)
            .collect();
        println!("   Unreachable: {}", names.join(", "));
    }
}

pub fn display_help() {
    log_version!();
    log_block_start!("status - Show the live period and temperature");
    log_block_start!("Usage: nightglow status [--json]");
    log_block_start!("Options:");
    log_indented!("--json  Print the status as JSON");
    log_block_start!("Description:");
    log_indented!("Shows the period the schedule is in, when it started and ends,");
    log_indented!("the temperature pages are showing and any active preview override.");
    log_end!();
}
