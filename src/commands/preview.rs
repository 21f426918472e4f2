//! Preview command - show another period's tint for a few seconds.
//!
//! Drives the same popup state machine the settings UI uses: the override
//! record is written, and the popup's own exit timer returns every page to
//! the schedule. Ctrl-C leaves the preview early.

use anyhow::Result;

use super::CommandContext;
use crate::args::GlobalOptions;
use crate::core::period::Period;
use crate::popup::Selection;

pub async fn handle_preview_command(options: &GlobalOptions, period: Period) -> Result<()> {
    log_version!();

    let context = CommandContext::open(options)?;
    let popup = context.popup();
    popup.open().await;

    match popup.select_period(period).await {
        Selection::Previewing { .. } => {
            log_indented!(
                "Returning to the schedule in {}s",
                context.config.popup_options().preview_exit.as_secs()
            );
            tokio::select! {
                _ = popup.preview_ended() => {}
                _ = tokio::signal::ctrl_c() => {
                    popup.exit_preview().await;
                }
            }
        }
        Selection::Reapplied {
            period,
            temperature,
        } => {
            log_block_start!(
                "{} {} is the live period, re-applied {temperature}K",
                period.symbol(),
                period
            );
        }
        // Only reachable when a preview was already running in this process
        Selection::Exited { .. } => {}
    }

    log_end!();
    Ok(())
}

pub fn display_help() {
    log_version!();
    log_block_start!("preview - Preview a period's temperature");
    log_block_start!("Usage: nightglow preview <daytime|sunset|bedtime>");
    log_block_start!("Description:");
    log_indented!("Every page shows the chosen period's tint for a few seconds, then");
    log_indented!("returns to the schedule. Previewing the live period re-applies it.");
    log_indented!("Pages of a running instance follow through the store file, so they");
    log_indented!("return to the schedule at the automatic transition speed.");
    log_block_start!("Examples:");
    log_indented!("nightglow preview bedtime");
    log_end!();
}
