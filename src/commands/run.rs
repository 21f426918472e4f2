//! Run command: the long-lived instance.
//!
//! Starts the background resolver on the file-backed store and opens one
//! terminal-rendered page per `--host`. Exits on Ctrl-C after removing every
//! overlay and leaving any preview.

use anyhow::{Context, Result};

use super::CommandContext;
use crate::args::GlobalOptions;
use crate::common::logger::Log;
use crate::common::utils::private_path;
use crate::nightglow::Nightglow;
use crate::overlay::terminal::TerminalSurface;

pub async fn handle_run_command(options: &GlobalOptions, hosts: &[String]) -> Result<()> {
    log_version!();
    if options.debug_enabled {
        Log::set_debug(true);
        log_pipe!();
        log_debug!("Debug mode enabled - showing store and overlay details");
    }

    let context = CommandContext::open(options)?;
    context.config.log_config(Some(context.config_path.as_path()));
    if let Some(path) = context.store.path() {
        log_block_start!("Using store {}", private_path(path));
    }

    let mut running = Nightglow::new(context.store, context.config)
        .watch_store()
        .start()
        .await?;

    for host in hosts {
        let id = running.open_page(TerminalSurface::new(host));
        log_debug!("{host} attached as {id}");
    }
    if hosts.is_empty() {
        log_block_start!("No --host given, only resolving temperatures");
    }

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    log_block_start!("Shutting down...");
    running.shutdown().await;
    log_end!();
    Ok(())
}

pub fn display_help() {
    log_version!();
    log_block_start!("run - Resolve temperatures and render overlay pages");
    log_block_start!("Usage: nightglow run [--host NAME]...");
    log_block_start!("Options:");
    log_indented!("-H, --host <name>  Open a page for this hostname (repeatable)");
    log_block_start!("Description:");
    log_indented!("Keeps current_temp in step with the schedule, refreshed every minute");
    log_indented!("and after every settings change. Each page logs the tint it would");
    log_indented!("paint. Changes made by other nightglow commands apply immediately.");
    log_block_start!("Examples:");
    log_indented!("nightglow run --host example.com --host docs.rs");
    log_indented!("nightglow --debug");
    log_end!();
}
