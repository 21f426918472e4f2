//! Help command implementation for nightglow.
//!
//! Dispatches to command-specific help or shows the command overview.

use anyhow::Result;

/// Run the help command (dispatcher)
///
/// # Arguments
/// * `command` - Optional command name to get help for (None = general help)
pub fn run_help_command(command: Option<&str>) -> Result<()> {
    match command {
        None => display_general_help(),
        Some("run") | Some("r") => super::run::display_help(),
        Some("status") | Some("st") => super::status::display_help(),
        Some("preview") | Some("p") => super::preview::display_help(),
        Some("set") => super::set::display_help(),
        Some("exclude") | Some("x") => super::exclude::display_help(),
        Some("help") | Some("h") => display_help_help(),
        Some(unknown) => {
            log_warning!("Unknown command: {}", unknown);
            display_general_help();
        }
    }
    Ok(())
}

/// Display general help focused on commands
fn display_general_help() {
    log_version!();
    log_block_start!("Available Commands:");
    log_indented!("run, r [--host NAME]...  Resolve temperatures and render pages");
    log_indented!("status, st [--json]      Show the live period and temperature");
    log_indented!("preview, p <period>      Preview daytime, sunset or bedtime");
    log_indented!("set <key> <value>        Change a setting");
    log_indented!("exclude, x <hostname>    Toggle tinting for a site");
    log_indented!("help, h [COMMAND]        Show detailed help for a command");
    log_pipe!();
    log_info!("Use 'nightglow help <command>' to see detailed help for a specific command.");
    log_indented!("Use 'nightglow --help' to see all options and general usage.");
    log_end!();
}

/// Display help for the help command itself
fn display_help_help() {
    log_version!();
    log_block_start!("help - Display help information");
    log_block_start!("Usage: nightglow help [COMMAND]");
    log_block_start!("Arguments:");
    log_indented!("COMMAND  Optional command to get help for");
    log_indented!("         If omitted, shows general help");
    log_block_start!("Examples:");
    log_indented!("nightglow help");
    log_indented!("nightglow help preview");
    log_end!();
}
