//! Main application entry point.
//!
//! Parses the command line and dispatches to the command handlers in
//! `nightglow::commands`. Errors from any command end the process with a
//! non-zero exit status after being logged in the usual block style.

use anyhow::Result;

use nightglow::args::{self, CliAction, ParsedArgs};
use nightglow::commands;
use nightglow::common::constants::EXIT_FAILURE;
use nightglow::{log_end, log_error_exit, log_indented};

#[tokio::main]
async fn main() {
    let parsed_args = ParsedArgs::from_env();

    if let Err(error) = dispatch(parsed_args.action).await {
        log_error_exit!("{error}");
        for cause in error.chain().skip(1) {
            log_indented!("{cause}");
        }
        log_end!();
        std::process::exit(EXIT_FAILURE);
    }
}

async fn dispatch(action: CliAction) -> Result<()> {
    match action {
        CliAction::ShowVersion => {
            args::display_version_info();
            Ok(())
        }
        CliAction::ShowHelp => {
            args::display_help();
            Ok(())
        }
        CliAction::ShowHelpDueToError => {
            args::display_help();
            std::process::exit(EXIT_FAILURE);
        }
        CliAction::Help { command } => commands::help::run_help_command(command.as_deref()),
        CliAction::Run { options, hosts } => {
            commands::run::handle_run_command(&options, &hosts).await
        }
        CliAction::Status { options, json } => {
            commands::status::handle_status_command(&options, json).await
        }
        CliAction::Preview { options, period } => {
            commands::preview::handle_preview_command(&options, period).await
        }
        CliAction::Set {
            options,
            key,
            value,
        } => commands::set::handle_set_command(&options, &key, &value).await,
        CliAction::Exclude { options, hostname } => {
            commands::exclude::handle_exclude_command(&options, &hostname).await
        }
    }
}
