//! Command-line argument parsing and processing.
//!
//! Handles the global flags (`--debug`, `--config`, `--store`) that may appear
//! anywhere on the command line, then the optional subcommand and its
//! positional arguments. Unknown options never abort parsing silently: they
//! produce [`CliAction::ShowHelpDueToError`].

use crate::core::period::Period;

/// Flags shared by every command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalOptions {
    pub debug_enabled: bool,
    /// Custom configuration directory (`--config DIR`)
    pub config_dir: Option<String>,
    /// Custom store file (`--store FILE`)
    pub store_path: Option<String>,
}

/// Represents the parsed command-line arguments and their intended actions.
#[derive(Debug, PartialEq)]
pub enum CliAction {
    /// Run the resolver plus one terminal page per `--host`
    Run {
        options: GlobalOptions,
        hosts: Vec<String>,
    },
    /// Print the live status
    Status { options: GlobalOptions, json: bool },
    /// Preview a period, then return to the schedule
    Preview {
        options: GlobalOptions,
        period: Period,
    },
    /// Write one settings key
    Set {
        options: GlobalOptions,
        key: String,
        value: String,
    },
    /// Toggle exclusion for a hostname
    Exclude {
        options: GlobalOptions,
        hostname: String,
    },
    /// Detailed help for a command (`nightglow help [COMMAND]`)
    Help { command: Option<String> },

    /// Display help information and exit
    ShowHelp,
    /// Display version information and exit
    ShowVersion,
    /// Show help due to unknown arguments and exit
    ShowHelpDueToError,
}

/// Result of parsing command-line arguments.
pub struct ParsedArgs {
    pub action: CliAction,
}

impl ParsedArgs {
    /// Parse command-line arguments into a structured result.
    ///
    /// The first item is the program name and is skipped, as with
    /// `std::env::args()`.
    pub fn parse<I, S>(args: I) -> ParsedArgs
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let args_vec: Vec<String> = args
            .into_iter()
            .skip(1)
            .map(|s| s.as_ref().to_string())
            .collect();

        let mut options = GlobalOptions::default();
        let mut display_help = false;
        let mut display_version = false;
        let mut unknown_arg_found = false;
        let mut json = false;
        let mut hosts = Vec::new();
        let mut positionals: Vec<String> = Vec::new();

        let mut i = 0;
        while i < args_vec.len() {
            let arg = &args_vec[i];
            match arg.as_str() {
                "--help" | "-h" => display_help = true,
                "--version" | "-V" | "-v" => display_version = true,
                "--debug" | "-d" => options.debug_enabled = true,
                "--json" => json = true,
                "--config" | "-c" | "--store" | "-s" | "--host" | "-H" => {
                    match args_vec.get(i + 1).filter(|next| !next.starts_with('-')) {
                        Some(value) => {
                            match arg.as_str() {
                                "--config" | "-c" => options.config_dir = Some(value.clone()),
                                "--store" | "-s" => options.store_path = Some(value.clone()),
                                _ => hosts.push(value.clone()),
                            }
                            i += 1;
                        }
                        None => {
                            log_warning!("Missing value for {}", arg);
                            unknown_arg_found = true;
                        }
                    }
                }
                other if other.starts_with('-') => {
                    log_warning!("Unknown option: {other}");
                    unknown_arg_found = true;
                }
                _ => positionals.push(arg.clone()),
            }
            i += 1;
        }

        // Version and help take precedence over everything else
        if display_version {
            return ParsedArgs {
                action: CliAction::ShowVersion,
            };
        }
        if display_help {
            return ParsedArgs {
                action: CliAction::ShowHelp,
            };
        }
        if unknown_arg_found {
            return ParsedArgs {
                action: CliAction::ShowHelpDueToError,
            };
        }

        let (command, rest) = match positionals.split_first() {
            Some((command, rest)) => (command.as_str(), rest),
            None => ("run", &[][..]),
        };

        let action = match command {
            "run" | "r" => match rest {
                [] => CliAction::Run { options, hosts },
                _ => too_many_arguments(command, rest),
            },
            "status" | "st" => match rest {
                [] => CliAction::Status { options, json },
                _ => too_many_arguments(command, rest),
            },
            "preview" | "p" => match rest {
                [name] => match name.parse::<Period>() {
                    Ok(period) => CliAction::Preview { options, period },
                    Err(e) => {
                        log_warning!("{e}");
                        CliAction::ShowHelpDueToError
                    }
                },
                [] => {
                    log_warning!("Missing period. Usage: nightglow preview <daytime|sunset|bedtime>");
                    CliAction::ShowHelpDueToError
                }
                _ => too_many_arguments(command, rest),
            },
            "set" => match rest {
                [key, value] => CliAction::Set {
                    options,
                    key: key.clone(),
                    value: value.clone(),
                },
                // Times may be passed unquoted: `set sunset_start 7:30 PM`
                [key, time, meridiem]
                    if meridiem.eq_ignore_ascii_case("am") || meridiem.eq_ignore_ascii_case("pm") =>
                {
                    CliAction::Set {
                        options,
                        key: key.clone(),
                        value: format!("{time} {meridiem}"),
                    }
                }
                [] | [_] => {
                    log_warning!("Missing key or value. Usage: nightglow set <key> <value>");
                    log_warning!("Example: nightglow set bedtime_temp 2400");
                    CliAction::ShowHelpDueToError
                }
                _ => too_many_arguments(command, rest),
            },
            "exclude" | "x" => match rest {
                [hostname] => CliAction::Exclude {
                    options,
                    hostname: hostname.clone(),
                },
                [] => {
                    log_warning!("Missing hostname. Usage: nightglow exclude <hostname>");
                    CliAction::ShowHelpDueToError
                }
                _ => too_many_arguments(command, rest),
            },
            "help" | "h" => match rest {
                [] => CliAction::Help { command: None },
                [topic] => CliAction::Help {
                    command: Some(topic.clone()),
                },
                _ => too_many_arguments(command, rest),
            },
            unknown => {
                log_warning!("Unknown command: {}", unknown);
                CliAction::ShowHelpDueToError
            }
        };

        ParsedArgs { action }
    }

    /// Convenience method to parse from std::env::args()
    pub fn from_env() -> ParsedArgs {
        Self::parse(std::env::args())
    }
}

fn too_many_arguments(command: &str, rest: &[String]) -> CliAction {
    log_error!(
        "Unexpected arguments for '{}': {}",
        command,
        rest.join(" ")
    );
    CliAction::ShowHelpDueToError
}

/// Displays version information using custom logging style.
pub fn display_version_info() {
    log_version!();
    log_pipe!();
    println!("┗ {}", env!("CARGO_PKG_DESCRIPTION"));
}

/// Displays custom help message using logger methods.
pub fn display_help() {
    log_version!();
    log_block_start!(env!("CARGO_PKG_DESCRIPTION"));
    log_block_start!("Usage:");
    log_indented!("nightglow [OPTIONS] [COMMAND]");
    log_block_start!("Options:");
    log_indented!("-c, --config <dir>      Use custom configuration directory");
    log_indented!("-s, --store <file>      Use custom store file");
    log_indented!("-d, --debug             Enable detailed debug output");
    log_indented!("-h, --help              Print help information");
    log_indented!("-V, --version           Print version information");
    log_block_start!("Commands:");
    log_indented!("run, r [--host NAME]... Resolve temperatures and render pages (default)");
    log_indented!("status, st [--json]     Show the live period and temperature");
    log_indented!("preview, p <period>     Preview daytime, sunset or bedtime");
    log_indented!("set <key> <value>       Change a setting");
    log_indented!("exclude, x <hostname>   Toggle tinting for a site");
    log_indented!("help, h [COMMAND]       Show detailed help for a command");
    log_end!();
}
