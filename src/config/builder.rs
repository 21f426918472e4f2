//! Default configuration file creation.
//!
//! Writes a commented `nightglow.toml` with every field at its default,
//! aligned with the config builder so the comments line up.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::common::constants::*;

/// Create a default config file at `path`, creating parent directories.
pub fn create_default_config(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create config directory")?;
    }

    fs::write(path, default_config_content()).context("Failed to write default config file")?;
    Ok(())
}

/// The text of a freshly created configuration file.
pub fn default_config_content() -> String {
    ConfigBuilder::new()
        .add_section("Schedule")
        .add_setting("enabled", &DEFAULT_ENABLED.to_string(), "Tint pages at all")
        .add_setting(
            "daytime_start",
            &format!("\"{DEFAULT_DAYTIME_START}\""),
            "Start of the Daytime period (H:MM AM/PM)",
        )
        .add_setting(
            "sunset_start",
            &format!("\"{DEFAULT_SUNSET_START}\""),
            "Start of the Sunset period (H:MM AM/PM)",
        )
        .add_setting(
            "bedtime_start",
            &format!("\"{DEFAULT_BEDTIME_START}\""),
            "Start of the Bedtime period (H:MM AM/PM)",
        )
        .add_section("Temperatures")
        .add_setting(
            "daytime_temp",
            &DEFAULT_DAYTIME_TEMP.to_string(),
            "Daytime color temperature (min_temp-max_temp) Kelvin",
        )
        .add_setting(
            "sunset_temp",
            &DEFAULT_SUNSET_TEMP.to_string(),
            "Sunset color temperature (min_temp-max_temp) Kelvin",
        )
        .add_setting(
            "bedtime_temp",
            &DEFAULT_BEDTIME_TEMP.to_string(),
            "Bedtime color temperature (min_temp-max_temp) Kelvin",
        )
        .add_setting(
            "min_temp",
            &DEFAULT_MIN_TEMP.to_string(),
            &format!("Lower clamp for every temperature ({MINIMUM_TEMP}-{MAXIMUM_TEMP})"),
        )
        .add_setting(
            "max_temp",
            &DEFAULT_MAX_TEMP.to_string(),
            &format!("Upper clamp for every temperature ({MINIMUM_TEMP}-{MAXIMUM_TEMP})"),
        )
        .add_section("Preview")
        .add_setting(
            "preview_hold",
            &DEFAULT_PREVIEW_HOLD_SECS.to_string(),
            &format!(
                "Lifetime of a preview override in seconds ({MINIMUM_PREVIEW_SECS}-{MAXIMUM_PREVIEW_SECS})"
            ),
        )
        .add_setting(
            "preview_exit",
            &DEFAULT_PREVIEW_EXIT_SECS.to_string(),
            "Popup leaves preview after this many seconds (< preview_hold)",
        )
        .add_section("Overlay")
        .add_setting(
            "auto_animation_ms",
            &DEFAULT_AUTO_ANIMATION_MS.to_string(),
            &format!("Scheduled transition duration (0-{MAXIMUM_ANIMATION_MS})ms"),
        )
        .add_setting(
            "preview_animation_ms",
            &DEFAULT_PREVIEW_ANIMATION_MS.to_string(),
            &format!("User-driven transition duration (0-{MAXIMUM_ANIMATION_MS})ms"),
        )
        .add_setting(
            "throttle_delta",
            &DEFAULT_THROTTLE_DELTA.to_string(),
            "Skip automatic changes smaller than this (Kelvin)",
        )
        .add_setting(
            "throttle_window_ms",
            &DEFAULT_THROTTLE_WINDOW_MS.to_string(),
            "...when the previous automatic change was this recent",
        )
        .add_setting(
            "safety_tick",
            &DEFAULT_SAFETY_TICK_SECS.to_string(),
            &format!(
                "Overlay refresh safety net in seconds ({MINIMUM_SAFETY_TICK_SECS}-{MAXIMUM_SAFETY_TICK_SECS})"
            ),
        )
        .build()
}

struct ConfigBuilder {
    entries: Vec<ConfigEntry>,
}

#[derive(Clone)]
struct ConfigEntry {
    content: String,
    entry_type: EntryType,
}

#[derive(Clone)]
enum EntryType {
    Section,
    Setting { line: String, comment: String },
}

impl ConfigBuilder {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    fn add_section(mut self, title: &str) -> Self {
        self.entries.push(ConfigEntry {
            content: format!("#[{title}]"),
            entry_type: EntryType::Section,
        });
        self
    }

    fn add_setting(mut self, key: &str, value: &str, comment: &str) -> Self {
        let line = format!("{key} = {value}");
        self.entries.push(ConfigEntry {
            content: line.clone(),
            entry_type: EntryType::Setting {
                line,
                comment: format!("# {comment}"),
            },
        });
        self
    }

    fn build(self) -> String {
        // Comments start one column past the longest setting line
        let max_width = self
            .entries
            .iter()
            .filter_map(|entry| match &entry.entry_type {
                EntryType::Setting { line, .. } => Some(line.len()),
                EntryType::Section => None,
            })
            .max()
            .unwrap_or(0)
            + 1;

        let mut result = Vec::new();
        let mut first_section = true;

        for entry in self.entries {
            match entry.entry_type {
                EntryType::Section => {
                    if !first_section {
                        result.push(String::new());
                    }
                    result.push(entry.content);
                    first_section = false;
                }
                EntryType::Setting { line, comment } => {
                    let padding = " ".repeat(max_width - line.len());
                    result.push(format!("{line}{padding}{comment}"));
                }
            }
        }

        let mut text = result.join("\n");
        text.push('\n');
        text
    }
}
