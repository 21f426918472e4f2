//! Configuration system for nightglow.
//!
//! The configuration file provides the defaults for the settings record
//! (written to the store only for keys that are missing, so the user's
//! choices in the popup always win) and the timing tunables of the preview
//! protocol and the overlay animation.
//!
//! ## Configuration Source
//!
//! `nightglow.toml` is looked up in:
//! 1. the directory given with `--config DIR`
//! 2. **XDG_CONFIG_HOME**/nightglow/nightglow.toml
//!
//! A commented default file is created on first run.
//!
//! ## Configuration Structure
//!
//! ```toml
//! #[Schedule]
//! enabled = true                # Tint pages at all
//! daytime_start = "6:00 AM"     # Start of the Daytime period (H:MM AM/PM)
//! sunset_start = "6:00 PM"      # Start of the Sunset period (H:MM AM/PM)
//! bedtime_start = "10:00 PM"    # Start of the Bedtime period (H:MM AM/PM)
//!
//! #[Temperatures]
//! daytime_temp = 6500           # Kelvin
//! sunset_temp = 4200            # Kelvin
//! bedtime_temp = 2700           # Kelvin
//! min_temp = 1500               # Lower clamp for every temperature (1000-20000)
//! max_temp = 6500               # Upper clamp for every temperature (1000-20000)
//!
//! #[Preview]
//! preview_hold = 10             # Lifetime of a preview override in seconds (1-60)
//! preview_exit = 5              # Popup leaves preview after seconds (1-60, < preview_hold)
//!
//! #[Overlay]
//! auto_animation_ms = 5000      # Scheduled transition duration (0-60000)
//! preview_animation_ms = 1000   # User-driven transition duration (0-60000)
//! throttle_delta = 25           # Skip automatic changes smaller than this (Kelvin)
//! throttle_window_ms = 3000     # ...when the previous one was this recent
//! safety_tick = 60              # Overlay refresh safety net in seconds (10-600)
//! ```
//!
//! ## Validation and Error Handling
//!
//! Out-of-range values, malformed times and an inverted temperature range
//! are rejected with a descriptive error (see [`validation`]). A schedule
//! whose boundary order leaves a period unreachable is accepted with a
//! warning.

pub mod builder;
pub mod loading;
pub mod validation;

use anyhow::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::common::constants::*;
use crate::overlay::OverlayOptions;
use crate::popup::PopupOptions;
use crate::store::{Settings, TemperatureRange};

pub use builder::create_default_config;
pub use loading::{get_config_path, get_custom_config_dir, load, load_from_path, set_config_dir};

/// Configuration structure for nightglow settings.
///
/// Every field is optional; missing fields take the defaults from
/// [`crate::common::constants`].
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct Config {
    pub enabled: Option<bool>,
    pub daytime_start: Option<String>, // "H:MM AM/PM"
    pub sunset_start: Option<String>,
    pub bedtime_start: Option<String>,
    pub daytime_temp: Option<u32>,
    pub sunset_temp: Option<u32>,
    pub bedtime_temp: Option<u32>,
    pub min_temp: Option<u32>,
    pub max_temp: Option<u32>,
    pub preview_hold: Option<u64>, // seconds
    pub preview_exit: Option<u64>, // seconds
    pub auto_animation_ms: Option<u64>,
    pub preview_animation_ms: Option<u64>,
    pub throttle_delta: Option<u32>, // Kelvin
    pub throttle_window_ms: Option<u64>,
    pub safety_tick: Option<u64>, // seconds
}

impl Config {
    /// Load configuration using the module's load function
    pub fn load() -> Result<Self> {
        load()
    }

    /// Load from path using the module's load_from_path function
    pub fn load_from_path(path: &Path) -> Result<Self> {
        load_from_path(path)
    }

    /// Get configuration path using the module's get_config_path function
    pub fn get_config_path() -> Result<PathBuf> {
        get_config_path()
    }

    /// Defaults for the settings record in the store.
    pub fn settings_defaults(&self) -> Settings {
        let range = self.range();
        Settings {
            enabled: self.enabled.unwrap_or(DEFAULT_ENABLED),
            daytime_start: self
                .daytime_start
                .clone()
                .unwrap_or_else(|| DEFAULT_DAYTIME_START.to_string()),
            sunset_start: self
                .sunset_start
                .clone()
                .unwrap_or_else(|| DEFAULT_SUNSET_START.to_string()),
            bedtime_start: self
                .bedtime_start
                .clone()
                .unwrap_or_else(|| DEFAULT_BEDTIME_START.to_string()),
            daytime_temp: range.clamp(self.daytime_temp.unwrap_or(DEFAULT_DAYTIME_TEMP)),
            sunset_temp: range.clamp(self.sunset_temp.unwrap_or(DEFAULT_SUNSET_TEMP)),
            bedtime_temp: range.clamp(self.bedtime_temp.unwrap_or(DEFAULT_BEDTIME_TEMP)),
        }
    }

    pub fn range(&self) -> TemperatureRange {
        TemperatureRange {
            min: self.min_temp.unwrap_or(DEFAULT_MIN_TEMP),
            max: self.max_temp.unwrap_or(DEFAULT_MAX_TEMP),
        }
    }

    pub fn overlay_options(&self) -> OverlayOptions {
        OverlayOptions {
            auto_duration: Duration::from_millis(
                self.auto_animation_ms.unwrap_or(DEFAULT_AUTO_ANIMATION_MS),
            ),
            preview_duration: Duration::from_millis(
                self.preview_animation_ms
                    .unwrap_or(DEFAULT_PREVIEW_ANIMATION_MS),
            ),
            throttle_delta: self.throttle_delta.unwrap_or(DEFAULT_THROTTLE_DELTA),
            throttle_window: Duration::from_millis(
                self.throttle_window_ms
                    .unwrap_or(DEFAULT_THROTTLE_WINDOW_MS),
            ),
            safety_tick: Duration::from_secs(self.safety_tick.unwrap_or(DEFAULT_SAFETY_TICK_SECS)),
        }
    }

    pub fn popup_options(&self) -> PopupOptions {
        PopupOptions {
            preview_hold: Duration::from_secs(self.preview_hold.unwrap_or(DEFAULT_PREVIEW_HOLD_SECS)),
            preview_exit: Duration::from_secs(self.preview_exit.unwrap_or(DEFAULT_PREVIEW_EXIT_SECS)),
            defaults: self.settings_defaults(),
            range: self.range(),
        }
    }

    pub fn log_config(&self, path: Option<&Path>) {
        match path {
            Some(path) => log_block_start!(
                "Loaded configuration from {}",
                crate::common::utils::private_path(path)
            ),
            None => log_block_start!("Using built-in configuration"),
        }

        let settings = self.settings_defaults();
        let range = self.range();
        log_indented!(
            "Schedule: {} ☀ {} ◐ {} ☾",
            settings.daytime_start,
            settings.sunset_start,
            settings.bedtime_start
        );
        log_indented!(
            "Temperatures: {}K / {}K / {}K (range {}-{}K)",
            settings.daytime_temp,
            settings.sunset_temp,
            settings.bedtime_temp,
            range.min,
            range.max
        );

        let popup = self.popup_options();
        log_indented!(
            "Preview: hold {}s, exit after {}s",
            popup.preview_hold.as_secs(),
            popup.preview_exit.as_secs()
        );

        let overlay = self.overlay_options();
        log_indented!(
            "Animation: {}ms auto, {}ms preview",
            overlay.auto_duration.as_millis(),
            overlay.preview_duration.as_millis()
        );
        log_debug!(
            "Throttle: <{}K within {}ms, safety tick {}s",
            overlay.throttle_delta,
            overlay.throttle_window.as_millis(),
            overlay.safety_tick.as_secs()
        );
        if !settings.enabled {
            log_indented!("Filter is disabled by default");
        }
    }
}
