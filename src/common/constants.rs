//! Application constants and default values for nightglow.
//!
//! This module contains the configuration defaults, validation limits, and
//! operational timing constants shared by the popup, the background resolver
//! and every overlay controller.

// ═══ Schedule Defaults ═══
// Used when a boundary is missing from the store or fails to parse

pub const DEFAULT_ENABLED: bool = true;
pub const DEFAULT_DAYTIME_START: &str = "6:00 AM";
pub const DEFAULT_SUNSET_START: &str = "6:00 PM";
pub const DEFAULT_BEDTIME_START: &str = "10:00 PM";
pub const DEFAULT_DAYTIME_TEMP: u32 = 6500; // Kelvin - neutral, no visible tint
pub const DEFAULT_SUNSET_TEMP: u32 = 4200; // Kelvin - warm evening light
pub const DEFAULT_BEDTIME_TEMP: u32 = 2700; // Kelvin - candle-like

// ═══ Temperature Domain ═══

pub const DEFAULT_MIN_TEMP: u32 = 1500;
pub const DEFAULT_MAX_TEMP: u32 = 6500;
pub const MINIMUM_TEMP: u32 = 1000; // Hard floor for the configurable range
pub const MAXIMUM_TEMP: u32 = 20000; // Hard ceiling for the configurable range

// ═══ Preview Override ═══

pub const DEFAULT_PREVIEW_HOLD_SECS: u64 = 10; // Lifetime of a forced override
pub const DEFAULT_PREVIEW_EXIT_SECS: u64 = 5; // Popup leaves preview before the override lapses
pub const MINIMUM_PREVIEW_SECS: u64 = 1;
pub const MAXIMUM_PREVIEW_SECS: u64 = 60;

// ═══ Overlay Animation ═══

pub const DEFAULT_AUTO_ANIMATION_MS: u64 = 5000;
pub const DEFAULT_PREVIEW_ANIMATION_MS: u64 = 1000;
pub const MAXIMUM_ANIMATION_MS: u64 = 60_000;
pub const FRAME_INTERVAL_MS: u64 = 16; // ~60 frames per second

// ═══ Overlay Throttle ═══
// Near-identical automatic writes inside the window are not repainted

pub const DEFAULT_THROTTLE_DELTA: u32 = 25; // Kelvin
pub const DEFAULT_THROTTLE_WINDOW_MS: u64 = 3000;
pub const MAXIMUM_THROTTLE_DELTA: u32 = 1000;
pub const MAXIMUM_THROTTLE_WINDOW_MS: u64 = 60_000;

// ═══ Operational Timing ═══

pub const RESOLVER_TICK_SECS: u64 = 60; // Minute-aligned background recomputation
pub const DEFAULT_SAFETY_TICK_SECS: u64 = 60; // Overlay safety net for missed notifications
pub const MINIMUM_SAFETY_TICK_SECS: u64 = 10;
pub const MAXIMUM_SAFETY_TICK_SECS: u64 = 600;
pub const STORE_WATCH_DEBOUNCE_MS: u64 = 150;
pub const CHANGE_CHANNEL_CAPACITY: usize = 256;

// ═══ Overlay Compositing ═══

pub const OVERLAY_Z_INDEX: i32 = i32::MAX;
pub const OVERLAY_BLEED_PERCENT: u32 = 50; // Extra size around the viewport for zoom/fullscreen

// ═══ Exit Codes ═══

pub const EXIT_FAILURE: i32 = 1;

// ═══ Test Constants ═══
#[cfg(test)]
pub mod test_constants {
    pub const TEST_DAYTIME_START: &str = "6:00 AM";
    pub const TEST_SUNSET_START: &str = "6:00 PM";
    pub const TEST_BEDTIME_START: &str = "10:00 PM";
}
