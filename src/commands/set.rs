//! Set command implementation for changing one setting.
//!
//! Values are validated before anything is written. Writes go through the
//! popup so a change to the live period's temperature applies instantly on
//! every page, exactly like moving the popup's slider.

use anyhow::{Result, bail};

use super::CommandContext;
use crate::args::GlobalOptions;
use crate::core::period::Period;
use crate::core::period::time_format::{parse_time_12h, parse_time_24h};
use crate::popup::TemperatureChange;
use crate::store::Key;

/// A validated settings change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingChange {
    Enabled(bool),
    Boundary(Period, String),
    Temperature(Period, u32),
}

/// Validate a `<key> <value>` pair.
pub fn parse_setting(key: &str, value: &str) -> Result<SettingChange> {
    let Ok(key) = key.trim().to_ascii_lowercase().parse::<Key>() else {
        bail!(
            "Unknown setting '{}'. Settable keys: {}",
            key,
            settable_keys().join(", ")
        );
    };

    let period_of = |key_for: fn(Period) -> Key| {
        Period::ALL
            .into_iter()
            .find(|period| key_for(*period) == key)
    };

    if key == Key::Enabled {
        return match value.trim().to_ascii_lowercase().as_str() {
            "true" | "on" | "yes" | "1" => Ok(SettingChange::Enabled(true)),
            "false" | "off" | "no" | "0" => Ok(SettingChange::Enabled(false)),
            _ => bail!("enabled must be true or false, got '{value}'"),
        };
    }
    if let Some(period) = period_of(Key::start_for) {
        let value = value.trim();
        if parse_time_12h(value).or_else(|| parse_time_24h(value)).is_none() {
            bail!("{key} must be a time like \"7:30 PM\" or \"19:30\", got '{value}'");
        }
        return Ok(SettingChange::Boundary(period, value.to_string()));
    }
    if let Some(period) = period_of(Key::temp_for) {
        let Ok(kelvin) = value.trim().trim_end_matches(['K', 'k']).parse::<u32>() else {
            bail!("{key} must be a temperature in Kelvin, got '{value}'");
        };
        return Ok(SettingChange::Temperature(period, kelvin));
    }

    bail!("'{key}' is managed by nightglow and cannot be set directly");
}

fn settable_keys() -> Vec<&'static str> {
    Key::SETTINGS.iter().map(Key::as_str).collect()
}

/// Handle the set command
pub async fn handle_set_command(options: &GlobalOptions, key: &str, value: &str) -> Result<()> {
    log_version!();

    let change = parse_setting(key, value)?;
    let context = CommandContext::open(options)?;
    let popup = context.popup();
    popup.open().await;

    log_block_start!("Updated settings");
    match change {
        SettingChange::Enabled(enabled) => {
            popup.set_enabled(enabled).await;
            log_indented!("enabled = {enabled}");
        }
        SettingChange::Boundary(period, value) => {
            popup.set_boundary(period, &value).await?;
            let settings = popup.settings().await;
            log_indented!("{} = {}", Key::start_for(period), settings.start_for(period));
        }
        SettingChange::Temperature(period, requested) => {
            let key = Key::temp_for(period);
            match popup.set_temperature(period, requested).await {
                TemperatureChange::AppliedInstantly(kelvin) => {
                    log_indented!("{key} = {kelvin}");
                    log_indented!("{period} is live, pages switch without animation");
                }
                TemperatureChange::PreviewRefreshed(kelvin) | TemperatureChange::Saved(kelvin) => {
                    log_indented!("{key} = {kelvin}");
                }
            }
            let applied = popup.settings().await.temperature_for(period);
            if applied != requested {
                log_warning!("{requested}K is outside the configured range, clamped to {applied}K");
            }
        }
    }

    log_end!();
    Ok(())
}

pub fn display_help() {
    log_version!();
    log_block_start!("set - Change a setting");
    log_block_start!("Usage: nightglow set <key> <value>");
    log_block_start!("Keys:");
    log_indented!("enabled                        true | false");
    log_indented!("daytime_start, sunset_start,   H:MM AM/PM or HH:MM");
    log_indented!("bedtime_start");
    log_indented!("daytime_temp, sunset_temp,     Kelvin, clamped to min_temp..max_temp");
    log_indented!("bedtime_temp");
    log_block_start!("Examples:");
    log_indented!("nightglow set bedtime_temp 2400");
    log_indented!("nightglow set sunset_start \"7:30 PM\"");
    log_indented!("nightglow set enabled false");
    log_end!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_enabled() {
        assert_eq!(parse_setting("enabled", "off").unwrap(), SettingChange::Enabled(false));
        assert_eq!(parse_setting("Enabled", "TRUE").unwrap(), SettingChange::Enabled(true));
        assert!(parse_setting("enabled", "maybe").is_err());
    }

    #[test]
    fn test_parse_temperatures() {
        assert_eq!(
            parse_setting("bedtime_temp", "2400").unwrap(),
            SettingChange::Temperature(Period::Bedtime, 2400)
        );
        assert_eq!(
            parse_setting("sunset_temp", "3900K").unwrap(),
            SettingChange::Temperature(Period::Sunset, 3900)
        );
        assert!(parse_setting("daytime_temp", "-5").is_err());
        assert!(parse_setting("daytime_temp", "warm").is_err());
    }

    #[test]
    fn test_parse_boundaries() {
        assert_eq!(
            parse_setting("sunset_start", " 7:30 PM ").unwrap(),
            SettingChange::Boundary(Period::Sunset, "7:30 PM".to_string())
        );
        assert_eq!(
            parse_setting("bedtime_start", "22:15").unwrap(),
            SettingChange::Boundary(Period::Bedtime, "22:15".to_string())
        );
        assert!(parse_setting("daytime_start", "25:00").is_err());
        assert!(parse_setting("daytime_start", "soon").is_err());
    }

    #[test]
    fn test_internal_and_unknown_keys_rejected() {
        let error = parse_setting("current_temp", "3000").unwrap_err().to_string();
        assert!(error.contains("cannot be set directly"));

        let error = parse_setting("brightness", "90").unwrap_err().to_string();
        assert!(error.contains("Settable keys: enabled, daytime_start"));
    }
}
