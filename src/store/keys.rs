//! The flat key schema shared by every context.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::core::period::Period;

/// Every key that lives in the shared store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Key {
    Enabled,
    DaytimeStart,
    SunsetStart,
    BedtimeStart,
    DaytimeTemp,
    SunsetTemp,
    BedtimeTemp,
    CurrentTemp,
    ForcedTemp,
    ForcedTempExpires,
    ExcludedHostnames,
    InstantApplyOnce,
}

impl Key {
    pub const ALL: [Key; 12] = [
        Key::Enabled,
        Key::DaytimeStart,
        Key::SunsetStart,
        Key::BedtimeStart,
        Key::DaytimeTemp,
        Key::SunsetTemp,
        Key::BedtimeTemp,
        Key::CurrentTemp,
        Key::ForcedTemp,
        Key::ForcedTempExpires,
        Key::ExcludedHostnames,
        Key::InstantApplyOnce,
    ];

    /// Keys that make up the user's settings record.
    pub const SETTINGS: [Key; 7] = [
        Key::Enabled,
        Key::DaytimeStart,
        Key::SunsetStart,
        Key::BedtimeStart,
        Key::DaytimeTemp,
        Key::SunsetTemp,
        Key::BedtimeTemp,
    ];

    /// The preview override record.
    pub const OVERRIDE: [Key; 2] = [Key::ForcedTemp, Key::ForcedTempExpires];

    /// Keys whose change triggers a background re-resolution.
    pub const RESOLVER_TRIGGERS: [Key; 9] = [
        Key::Enabled,
        Key::DaytimeStart,
        Key::SunsetStart,
        Key::BedtimeStart,
        Key::DaytimeTemp,
        Key::SunsetTemp,
        Key::BedtimeTemp,
        Key::ForcedTemp,
        Key::ForcedTempExpires,
    ];

    /// Keys whose change triggers an overlay recomputation.
    pub const OVERLAY_TRIGGERS: [Key; 5] = [
        Key::Enabled,
        Key::ExcludedHostnames,
        Key::CurrentTemp,
        Key::ForcedTemp,
        Key::ForcedTempExpires,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Key::Enabled => "enabled",
            Key::DaytimeStart => "daytime_start",
            Key::SunsetStart => "sunset_start",
            Key::BedtimeStart => "bedtime_start",
            Key::DaytimeTemp => "daytime_temp",
            Key::SunsetTemp => "sunset_temp",
            Key::BedtimeTemp => "bedtime_temp",
            Key::CurrentTemp => "current_temp",
            Key::ForcedTemp => "forced_temp",
            Key::ForcedTempExpires => "forced_temp_expires",
            Key::ExcludedHostnames => "excluded_hostnames",
            Key::InstantApplyOnce => "instant_apply_once",
        }
    }

    /// Temperature key for a period.
    pub fn temp_for(period: Period) -> Key {
        match period {
            Period::Daytime => Key::DaytimeTemp,
            Period::Sunset => Key::SunsetTemp,
            Period::Bedtime => Key::BedtimeTemp,
        }
    }

    /// Boundary key for a period.
    pub fn start_for(period: Period) -> Key {
        match period {
            Period::Daytime => Key::DaytimeStart,
            Period::Sunset => Key::SunsetStart,
            Period::Bedtime => Key::BedtimeStart,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Key {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Key::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| anyhow::anyhow!("Unknown key '{s}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_names_match_serde() {
        for key in Key::ALL {
            let json = serde_json::to_string(&key).unwrap();
            assert_eq!(json, format!("\"{}\"", key.as_str()));
            assert_eq!(key.as_str().parse::<Key>().unwrap(), key);
        }
    }

    #[test]
    fn test_resolver_does_not_listen_to_its_own_output() {
        assert!(!Key::RESOLVER_TRIGGERS.contains(&Key::CurrentTemp));
        assert!(!Key::RESOLVER_TRIGGERS.contains(&Key::InstantApplyOnce));
    }

    #[test]
    fn test_period_key_mapping() {
        assert_eq!(Key::temp_for(Period::Sunset), Key::SunsetTemp);
        assert_eq!(Key::start_for(Period::Bedtime), Key::BedtimeStart);
    }
}
