//! Typed views over the raw key schema: the settings record and the
//! preview override.

use chrono::{DateTime, Local};
use serde::Serialize;
use serde_json::{Value, json};

use super::{Key, Snapshot, Store, StoreError};
use crate::common::constants::*;
use crate::core::period::{Period, Schedule, classify_period};

/// Allowed temperature domain; every stored temperature is clamped into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TemperatureRange {
    pub min: u32,
    pub max: u32,
}

impl Default for TemperatureRange {
    fn default() -> Self {
        Self {
            min: DEFAULT_MIN_TEMP,
            max: DEFAULT_MAX_TEMP,
        }
    }
}

impl TemperatureRange {
    pub fn clamp(&self, kelvin: u32) -> u32 {
        kelvin.clamp(self.min, self.max)
    }
}

/// The user's settings record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Settings {
    pub enabled: bool,
    pub daytime_start: String,
    pub sunset_start: String,
    pub bedtime_start: String,
    pub daytime_temp: u32,
    pub sunset_temp: u32,
    pub bedtime_temp: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: DEFAULT_ENABLED,
            daytime_start: DEFAULT_DAYTIME_START.to_string(),
            sunset_start: DEFAULT_SUNSET_START.to_string(),
            bedtime_start: DEFAULT_BEDTIME_START.to_string(),
            daytime_temp: DEFAULT_DAYTIME_TEMP,
            sunset_temp: DEFAULT_SUNSET_TEMP,
            bedtime_temp: DEFAULT_BEDTIME_TEMP,
        }
    }
}

impl Settings {
    /// Build from a snapshot, taking each missing or mistyped field from `defaults`.
    pub fn from_snapshot(snapshot: &Snapshot, defaults: &Settings, range: TemperatureRange) -> Self {
        let text = |key: Key, fallback: &String| {
            snapshot
                .str(key)
                .map(str::to_string)
                .unwrap_or_else(|| fallback.clone())
        };
        let kelvin = |key: Key, fallback: u32| range.clamp(snapshot.u32(key).unwrap_or(fallback));

        Self {
            enabled: snapshot.bool(Key::Enabled).unwrap_or(defaults.enabled),
            daytime_start: text(Key::DaytimeStart, &defaults.daytime_start),
            sunset_start: text(Key::SunsetStart, &defaults.sunset_start),
            bedtime_start: text(Key::BedtimeStart, &defaults.bedtime_start),
            daytime_temp: kelvin(Key::DaytimeTemp, defaults.daytime_temp),
            sunset_temp: kelvin(Key::SunsetTemp, defaults.sunset_temp),
            bedtime_temp: kelvin(Key::BedtimeTemp, defaults.bedtime_temp),
        }
    }

    pub async fn load(
        store: &Store,
        defaults: &Settings,
        range: TemperatureRange,
    ) -> Result<Self, StoreError> {
        let snapshot = store.get(&Key::SETTINGS).await?;
        Ok(Self::from_snapshot(&snapshot, defaults, range))
    }

    /// First-load initialization: write every settings key that is missing.
    ///
    /// Returns how many keys were written.
    pub async fn ensure_defaults(store: &Store, defaults: &Settings) -> Result<usize, StoreError> {
        let snapshot = store.get(&Key::SETTINGS).await?;
        let missing: Vec<(Key, Value)> = defaults
            .entries()
            .into_iter()
            .filter(|(key, _)| snapshot.get(*key).is_none())
            .collect();
        let count = missing.len();
        if count > 0 {
            store.set(missing).await?;
        }
        Ok(count)
    }

    pub fn entries(&self) -> Vec<(Key, Value)> {
        vec![
            (Key::Enabled, json!(self.enabled)),
            (Key::DaytimeStart, json!(self.daytime_start)),
            (Key::SunsetStart, json!(self.sunset_start)),
            (Key::BedtimeStart, json!(self.bedtime_start)),
            (Key::DaytimeTemp, json!(self.daytime_temp)),
            (Key::SunsetTemp, json!(self.sunset_temp)),
            (Key::BedtimeTemp, json!(self.bedtime_temp)),
        ]
    }

    /// Parsed boundaries, with per-boundary default fallback.
    pub fn schedule(&self) -> Schedule {
        Schedule::from_strings(&self.daytime_start, &self.sunset_start, &self.bedtime_start)
    }

    pub fn temperature_for(&self, period: Period) -> u32 {
        match period {
            Period::Daytime => self.daytime_temp,
            Period::Sunset => self.sunset_temp,
            Period::Bedtime => self.bedtime_temp,
        }
    }

    pub fn start_for(&self, period: Period) -> &str {
        match period {
            Period::Daytime => &self.daytime_start,
            Period::Sunset => &self.sunset_start,
            Period::Bedtime => &self.bedtime_start,
        }
    }

    /// The live period at `now` and its configured temperature.
    pub fn scheduled(&self, now: DateTime<Local>) -> (Period, u32) {
        let period = classify_period(now, &self.schedule());
        (period, self.temperature_for(period))
    }
}

/// A time-boxed forced temperature used for previews.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Override {
    pub temperature: u32,
    /// Epoch milliseconds
    pub expires_at: i64,
}

/// What the store holds for the override keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideState {
    Absent,
    Active(Override),
    /// Expired, or only half of the record present
    Stale,
}

impl Override {
    pub fn new(temperature: u32, expires_at: i64) -> Self {
        Self {
            temperature,
            expires_at,
        }
    }

    pub fn is_active(&self, now_millis: i64) -> bool {
        self.expires_at > now_millis
    }

    pub fn classify(snapshot: &Snapshot, now_millis: i64) -> OverrideState {
        match (
            snapshot.u32(Key::ForcedTemp),
            snapshot.i64(Key::ForcedTempExpires),
        ) {
            (None, None) => {
                if snapshot.get(Key::ForcedTemp).is_some()
                    || snapshot.get(Key::ForcedTempExpires).is_some()
                {
                    OverrideState::Stale
                } else {
                    OverrideState::Absent
                }
            }
            (Some(temperature), Some(expires_at)) => {
                let record = Override::new(temperature, expires_at);
                if record.is_active(now_millis) {
                    OverrideState::Active(record)
                } else {
                    OverrideState::Stale
                }
            }
            _ => OverrideState::Stale,
        }
    }

    /// The active override in `snapshot`, if any.
    pub fn active(snapshot: &Snapshot, now_millis: i64) -> Option<Override> {
        match Self::classify(snapshot, now_millis) {
            OverrideState::Active(record) => Some(record),
            _ => None,
        }
    }

    pub fn entries(&self) -> [(Key, Value); 2] {
        [
            (Key::ForcedTemp, json!(self.temperature)),
            (Key::ForcedTempExpires, json!(self.expires_at)),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StorageArea;
    use crate::time::{Clock, ManualClock};

    #[tokio::test]
    async fn test_load_uses_defaults_for_missing_keys() {
        let store = Store::memory(StorageArea::Local);
        store
            .set([(Key::SunsetTemp, json!(3900)), (Key::Enabled, json!(false))])
            .await
            .unwrap();

        let settings = Settings::load(&store, &Settings::default(), TemperatureRange::default())
            .await
            .unwrap();
        assert!(!settings.enabled);
        assert_eq!(settings.sunset_temp, 3900);
        assert_eq!(settings.daytime_temp, DEFAULT_DAYTIME_TEMP);
        assert_eq!(settings.bedtime_start, DEFAULT_BEDTIME_START);
    }

    #[tokio::test]
    async fn test_load_clamps_temperatures() {
        let store = Store::memory(StorageArea::Local);
        store
            .set([(Key::DaytimeTemp, json!(9000)), (Key::BedtimeTemp, json!(800))])
            .await
            .unwrap();
        let range = TemperatureRange {
            min: 2000,
            max: 8000,
        };
        let settings = Settings::load(&store, &Settings::default(), range).await.unwrap();
        assert_eq!(settings.daytime_temp, 8000);
        assert_eq!(settings.bedtime_temp, 2000);
    }

    #[tokio::test]
    async fn test_ensure_defaults_only_fills_gaps() {
        let store = Store::memory(StorageArea::Local);
        store.set([(Key::SunsetStart, json!("7:00 PM"))]).await.unwrap();

        let written = Settings::ensure_defaults(&store, &Settings::default()).await.unwrap();
        assert_eq!(written, 6);
        let snapshot = store.get_all().await.unwrap();
        assert_eq!(snapshot.str(Key::SunsetStart), Some("7:00 PM"));
        assert_eq!(snapshot.bool(Key::Enabled), Some(true));

        assert_eq!(Settings::ensure_defaults(&store, &Settings::default()).await.unwrap(), 0);
    }

    #[test]
    fn test_scheduled_temperature() {
        let clock = ManualClock::at(19, 0);
        let settings = Settings::default();
        assert_eq!(
            settings.scheduled(clock.now()),
            (Period::Sunset, DEFAULT_SUNSET_TEMP)
        );
    }

    #[tokio::test]
    async fn test_override_classification() {
        let store = Store::memory(StorageArea::Local);
        let snapshot = store.get(&Key::OVERRIDE).await.unwrap();
        assert_eq!(Override::classify(&snapshot, 1_000), OverrideState::Absent);

        store.set(Override::new(3000, 2_000).entries()).await.unwrap();
        let snapshot = store.get(&Key::OVERRIDE).await.unwrap();
        assert_eq!(
            Override::classify(&snapshot, 1_000),
            OverrideState::Active(Override::new(3000, 2_000))
        );
        assert_eq!(Override::classify(&snapshot, 2_000), OverrideState::Stale);

        store.remove(&[Key::ForcedTempExpires]).await.unwrap();
        let snapshot = store.get(&Key::OVERRIDE).await.unwrap();
        assert_eq!(Override::classify(&snapshot, 1_000), OverrideState::Stale);
    }
}
