//! Settings popup state machine.
//!
//! The popup's widgets are thin views over this type. It owns the preview
//! protocol: selecting a period other than the live one forces that period's
//! temperature on every page for a short while through the override record,
//! and a single exit timer returns to the schedule.
//!
//! All writes go through the store; pages are additionally nudged with an
//! `updateFilter{preview}` message so they animate at preview speed instead
//! of waiting for their store notification.

use anyhow::{Result, bail};
use chrono::{DateTime, Local};
use serde::Serialize;
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, Notify};
use tokio::task::JoinHandle;

use crate::common::constants::*;
use crate::core::period::time_format::{format_time_12h, parse_time_24h};
use crate::core::period::{
    Period, Schedule, classify_period, human_delta, next_daytime_start, next_period_start,
    parse_time_12h, period_start_timestamp,
};
use crate::messaging::{Message, Messenger, UpdateMode};
use crate::store::{Key, Override, Settings, Store, TemperatureRange};
use crate::time::SharedClock;

/// Preview timing and the settings fallbacks used when the store is unreachable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopupOptions {
    /// Lifetime of the override record
    pub preview_hold: Duration,
    /// Popup leaves preview after this long
    pub preview_exit: Duration,
    pub defaults: Settings,
    pub range: TemperatureRange,
}

impl Default for PopupOptions {
    fn default() -> Self {
        Self {
            preview_hold: Duration::from_secs(DEFAULT_PREVIEW_HOLD_SECS),
            preview_exit: Duration::from_secs(DEFAULT_PREVIEW_EXIT_SECS),
            defaults: Settings::default(),
            range: TemperatureRange::default(),
        }
    }
}

/// Result of selecting a period in the popup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// The live period was re-applied from the schedule
    Reapplied { period: Period, temperature: u32 },
    /// Another period is being previewed until `expires_at` (epoch ms)
    Previewing {
        period: Period,
        temperature: u32,
        expires_at: i64,
    },
    /// Preview ended and the schedule was restored
    Exited { period: Period, temperature: u32 },
}

/// Result of a temperature adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemperatureChange {
    /// Live period changed; pages jump to it without animation
    AppliedInstantly(u32),
    /// Previewed period changed; override refreshed
    PreviewRefreshed(u32),
    /// Saved for a period that is not on screen
    Saved(u32),
}

/// Everything the popup shows at a glance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PopupStatus {
    pub enabled: bool,
    pub period: Period,
    pub scheduled_temp: u32,
    pub current_temp: Option<u32>,
    pub period_started: String,
    pub next_period: Option<(Period, String)>,
    pub next_daytime: String,
    /// Active override as (temperature, remaining ms)
    pub forced: Option<(u32, i64)>,
    pub previewing: Option<Period>,
    pub excluded_hostnames: Vec<String>,
    pub unreachable_periods: Vec<Period>,
}

#[derive(Default)]
struct PreviewState {
    period: Option<Period>,
    /// Bumped by every (re)start, so an exit timer can tell it is stale
    generation: u64,
    exit_timer: Option<JoinHandle<()>>,
}

pub struct Popup {
    store: Store,
    clock: SharedClock,
    messenger: Messenger,
    options: PopupOptions,
    preview: Mutex<PreviewState>,
    /// Held across the store writes of entering and leaving preview
    transition: AsyncMutex<()>,
    ended: Notify,
}

impl Popup {
    pub fn new(
        store: Store,
        clock: SharedClock,
        messenger: Messenger,
        options: PopupOptions,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            clock,
            messenger,
            options,
            preview: Mutex::new(PreviewState::default()),
            transition: AsyncMutex::new(()),
            ended: Notify::new(),
        })
    }

    /// Open the popup: make sure the settings record exists.
    pub async fn open(self: &Arc<Self>) -> Settings {
        match Settings::ensure_defaults(&self.store, &self.options.defaults).await {
            Ok(0) => {}
            Ok(written) => log_debug!("Popup: initialized {written} settings keys"),
            Err(e) => log_debug!("Popup: settings not initialized: {e}"),
        }
        self.settings().await
    }

    /// Current settings, or the defaults when the store is unreachable.
    pub async fn settings(&self) -> Settings {
        Settings::load(&self.store, &self.options.defaults, self.options.range)
            .await
            .unwrap_or_else(|_| self.options.defaults.clone())
    }

    /// Period being previewed, if any.
    pub fn previewing(&self) -> Option<Period> {
        self.preview.lock().ok().and_then(|state| state.period)
    }

    /// Click on a period in the popup.
    pub async fn select_period(self: &Arc<Self>, period: Period) -> Selection {
        let settings = self.settings().await;
        let now = self.clock.now();
        let live = classify_period(now, &settings.schedule());

        if period == live {
            if self.previewing().is_some() {
                return self.exit_preview().await;
            }
            let temperature = settings.temperature_for(live);
            self.write(vec![(Key::CurrentTemp, json!(temperature))]).await;
            self.messenger
                .broadcast(Message::update_filter(UpdateMode::Preview));
            return Selection::Reapplied {
                period: live,
                temperature,
            };
        }

        let temperature = settings.temperature_for(period);
        let expires_at = self.start_preview(period, temperature, now).await;
        log_block_start!(
            "{} Previewing {} ({temperature}K)",
            period.symbol(),
            period.display_name()
        );
        Selection::Previewing {
            period,
            temperature,
            expires_at,
        }
    }

    /// Write the override, (re)start the exit timer and notify pages.
    async fn start_preview(self: &Arc<Self>, period: Period, temperature: u32, now: DateTime<Local>) -> i64 {
        let _transition = self.transition.lock().await;
        let expires_at = now.timestamp_millis() + self.options.preview_hold.as_millis() as i64;
        self.write(Override::new(temperature, expires_at).entries().to_vec())
            .await;

        if let Ok(mut state) = self.preview.lock() {
            state.period = Some(period);
            state.generation += 1;

            let popup = Arc::clone(self);
            let delay = self.options.preview_exit;
            let generation = state.generation;
            let timer = tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                popup.expire_preview(generation).await;
            });
            if let Some(previous) = state.exit_timer.replace(timer) {
                previous.abort();
            }
        }

        self.messenger
            .broadcast(Message::update_filter(UpdateMode::Preview));
        expires_at
    }

    /// Wait until the running preview has been exited and the schedule
    /// restored. Returns immediately when no preview is running.
    pub async fn preview_ended(&self) {
        let notified = self.ended.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        if self.previewing().is_none() {
            return;
        }
        notified.await;
    }

    /// Leave preview now.
    pub async fn exit_preview(self: &Arc<Self>) -> Selection {
        let _transition = self.transition.lock().await;
        self.finish_preview(true).await
    }

    /// Exit timer of preview `generation`; does nothing if a newer preview
    /// started since.
    async fn expire_preview(&self, generation: u64) -> Option<Selection> {
        let _transition = self.transition.lock().await;
        let current = self.preview.lock().ok().map(|state| state.generation);
        if current != Some(generation) {
            log_debug!("Popup: stale preview timer ignored");
            return None;
        }
        Some(self.finish_preview(false).await)
    }

    // Callers hold `transition`
    async fn finish_preview(&self, cancel_timer: bool) -> Selection {
        if let Ok(mut state) = self.preview.lock() {
            state.period = None;
            if let Some(timer) = state.exit_timer.take()
                && cancel_timer
            {
                timer.abort();
            }
        }

        if let Err(e) = self.store.remove(&Key::OVERRIDE).await {
            log_debug!("Popup: override not cleared: {e}");
        }
        let settings = self.settings().await;
        let (period, temperature) = settings.scheduled(self.clock.now());
        self.write(vec![(Key::CurrentTemp, json!(temperature))]).await;
        self.messenger
            .broadcast(Message::update_filter(UpdateMode::Preview));

        log_block_start!(
            "{} Back to {} ({temperature}K)",
            period.symbol(),
            period.display_name()
        );
        self.ended.notify_waiters();
        Selection::Exited {
            period,
            temperature,
        }
    }

    /// Slider change for one period's temperature (clamped to the range).
    pub async fn set_temperature(self: &Arc<Self>, period: Period, kelvin: u32) -> TemperatureChange {
        let kelvin = self.options.range.clamp(kelvin);
        let key = Key::temp_for(period);

        if self.previewing() == Some(period) {
            self.write(vec![(key, json!(kelvin))]).await;
            self.start_preview(period, kelvin, self.clock.now()).await;
            return TemperatureChange::PreviewRefreshed(kelvin);
        }

        let settings = self.settings().await;
        let live = classify_period(self.clock.now(), &settings.schedule());
        if period == live && self.previewing().is_none() {
            self.write(vec![
                (key, json!(kelvin)),
                (Key::InstantApplyOnce, json!(true)),
                (Key::CurrentTemp, json!(kelvin)),
            ])
            .await;
            return TemperatureChange::AppliedInstantly(kelvin);
        }

        self.write(vec![(key, json!(kelvin))]).await;
        TemperatureChange::Saved(kelvin)
    }

    /// Change a period boundary. Accepts `"H:MM AM/PM"` or 24-hour `"HH:MM"`.
    ///
    /// Returns the periods the new ordering leaves unreachable.
    pub async fn set_boundary(self: &Arc<Self>, period: Period, value: &str) -> Result<Vec<Period>> {
        let Some(time) = parse_time_12h(value).or_else(|| parse_time_24h(value)) else {
            bail!("Invalid time '{value}' for {period}: use H:MM AM/PM or HH:MM");
        };

        let canonical = format_time_12h(time);
        self.write(vec![(Key::start_for(period), json!(canonical))])
            .await;

        let settings = self.settings().await;
        let mut schedule = settings.schedule();
        match period {
            Period::Daytime => schedule.daytime_start = time,
            Period::Sunset => schedule.sunset_start = time,
            Period::Bedtime => schedule.bedtime_start = time,
        }
        let unreachable = schedule.unreachable_periods();
        for skipped in &unreachable {
            log_warning!("{skipped} is never reached with this schedule");
        }
        Ok(unreachable)
    }

    pub async fn set_enabled(self: &Arc<Self>, enabled: bool) {
        self.write(vec![(Key::Enabled, json!(enabled))]).await;
    }

    /// Toggle per-site exclusion. Returns whether the host is now excluded.
    pub async fn toggle_site(self: &Arc<Self>, hostname: &str) -> Result<bool> {
        let host = hostname.trim().to_ascii_lowercase();
        if host.is_empty() || host.contains(char::is_whitespace) {
            bail!("Invalid hostname '{hostname}'");
        }

        let mut hosts = match self.store.get(&[Key::ExcludedHostnames]).await {
            Ok(snapshot) => snapshot.strings(Key::ExcludedHostnames),
            Err(_) => Vec::new(),
        };
        let excluded = if let Some(index) = hosts.iter().position(|h| h.eq_ignore_ascii_case(&host)) {
            hosts.remove(index);
            false
        } else {
            hosts.push(host);
            true
        };
        self.write(vec![(Key::ExcludedHostnames, json!(hosts))]).await;
        Ok(excluded)
    }

    pub async fn status(&self) -> PopupStatus {
        let settings = self.settings().await;
        let snapshot = self.store.get_all().await.unwrap_or_default();
        let now = self.clock.now();
        let schedule: Schedule = settings.schedule();
        let period = classify_period(now, &schedule);

        let started = period_start_timestamp(now, period, &schedule);
        let next_daytime = next_daytime_start(now, schedule.daytime_start);
        let now_millis = now.timestamp_millis();

        PopupStatus {
            enabled: settings.enabled,
            period,
            scheduled_temp: settings.temperature_for(period),
            current_temp: snapshot.u32(Key::CurrentTemp),
            period_started: human_delta(now, started),
            next_period: next_period_start(now, &schedule)
                .map(|(next, when)| (next, human_delta(now, when))),
            next_daytime: human_delta(now, next_daytime),
            forced: Override::active(&snapshot, now_millis)
                .map(|forced| (forced.temperature, forced.expires_at - now_millis)),
            previewing: self.previewing(),
            excluded_hostnames: snapshot.strings(Key::ExcludedHostnames),
            unreachable_periods: schedule.unreachable_periods(),
        }
    }

    // Storage failures are never surfaced to the user
    async fn write(&self, entries: Vec<(Key, serde_json::Value)>) {
        if let Err(e) = self.store.set(entries).await {
            log_debug!("Popup: write skipped: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::logger::Log;
    use crate::store::StorageArea;
    use crate::time::{Clock, ManualClock};
    use serial_test::serial;

    struct Harness {
        store: Store,
        clock: Arc<ManualClock>,
        messenger: Messenger,
        popup: Arc<Popup>,
    }

    async fn harness(hour: u32, minute: u32) -> Harness {
        Log::set_enabled(false);
        let store = Store::memory(StorageArea::Local);
        let clock = ManualClock::ticking_at(hour, minute);
        let messenger = Messenger::new();
        let popup = Popup::new(
            store.clone(),
            clock.clone(),
            messenger.clone(),
            PopupOptions::default(),
        );
        popup.open().await;
        Harness {
            store,
            clock,
            messenger,
            popup,
        }
    }

    async fn value(store: &Store, key: Key) -> Option<serde_json::Value> {
        store.get(&[key]).await.unwrap().get(key).cloned()
    }

    #[tokio::test(start_paused = true)]
    #[serial]
    async fn test_open_writes_defaults_once() {
        let h = harness(12, 0).await;
        assert_eq!(h.store.get(&Key::SETTINGS).await.unwrap().len(), 7);
        assert_eq!(h.popup.settings().await, Settings::default());
    }

    #[tokio::test(start_paused = true)]
    #[serial]
    async fn test_selecting_live_period_reapplies_and_broadcasts() {
        let h = harness(12, 0).await;
        let (_, mut inbox) = h.messenger.register();

        let selection = h.popup.select_period(Period::Daytime).await;
        assert_eq!(
            selection,
            Selection::Reapplied {
                period: Period::Daytime,
                temperature: 6500
            }
        );
        assert_eq!(value(&h.store, Key::CurrentTemp).await, Some(json!(6500)));
        assert_eq!(
            inbox.try_recv().ok(),
            Some(Message::update_filter(UpdateMode::Preview))
        );
        assert!(h.popup.previewing().is_none());
    }

    #[tokio::test(start_paused = true)]
    #[serial]
    async fn test_preview_writes_override_and_exits_after_timer() {
        let h = harness(12, 0).await;
        let (_, mut inbox) = h.messenger.register();
        let start = h.clock.now_millis();

        let selection = h.popup.select_period(Period::Bedtime).await;
        let Selection::Previewing {
            temperature,
            expires_at,
            ..
        } = selection
        else {
            panic!("expected preview, got {selection:?}");
        };
        assert_eq!(temperature, 2700);
        assert_eq!(expires_at, start + 10_000);
        assert_eq!(value(&h.store, Key::ForcedTemp).await, Some(json!(2700)));
        assert_eq!(h.popup.previewing(), Some(Period::Bedtime));
        assert!(inbox.try_recv().is_ok());

        tokio::time::sleep(Duration::from_millis(5_050)).await;
        assert!(h.popup.previewing().is_none());
        assert!(h.store.get(&Key::OVERRIDE).await.unwrap().is_empty());
        assert_eq!(value(&h.store, Key::CurrentTemp).await, Some(json!(6500)));
        assert_eq!(
            inbox.try_recv().ok(),
            Some(Message::update_filter(UpdateMode::Preview))
        );
    }

    #[tokio::test(start_paused = true)]
    #[serial]
    async fn test_preview_ended_waits_for_exit_timer() {
        let h = harness(12, 0).await;
        h.popup.preview_ended().await;

        h.popup.select_period(Period::Sunset).await;
        let started = tokio::time::Instant::now();
        h.popup.preview_ended().await;
        assert!(started.elapsed() >= PopupOptions::default().preview_exit);
        assert!(h.store.get(&Key::OVERRIDE).await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    #[serial]
    async fn test_selecting_live_period_while_previewing_exits() {
        let h = harness(12, 0).await;
        h.popup.select_period(Period::Sunset).await;

        let selection = h.popup.select_period(Period::Daytime).await;
        assert_eq!(
            selection,
            Selection::Exited {
                period: Period::Daytime,
                temperature: 6500
            }
        );
        assert!(h.store.get(&Key::OVERRIDE).await.unwrap().is_empty());

        // The cancelled exit timer must not fire later
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(h.popup.previewing().is_none());
    }

    #[tokio::test(start_paused = true)]
    #[serial]
    async fn test_switching_preview_restarts_single_timer() {
        let h = harness(12, 0).await;
        h.popup.select_period(Period::Sunset).await;
        tokio::time::sleep(Duration::from_secs(3)).await;
        h.popup.select_period(Period::Bedtime).await;

        // First timer would have fired at 5 s
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        assert_eq!(h.popup.previewing(), Some(Period::Bedtime));
        assert_eq!(value(&h.store, Key::ForcedTemp).await, Some(json!(2700)));

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(h.popup.previewing().is_none());
    }

    #[tokio::test(start_paused = true)]
    #[serial]
    async fn test_live_temperature_change_is_instant() {
        let h = harness(19, 0).await;
        let change = h.popup.set_temperature(Period::Sunset, 3800).await;
        assert_eq!(change, TemperatureChange::AppliedInstantly(3800));

        let snapshot = h.store.get_all().await.unwrap();
        assert_eq!(snapshot.u32(Key::SunsetTemp), Some(3800));
        assert_eq!(snapshot.u32(Key::CurrentTemp), Some(3800));
        assert_eq!(snapshot.bool(Key::InstantApplyOnce), Some(true));
    }

    #[tokio::test(start_paused = true)]
    #[serial]
    async fn test_other_period_temperature_is_saved_and_clamped() {
        let h = harness(19, 0).await;
        let change = h.popup.set_temperature(Period::Bedtime, 900).await;
        assert_eq!(change, TemperatureChange::Saved(DEFAULT_MIN_TEMP));
        let snapshot = h.store.get_all().await.unwrap();
        assert_eq!(snapshot.u32(Key::BedtimeTemp), Some(DEFAULT_MIN_TEMP));
        assert_eq!(snapshot.bool(Key::InstantApplyOnce), None);
    }

    #[tokio::test(start_paused = true)]
    #[serial]
    async fn test_previewed_temperature_refreshes_override() {
        let h = harness(12, 0).await;
        h.popup.select_period(Period::Bedtime).await;
        tokio::time::sleep(Duration::from_secs(4)).await;

        let change = h.popup.set_temperature(Period::Bedtime, 2000).await;
        assert_eq!(change, TemperatureChange::PreviewRefreshed(2000));
        let snapshot = h.store.get_all().await.unwrap();
        assert_eq!(snapshot.u32(Key::ForcedTemp), Some(2000));
        assert_eq!(
            snapshot.i64(Key::ForcedTempExpires),
            Some(h.clock.now_millis() + 10_000)
        );

        // Exit timer restarted at the adjustment
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(h.popup.previewing(), Some(Period::Bedtime));
    }

    #[tokio::test(start_paused = true)]
    #[serial]
    async fn test_set_boundary_validates_and_canonicalizes() {
        let h = harness(12, 0).await;
        assert!(h.popup.set_boundary(Period::Sunset, "25:00").await.is_err());
        assert!(h.popup.set_boundary(Period::Sunset, "7 PM").await.is_err());

        let unreachable = h.popup.set_boundary(Period::Sunset, "19:30").await.unwrap();
        assert!(unreachable.is_empty());
        assert_eq!(value(&h.store, Key::SunsetStart).await, Some(json!("7:30 PM")));

        let unreachable = h
            .popup
            .set_boundary(Period::Bedtime, "01:00 am")
            .await
            .unwrap();
        assert_eq!(unreachable, vec![Period::Daytime, Period::Sunset]);
    }

    #[tokio::test(start_paused = true)]
    #[serial]
    async fn test_toggle_site() {
        let h = harness(12, 0).await;
        assert!(h.popup.toggle_site("Example.com").await.unwrap());
        assert_eq!(
            value(&h.store, Key::ExcludedHostnames).await,
            Some(json!(["example.com"]))
        );
        assert!(!h.popup.toggle_site("example.com").await.unwrap());
        assert_eq!(
            value(&h.store, Key::ExcludedHostnames).await,
            Some(json!([]))
        );
        assert!(h.popup.toggle_site("  ").await.is_err());
    }

    #[tokio::test(start_paused = true)]
    #[serial]
    async fn test_status_snapshot() {
        let h = harness(19, 0).await;
        h.store.set([(Key::CurrentTemp, json!(4200))]).await.unwrap();

        let status = h.popup.status().await;
        assert_eq!(status.period, Period::Sunset);
        assert_eq!(status.scheduled_temp, 4200);
        assert_eq!(status.current_temp, Some(4200));
        assert_eq!(status.period_started, "1h ago");
        assert_eq!(status.next_period, Some((Period::Bedtime, "in 3h".to_string())));
        assert_eq!(status.next_daytime, "in 11h");
        assert_eq!(status.forced, None);

        h.popup.select_period(Period::Daytime).await;
        let status = h.popup.status().await;
        assert_eq!(status.previewing, Some(Period::Daytime));
        assert_eq!(status.forced.map(|(temp, _)| temp), Some(6500));
    }

    #[tokio::test(start_paused = true)]
    #[serial]
    async fn test_unavailable_store_degrades_to_defaults() {
        let h = harness(12, 0).await;
        h.store.invalidate();
        assert_eq!(h.popup.settings().await, Settings::default());
        assert_eq!(
            h.popup.select_period(Period::Daytime).await,
            Selection::Reapplied {
                period: Period::Daytime,
                temperature: 6500
            }
        );
        h.store.restore();
    }

    #[tokio::test(start_paused = true)]
    #[serial]
    async fn test_selection_racing_the_exit_timer_keeps_new_preview() {
        let h = harness(12, 0).await;
        h.popup.select_period(Period::Bedtime).await;

        // Wake at the same instant as the exit timer and pick another period
        tokio::time::sleep(PopupOptions::default().preview_exit).await;
        h.popup.select_period(Period::Sunset).await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(h.popup.previewing(), Some(Period::Sunset));
        assert_eq!(value(&h.store, Key::ForcedTemp).await, Some(json!(4200)));
        assert!(value(&h.store, Key::ForcedTempExpires).await.is_some());

        // The new preview still ends on its own timer
        h.popup.preview_ended().await;
        assert!(h.store.get(&Key::OVERRIDE).await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    #[serial]
    async fn test_stale_exit_timer_does_nothing() {
        let h = harness(12, 0).await;
        h.popup.select_period(Period::Bedtime).await;
        h.popup.select_period(Period::Sunset).await;

        assert_eq!(h.popup.expire_preview(1).await, None);
        assert_eq!(h.popup.previewing(), Some(Period::Sunset));
        assert_eq!(value(&h.store, Key::ForcedTemp).await, Some(json!(4200)));

        let exited = h.popup.expire_preview(2).await;
        assert!(matches!(exited, Some(Selection::Exited { .. })));
        assert!(h.popup.previewing().is_none());
    }
}
