//! Background temperature resolver.
//!
//! The long-lived context that owns `current_temp`. It resolves once at
//! startup, again at every minute rollover, and whenever a settings or
//! override key changes. Each resolution:
//!
//! 1. an active override wins: its temperature is written and a one-shot
//!    re-resolution is scheduled for its expiry (replacing any pending one)
//! 2. an expired or half-written override is cleared and the pending expiry
//!    timer cancelled
//! 3. with the filter disabled `current_temp` is left as it is
//! 4. otherwise the scheduled period's temperature is written
//!
//! Resolving is idempotent and may overlap with itself; the store is
//! last-write-wins so the latest resolution's write sticks.

use chrono::{DateTime, Local, Timelike};
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::common::constants::RESOLVER_TICK_SECS;
use crate::core::period::Period;
use crate::store::{Key, Override, OverrideState, Settings, Store, TemperatureRange};
use crate::time::SharedClock;

/// What one resolution did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// A preview override is active and was written through
    Forced { temperature: u32 },
    Scheduled { period: Period, temperature: u32 },
    /// Filter disabled; `current_temp` untouched
    Disabled,
    /// Storage failed; nothing written
    Unavailable,
}

pub struct TemperatureResolver {
    store: Store,
    clock: SharedClock,
    defaults: Settings,
    range: TemperatureRange,
    expiry: Mutex<Option<JoinHandle<()>>>,
    last_period: Mutex<Option<Period>>,
}

impl TemperatureResolver {
    pub fn new(
        store: Store,
        clock: SharedClock,
        defaults: Settings,
        range: TemperatureRange,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            clock,
            defaults,
            range,
            expiry: Mutex::new(None),
            last_period: Mutex::new(None),
        })
    }

    /// Compute and write the authoritative temperature.
    pub async fn resolve(self: &Arc<Self>) -> Resolution {
        let Ok(snapshot) = self.store.get(&Key::RESOLVER_TRIGGERS).await else {
            log_debug!("Resolver: store unavailable, skipping");
            return Resolution::Unavailable;
        };
        let now_millis = self.clock.now_millis();

        match Override::classify(&snapshot, now_millis) {
            OverrideState::Active(forced) => {
                if self.write_current(forced.temperature).await.is_err() {
                    return Resolution::Unavailable;
                }
                self.schedule_expiry(forced.expires_at - now_millis);
                return Resolution::Forced {
                    temperature: forced.temperature,
                };
            }
            OverrideState::Stale => {
                self.cancel_expiry();
                if self.store.remove(&Key::OVERRIDE).await.is_err() {
                    return Resolution::Unavailable;
                }
                log_debug!("Resolver: cleared expired override");
            }
            OverrideState::Absent => self.cancel_expiry(),
        }

        let settings = Settings::from_snapshot(&snapshot, &self.defaults, self.range);
        if !settings.enabled {
            return Resolution::Disabled;
        }

        let (period, temperature) = settings.scheduled(self.clock.now());
        if self.write_current(temperature).await.is_err() {
            return Resolution::Unavailable;
        }
        self.note_period(period, temperature);

        Resolution::Scheduled {
            period,
            temperature,
        }
    }

    async fn write_current(&self, temperature: u32) -> Result<(), crate::store::StoreError> {
        self.store
            .set([(Key::CurrentTemp, json!(temperature))])
            .await
    }

    fn note_period(&self, period: Period, temperature: u32) {
        let Ok(mut last) = self.last_period.lock() else {
            return;
        };
        if *last != Some(period) {
            log_block_start!(
                "{} Entering {} period ({temperature}K)",
                period.symbol(),
                period.display_name()
            );
            *last = Some(period);
        }
    }

    /// Replace the pending expiry re-resolution with one `delay_ms` from now.
    fn schedule_expiry(self: &Arc<Self>, delay_ms: i64) {
        let delay = Duration::from_millis(delay_ms.max(0) as u64);
        let resolver = Arc::clone(self);
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Resolve in a fresh task so the next resolution can replace
            // this timer without aborting itself
            tokio::spawn(async move {
                resolver.resolve().await;
            });
        });

        if let Ok(mut slot) = self.expiry.lock() {
            if let Some(previous) = slot.replace(timer) {
                previous.abort();
            }
        } else {
            timer.abort();
        }
    }

    fn cancel_expiry(&self) {
        if let Ok(mut slot) = self.expiry.lock()
            && let Some(timer) = slot.take()
        {
            timer.abort();
        }
    }

    /// Whether an expiry re-resolution is pending.
    pub fn expiry_pending(&self) -> bool {
        self.expiry
            .lock()
            .map(|slot| slot.as_ref().is_some_and(|timer| !timer.is_finished()))
            .unwrap_or(false)
    }

    /// Start the background context: an immediate resolution, the
    /// minute-aligned tick and the store-change listener.
    pub fn spawn(self: &Arc<Self>) -> ResolverHandle {
        let changes = self.store.subscribe();

        let resolver = Arc::clone(self);
        let ticker = tokio::spawn(async move {
            let resolution = resolver.resolve().await;
            log_debug!("Resolver: startup -> {resolution:?}");

            let first = Instant::now() + until_next_minute(resolver.clock.now());
            let mut minutes =
                tokio::time::interval_at(first, Duration::from_secs(RESOLVER_TICK_SECS));
            minutes.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                minutes.tick().await;
                let resolution = resolver.resolve().await;
                log_debug!("Resolver: minute tick -> {resolution:?}");
            }
        });

        let resolver = Arc::clone(self);
        let listener = tokio::spawn(async move { resolver.listen(changes).await });

        ResolverHandle {
            resolver: Arc::clone(self),
            tasks: vec![ticker, listener],
        }
    }

    async fn listen(self: Arc<Self>, mut changes: broadcast::Receiver<crate::store::StorageChange>) {
        loop {
            match changes.recv().await {
                Ok(change) if change.touches(&Key::RESOLVER_TRIGGERS) => {
                    let resolution = self.resolve().await;
                    log_debug!("Resolver: store change -> {resolution:?}");
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(_)) => {
                    self.resolve().await;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}

/// Time left until the next wall-clock minute rollover.
pub fn until_next_minute(now: DateTime<Local>) -> Duration {
    let into_minute = u64::from(now.second()) * 1000 + u64::from(now.timestamp_subsec_millis() % 1000);
    Duration::from_millis(60_000 - into_minute.min(59_999))
}

/// Running resolver tasks; stopped explicitly or when dropped.
pub struct ResolverHandle {
    resolver: Arc<TemperatureResolver>,
    tasks: Vec<JoinHandle<()>>,
}

impl ResolverHandle {
    pub fn resolver(&self) -> &Arc<TemperatureResolver> {
        &self.resolver
    }

    pub fn stop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.resolver.cancel_expiry();
    }
}

impl Drop for ResolverHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
