//! Clock abstraction for real and test-controlled time.
//!
//! Period classification depends on the local wall time of whichever device
//! evaluates it, so every component takes an injected [`Clock`] instead of
//! calling `Local::now()` directly. Tests drive a [`ManualClock`].

use chrono::{DateTime, Duration as ChronoDuration, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use std::sync::Arc;

/// Source of the current local time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;

    /// Current time as epoch milliseconds, the unit used in the store.
    fn now_millis(&self) -> i64 {
        self.now().timestamp_millis()
    }
}

pub type SharedClock = Arc<dyn Clock>;

/// Real system time.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

impl SystemClock {
    pub fn shared() -> SharedClock {
        Arc::new(SystemClock)
    }
}

/// Resolve a local date and wall time to an instant.
///
/// Ambiguous times (DST fall-back) take the earlier instant. Times inside a
/// DST gap are shifted forward by the gap's usual hour.
pub fn local_instant(date: NaiveDate, time: NaiveTime) -> DateTime<Local> {
    let naive = date.and_time(time);
    if let Some(instant) = Local.from_local_datetime(&naive).earliest() {
        return instant;
    }
    let shifted = naive + ChronoDuration::hours(1);
    Local
        .from_local_datetime(&shifted)
        .earliest()
        .unwrap_or_else(|| Utc.from_utc_datetime(&naive).with_timezone(&Local))
}

/// Clock whose time only moves when told to.
///
/// A [`ManualClock::ticking`] clock additionally follows tokio's clock, so
/// tests running with paused time see wall time advance together with timers.
#[cfg(any(test, feature = "testing-support"))]
pub struct ManualClock {
    state: std::sync::Mutex<ManualState>,
}

#[cfg(any(test, feature = "testing-support"))]
struct ManualState {
    base: DateTime<Local>,
    anchor: Option<tokio::time::Instant>,
}

#[cfg(any(test, feature = "testing-support"))]
impl ManualClock {
    pub fn new(start: DateTime<Local>) -> Arc<Self> {
        Arc::new(Self {
            state: std::sync::Mutex::new(ManualState {
                base: start,
                anchor: None,
            }),
        })
    }

    /// Start at `start` and move forward with `tokio::time::Instant`.
    pub fn ticking(start: DateTime<Local>) -> Arc<Self> {
        Arc::new(Self {
            state: std::sync::Mutex::new(ManualState {
                base: start,
                anchor: Some(tokio::time::Instant::now()),
            }),
        })
    }

    /// Start at `hour:minute` on a fixed summer date (no DST edges nearby).
    pub fn at(hour: u32, minute: u32) -> Arc<Self> {
        Self::new(test_instant(hour, minute))
    }

    /// Like [`ManualClock::at`], but ticking with tokio time.
    pub fn ticking_at(hour: u32, minute: u32) -> Arc<Self> {
        Self::ticking(test_instant(hour, minute))
    }

    pub fn set(&self, time: DateTime<Local>) {
        let mut state = self.state.lock().expect("clock lock");
        state.base = time;
        if state.anchor.is_some() {
            state.anchor = Some(tokio::time::Instant::now());
        }
    }

    pub fn advance(&self, by: std::time::Duration) {
        let mut state = self.state.lock().expect("clock lock");
        state.base += ChronoDuration::milliseconds(by.as_millis() as i64);
    }
}

#[cfg(any(test, feature = "testing-support"))]
fn test_instant(hour: u32, minute: u32) -> DateTime<Local> {
    let date = NaiveDate::from_ymd_opt(2024, 6, 12).expect("valid date");
    let time = NaiveTime::from_hms_opt(hour, minute, 0).expect("valid time");
    local_instant(date, time)
}

#[cfg(any(test, feature = "testing-support"))]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Local> {
        let state = self.state.lock().expect("clock lock");
        match state.anchor {
            Some(anchor) => {
                let elapsed = tokio::time::Instant::now().saturating_duration_since(anchor);
                state.base + ChronoDuration::milliseconds(elapsed.as_millis() as i64)
            }
            None => state.base,
        }
    }
}
