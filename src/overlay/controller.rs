//! Overlay controller: one per page view.
//!
//! Decides, on every trigger, whether the page should show an overlay, which
//! temperature it should show and how fast to get there:
//!
//! 1. store unreachable: do nothing
//! 2. site excluded or filter disabled: remove the overlay
//! 3. active preview override: apply it with the preview speed
//! 4. no current temperature: nothing to do; instant-apply-once set: consume
//!    it and apply without animation
//! 5. explicit `preview`/`instant` message: apply with that speed
//! 6. otherwise an automatic application with the slow speed, skipped when the
//!    change is tiny and the previous automatic one was recent
//!
//! Triggers are page load, relevant store changes, `updateFilter` messages and
//! a periodic safety tick. Fullscreen changes move the element to the new
//! mount point without touching the applied temperature.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{Instant, MissedTickBehavior};

use super::animation::Animator;
use super::{OverlayId, OverlayStyle, OverlaySurface, kelvin_to_rgb};
use crate::common::constants::*;
use crate::messaging::{Message, UpdateMode};
use crate::store::{Key, Override, StorageChange, Store};
use crate::time::SharedClock;

/// Timing tunables of a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayOptions {
    pub auto_duration: Duration,
    pub preview_duration: Duration,
    /// Kelvin difference below which a recent automatic update is skipped
    pub throttle_delta: u32,
    pub throttle_window: Duration,
    pub safety_tick: Duration,
}

impl Default for OverlayOptions {
    fn default() -> Self {
        Self {
            auto_duration: Duration::from_millis(DEFAULT_AUTO_ANIMATION_MS),
            preview_duration: Duration::from_millis(DEFAULT_PREVIEW_ANIMATION_MS),
            throttle_delta: DEFAULT_THROTTLE_DELTA,
            throttle_window: Duration::from_millis(DEFAULT_THROTTLE_WINDOW_MS),
            safety_tick: Duration::from_secs(DEFAULT_SAFETY_TICK_SECS),
        }
    }
}

/// Why a temperature was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyReason {
    Override,
    InstantFlag,
    Explicit(UpdateMode),
    /// First application on this page, shown without animation
    First,
    Auto,
}

/// Result of one [`OverlayController::update_filter`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOutcome {
    Unavailable,
    Removed,
    NoTemperature,
    /// No document to mount into yet
    NoMountPoint,
    Throttled,
    Applied {
        temperature: u32,
        duration: Duration,
        reason: ApplyReason,
    },
}

/// Page lifecycle events delivered by the hosting context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageEvent {
    FullscreenChanged,
    Unload,
}

pub struct OverlayController {
    store: Store,
    clock: SharedClock,
    surface: Arc<dyn OverlaySurface>,
    options: OverlayOptions,
    style: OverlayStyle,
    animator: Animator,
    overlay: Option<OverlayId>,
    last_applied: Option<u32>,
    last_auto_at: Option<Instant>,
}

impl OverlayController {
    pub fn new(
        store: Store,
        clock: SharedClock,
        surface: Arc<dyn OverlaySurface>,
        options: OverlayOptions,
    ) -> Self {
        Self {
            animator: Animator::new(Arc::clone(&surface)),
            store,
            clock,
            surface,
            options,
            style: OverlayStyle::default(),
            overlay: None,
            last_applied: None,
            last_auto_at: None,
        }
    }

    pub fn hostname(&self) -> String {
        self.surface.hostname()
    }

    /// Temperature most recently applied on this page.
    pub fn last_applied(&self) -> Option<u32> {
        self.last_applied
    }

    pub fn overlay(&self) -> Option<OverlayId> {
        self.overlay
    }

    pub fn is_animating(&self) -> bool {
        self.animator.is_animating()
    }

    /// Recompute and render. `mode` is `Some` when triggered by a message.
    pub async fn update_filter(&mut self, mode: Option<UpdateMode>) -> FilterOutcome {
        let Ok(snapshot) = self.store.get(&Key::OVERLAY_TRIGGERS).await else {
            return FilterOutcome::Unavailable;
        };

        let enabled = snapshot.bool(Key::Enabled).unwrap_or(DEFAULT_ENABLED);
        let hostname = self.surface.hostname();
        let excluded = snapshot
            .strings(Key::ExcludedHostnames)
            .iter()
            .any(|host| host.eq_ignore_ascii_case(&hostname));
        if !enabled || excluded {
            self.remove();
            return FilterOutcome::Removed;
        }

        if let Some(forced) = Override::active(&snapshot, self.clock.now_millis()) {
            return self.apply(
                forced.temperature,
                self.options.preview_duration,
                ApplyReason::Override,
            );
        }

        let Some(temperature) = snapshot.u32(Key::CurrentTemp) else {
            return FilterOutcome::NoTemperature;
        };

        match self.store.take_flag(Key::InstantApplyOnce).await {
            Ok(true) => {
                return self.apply(temperature, Duration::ZERO, ApplyReason::InstantFlag);
            }
            Ok(false) => {}
            Err(_) => return FilterOutcome::Unavailable,
        }

        match mode {
            Some(UpdateMode::Preview) => self.apply(
                temperature,
                self.options.preview_duration,
                ApplyReason::Explicit(UpdateMode::Preview),
            ),
            Some(UpdateMode::Instant) => self.apply(
                temperature,
                Duration::ZERO,
                ApplyReason::Explicit(UpdateMode::Instant),
            ),
            Some(UpdateMode::Auto) | None => self.apply_auto(temperature),
        }
    }

    fn apply_auto(&mut self, temperature: u32) -> FilterOutcome {
        let now = Instant::now();
        let Some(previous) = self.last_applied else {
            let outcome = self.apply(temperature, Duration::ZERO, ApplyReason::First);
            if matches!(outcome, FilterOutcome::Applied { .. }) {
                self.last_auto_at = Some(now);
            }
            return outcome;
        };

        let small_change = previous.abs_diff(temperature) < self.options.throttle_delta;
        let recent = self
            .last_auto_at
            .is_some_and(|at| now.duration_since(at) < self.options.throttle_window);
        if small_change && recent {
            return FilterOutcome::Throttled;
        }

        let outcome = self.apply(temperature, self.options.auto_duration, ApplyReason::Auto);
        if matches!(outcome, FilterOutcome::Applied { .. }) {
            self.last_auto_at = Some(now);
        }
        outcome
    }

    fn apply(&mut self, temperature: u32, duration: Duration, reason: ApplyReason) -> FilterOutcome {
        let Some(id) = self.ensure_overlay() else {
            return FilterOutcome::NoMountPoint;
        };
        self.animator
            .animate_to(id, kelvin_to_rgb(temperature), duration);
        self.last_applied = Some(temperature);
        FilterOutcome::Applied {
            temperature,
            duration,
            reason,
        }
    }

    /// The attached overlay, created under the current mount point if needed.
    fn ensure_overlay(&mut self) -> Option<OverlayId> {
        if let Some(id) = self.overlay
            && self.surface.is_attached(id)
        {
            return Some(id);
        }

        // A detached element loses whatever it showed
        self.animator.reset();
        self.overlay = None;

        let mount = self.surface.mount_point()?;
        match self.surface.create_overlay(&mount, &self.style) {
            Ok(id) => {
                self.overlay = Some(id);
                Some(id)
            }
            Err(e) => {
                log_debug!("{}: overlay not created: {e}", self.surface.hostname());
                None
            }
        }
    }

    fn remove(&mut self) {
        self.animator.reset();
        if let Some(id) = self.overlay.take() {
            self.surface.remove_overlay(id);
        }
        self.last_applied = None;
    }

    /// Re-parent the overlay after a fullscreen transition.
    ///
    /// The old element is destroyed and a new one created under the new
    /// mount point showing the last applied temperature with no animation.
    pub fn handle_fullscreen_change(&mut self) {
        self.animator.reset();
        if let Some(id) = self.overlay.take() {
            self.surface.remove_overlay(id);
        }

        let Some(temperature) = self.last_applied else {
            return;
        };
        if let Some(id) = self.ensure_overlay() {
            self.animator.paint_now(id, kelvin_to_rgb(temperature));
        }
    }

    /// Tear down the overlay when the page goes away.
    pub fn detach(&mut self) {
        self.animator.reset();
        if let Some(id) = self.overlay.take() {
            self.surface.remove_overlay(id);
        }
    }

    /// Event loop of one page context.
    ///
    /// Runs the page-load update, then reacts to store changes, messages,
    /// page events and the safety tick until the page unloads or its inbox
    /// closes.
    pub async fn run(
        mut self,
        mut changes: broadcast::Receiver<StorageChange>,
        mut inbox: mpsc::UnboundedReceiver<Message>,
        mut events: mpsc::UnboundedReceiver<PageEvent>,
    ) {
        let hostname = self.hostname();
        let outcome = self.update_filter(None).await;
        log_debug!("{hostname}: page load -> {outcome:?}");

        let period = self.options.safety_tick;
        let mut safety = tokio::time::interval_at(Instant::now() + period, period);
        safety.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                change = changes.recv() => match change {
                    Ok(change) => {
                        if change.touches(&Key::OVERLAY_TRIGGERS) {
                            let outcome = self.update_filter(None).await;
                            log_debug!("{hostname}: store change -> {outcome:?}");
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        log_debug!("{hostname}: missed {missed} store changes, refreshing");
                        self.update_filter(None).await;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                message = inbox.recv() => match message {
                    Some(Message::UpdateFilter { mode }) => {
                        let outcome = self.update_filter(Some(mode)).await;
                        log_debug!("{hostname}: updateFilter({mode}) -> {outcome:?}");
                    }
                    None => break,
                },
                event = events.recv() => match event {
                    Some(PageEvent::FullscreenChanged) => self.handle_fullscreen_change(),
                    Some(PageEvent::Unload) | None => break,
                },
                _ = safety.tick() => {
                    self.update_filter(None).await;
                }
            }
        }

        self.detach();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::testing::RecordingSurface;
    use crate::overlay::{MountPoint, Rgb};
    use crate::store::StorageArea;
    use crate::time::{Clock, ManualClock};
    use serde_json::json;

    struct Page {
        store: Store,
        clock: Arc<ManualClock>,
        surface: Arc<RecordingSurface>,
        controller: OverlayController,
    }

    async fn page(host: &str) -> Page {
        let store = Store::memory(StorageArea::Local);
        store
            .set([(Key::Enabled, json!(true)), (Key::CurrentTemp, json!(4200))])
            .await
            .unwrap();
        let clock = ManualClock::ticking_at(19, 0);
        let surface = RecordingSurface::new(host);
        let controller = OverlayController::new(
            store.clone(),
            clock.clone(),
            surface.clone(),
            OverlayOptions::default(),
        );
        Page {
            store,
            clock,
            surface,
            controller,
        }
    }

    fn applied(outcome: FilterOutcome) -> (u32, Duration, ApplyReason) {
        match outcome {
            FilterOutcome::Applied {
                temperature,
                duration,
                reason,
            } => (temperature, duration, reason),
            other => panic!("expected an application, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_application_is_instant() {
        let mut page = page("example.com").await;
        let (temperature, duration, reason) = applied(page.controller.update_filter(None).await);
        assert_eq!(temperature, 4200);
        assert_eq!(duration, Duration::ZERO);
        assert_eq!(reason, ApplyReason::First);
        assert_eq!(page.surface.current_color(), Some(kelvin_to_rgb(4200)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_throttle_skips_small_recent_changes() {
        let mut page = page("example.com").await;
        page.controller.update_filter(None).await;

        page.store.set([(Key::CurrentTemp, json!(4210))]).await.unwrap();
        assert_eq!(
            page.controller.update_filter(None).await,
            FilterOutcome::Throttled
        );
        assert_eq!(page.controller.last_applied(), Some(4200));

        // A large change inside the window still applies
        page.store.set([(Key::CurrentTemp, json!(3000))]).await.unwrap();
        let (_, duration, reason) = applied(page.controller.update_filter(None).await);
        assert_eq!(reason, ApplyReason::Auto);
        assert_eq!(duration, Duration::from_millis(DEFAULT_AUTO_ANIMATION_MS));
    }

    #[tokio::test(start_paused = true)]
    async fn test_small_change_applies_after_window() {
        let mut page = page("example.com").await;
        page.controller.update_filter(None).await;

        tokio::time::advance(Duration::from_millis(DEFAULT_THROTTLE_WINDOW_MS + 1)).await;
        page.store.set([(Key::CurrentTemp, json!(4210))]).await.unwrap();
        let (temperature, _, reason) = applied(page.controller.update_filter(None).await);
        assert_eq!((temperature, reason), (4210, ApplyReason::Auto));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_removes_overlay_and_resets() {
        let mut page = page("example.com").await;
        page.controller.update_filter(None).await;
        assert!(page.surface.current().is_some());

        page.store.set([(Key::Enabled, json!(false))]).await.unwrap();
        assert_eq!(page.controller.update_filter(None).await, FilterOutcome::Removed);
        assert!(page.surface.current().is_none());
        assert_eq!(page.controller.last_applied(), None);

        // Re-enabling counts as a first application again
        page.store.set([(Key::Enabled, json!(true))]).await.unwrap();
        let (_, _, reason) = applied(page.controller.update_filter(None).await);
        assert_eq!(reason, ApplyReason::First);
    }

    #[tokio::test(start_paused = true)]
    async fn test_excluded_host_never_gets_an_overlay() {
        let mut page = page("Video.Example").await;
        page.store
            .set([(Key::ExcludedHostnames, json!(["video.example"]))])
            .await
            .unwrap();

        assert_eq!(page.controller.update_filter(None).await, FilterOutcome::Removed);
        assert_eq!(
            page.controller.update_filter(Some(UpdateMode::Instant)).await,
            FilterOutcome::Removed
        );
        assert_eq!(page.surface.created_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_active_override_wins_with_preview_speed() {
        let mut page = page("example.com").await;
        page.controller.update_filter(None).await;

        let expires = page.clock.now_millis() + 10_000;
        page.store
            .set(Override::new(2700, expires).entries())
            .await
            .unwrap();
        let (temperature, duration, reason) = applied(page.controller.update_filter(None).await);
        assert_eq!(temperature, 2700);
        assert_eq!(duration, Duration::from_millis(DEFAULT_PREVIEW_ANIMATION_MS));
        assert_eq!(reason, ApplyReason::Override);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_override_falls_back_to_current() {
        let mut page = page("example.com").await;
        let expired = page.clock.now_millis() - 1;
        page.store
            .set(Override::new(2700, expired).entries())
            .await
            .unwrap();
        let (temperature, _, _) = applied(page.controller.update_filter(None).await);
        assert_eq!(temperature, 4200);
    }

    #[tokio::test(start_paused = true)]
    async fn test_instant_flag_is_consumed_once() {
        let mut page = page("example.com").await;
        page.controller.update_filter(None).await;

        page.store
            .set([
                (Key::CurrentTemp, json!(3000)),
                (Key::InstantApplyOnce, json!(true)),
            ])
            .await
            .unwrap();
        let (_, duration, reason) = applied(page.controller.update_filter(None).await);
        assert_eq!((duration, reason), (Duration::ZERO, ApplyReason::InstantFlag));
        let flag = page.store.get(&[Key::InstantApplyOnce]).await.unwrap();
        assert_eq!(flag.bool(Key::InstantApplyOnce), Some(false));

        page.store.set([(Key::CurrentTemp, json!(2000))]).await.unwrap();
        let (_, _, reason) = applied(page.controller.update_filter(None).await);
        assert_eq!(reason, ApplyReason::Auto);
    }

    #[tokio::test(start_paused = true)]
    async fn test_explicit_modes() {
        let mut page = page("example.com").await;
        page.controller.update_filter(None).await;

        let (_, duration, _) =
            applied(page.controller.update_filter(Some(UpdateMode::Preview)).await);
        assert_eq!(duration, Duration::from_millis(DEFAULT_PREVIEW_ANIMATION_MS));

        let (_, duration, _) =
            applied(page.controller.update_filter(Some(UpdateMode::Instant)).await);
        assert_eq!(duration, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_temperature_or_store() {
        let mut page = page("example.com").await;
        page.store.remove(&[Key::CurrentTemp]).await.unwrap();
        assert_eq!(
            page.controller.update_filter(None).await,
            FilterOutcome::NoTemperature
        );

        page.store.invalidate();
        assert_eq!(
            page.controller.update_filter(None).await,
            FilterOutcome::Unavailable
        );
        assert_eq!(page.surface.created_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_document_skips_until_next_trigger() {
        let mut page = page("example.com").await;
        page.surface.set_mount_point(None);
        assert_eq!(
            page.controller.update_filter(None).await,
            FilterOutcome::NoMountPoint
        );
        assert_eq!(page.controller.last_applied(), None);

        page.surface.set_mount_point(Some(MountPoint::Body));
        let (_, _, reason) = applied(page.controller.update_filter(None).await);
        assert_eq!(reason, ApplyReason::First);
    }

    #[tokio::test(start_paused = true)]
    async fn test_detached_overlay_is_recreated() {
        let mut page = page("example.com").await;
        page.controller.update_filter(None).await;
        let first = page.surface.current().unwrap();

        page.surface.detach(first);
        page.controller.update_filter(Some(UpdateMode::Instant)).await;
        let second = page.surface.current().unwrap();
        assert_ne!(first, second);
        assert_eq!(page.surface.color_of(second), Some(kelvin_to_rgb(4200)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fullscreen_reparents_without_animation() {
        let mut page = page("video.example").await;
        page.controller.update_filter(None).await;
        let before = page.surface.current().unwrap();

        let player = MountPoint::Fullscreen("player".to_string());
        page.surface.set_mount_point(Some(player.clone()));
        page.controller.handle_fullscreen_change();

        let after = page.surface.current().unwrap();
        assert_ne!(before, after);
        assert_eq!(page.surface.mount_of(after), Some(player));
        assert_eq!(page.surface.color_of(after), Some(kelvin_to_rgb(4200)));
        assert_eq!(page.controller.last_applied(), Some(4200));
        assert!(!page.controller.is_animating());
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_animation_reaches_target() {
        let mut page = page("example.com").await;
        page.controller.update_filter(None).await;

        page.store.set([(Key::CurrentTemp, json!(2700))]).await.unwrap();
        page.controller.update_filter(None).await;
        assert!(page.controller.is_animating());

        tokio::time::sleep(Duration::from_millis(DEFAULT_AUTO_ANIMATION_MS + 100)).await;
        assert_eq!(page.surface.current_color(), Some(kelvin_to_rgb(2700)));
        assert_ne!(kelvin_to_rgb(2700), Rgb::WHITE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_loop_reacts_to_store_and_messages() {
        let page = page("example.com").await;
        let store = page.store.clone();
        let surface = page.surface.clone();

        let changes = store.subscribe();
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(page.controller.run(changes, inbox_rx, events_rx));

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(surface.current_color(), Some(kelvin_to_rgb(4200)));

        store.set([(Key::CurrentTemp, json!(3000))]).await.unwrap();
        tokio::time::sleep(Duration::from_millis(DEFAULT_AUTO_ANIMATION_MS + 100)).await;
        assert_eq!(surface.current_color(), Some(kelvin_to_rgb(3000)));

        store.set([(Key::CurrentTemp, json!(2000))]).await.unwrap();
        inbox_tx
            .send(Message::update_filter(UpdateMode::Instant))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(DEFAULT_AUTO_ANIMATION_MS + 100)).await;
        assert_eq!(surface.current_color(), Some(kelvin_to_rgb(2000)));

        events_tx.send(PageEvent::Unload).unwrap();
        task.await.unwrap();
        assert!(surface.current().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_loop_follows_session_area_changes() {
        let store = Store::memory(StorageArea::Session);
        store
            .set([(Key::Enabled, json!(true)), (Key::CurrentTemp, json!(4200))])
            .await
            .unwrap();
        let surface = RecordingSurface::new("example.com");
        let controller = OverlayController::new(
            store.clone(),
            ManualClock::ticking_at(19, 0),
            surface.clone(),
            OverlayOptions::default(),
        );

        let (_inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(controller.run(store.subscribe(), inbox_rx, events_rx));
        tokio::time::sleep(Duration::from_millis(10)).await;

        store.set([(Key::Enabled, json!(false))]).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(surface.current().is_none());

        events_tx.send(PageEvent::Unload).unwrap();
        task.await.unwrap();
    }
}
