//! Frame-by-frame color transitions for one overlay element.
//!
//! Each transition interpolates per channel from the color currently shown to
//! the target along an ease-in-out cubic curve, painting roughly every
//! [`FRAME_INTERVAL_MS`]. The last frame is always the exact target color.
//! Starting a new transition aborts the one in flight and continues from
//! whatever color it had reached, so retargeting never jumps.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::{Frame, OverlayId, OverlaySurface, Rgb};
use crate::common::constants::FRAME_INTERVAL_MS;

/// `t < 0.5 ? 4t³ : 1 - (-2t + 2)³ / 2`, with `t` clamped to `[0, 1]`.
pub fn ease_in_out_cubic(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
    }
}

/// A single color transition, independent of how it is driven.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    pub from: Rgb,
    pub to: Rgb,
    pub duration: Duration,
}

impl Transition {
    pub fn new(from: Rgb, to: Rgb, duration: Duration) -> Self {
        Self { from, to, duration }
    }

    /// Frame to show `elapsed` into the transition.
    pub fn frame_at(&self, elapsed: Duration) -> Frame {
        if self.duration.is_zero() || elapsed >= self.duration {
            return Frame::settled(self.to);
        }
        let linear = elapsed.as_secs_f64() / self.duration.as_secs_f64();
        let eased = ease_in_out_cubic(linear);
        Frame {
            color: self.from.lerp(self.to, eased),
            progress: linear as f32,
        }
    }
}

/// Drives transitions on one overlay element.
///
/// Owns the single in-flight animation task; the color last painted is
/// shared with that task so a replacement transition can start from it.
pub struct Animator {
    surface: Arc<dyn OverlaySurface>,
    displayed: Arc<Mutex<Option<Rgb>>>,
    task: Option<JoinHandle<()>>,
}

impl Animator {
    pub fn new(surface: Arc<dyn OverlaySurface>) -> Self {
        Self {
            surface,
            displayed: Arc::new(Mutex::new(None)),
            task: None,
        }
    }

    /// Color currently on screen, if anything was painted.
    pub fn displayed(&self) -> Option<Rgb> {
        self.displayed.lock().ok().and_then(|color| *color)
    }

    pub fn is_animating(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Abort the in-flight transition, leaving its last frame on screen.
    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    /// Cancel and forget what was shown, used when the element goes away.
    pub fn reset(&mut self) {
        self.cancel();
        if let Ok(mut displayed) = self.displayed.lock() {
            *displayed = None;
        }
    }

    /// Paint `target` immediately as a final frame.
    pub fn paint_now(&mut self, id: OverlayId, target: Rgb) {
        self.cancel();
        self.surface.paint(id, Frame::settled(target));
        if let Ok(mut displayed) = self.displayed.lock() {
            *displayed = Some(target);
        }
    }

    /// Transition element `id` to `target` over `duration`.
    ///
    /// With nothing shown yet, or a zero duration, the target is painted at once.
    pub fn animate_to(&mut self, id: OverlayId, target: Rgb, duration: Duration) {
        self.cancel();

        let from = match self.displayed() {
            Some(from) if !duration.is_zero() => from,
            _ => {
                self.paint_now(id, target);
                return;
            }
        };

        let transition = Transition::new(from, target, duration);
        let surface = Arc::clone(&self.surface);
        let displayed = Arc::clone(&self.displayed);

        self.task = Some(tokio::spawn(async move {
            let started = Instant::now();
            let mut frames = tokio::time::interval(Duration::from_millis(FRAME_INTERVAL_MS));
            frames.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                frames.tick().await;
                let frame = transition.frame_at(started.elapsed());
                surface.paint(id, frame);
                if let Ok(mut shown) = displayed.lock() {
                    *shown = Some(frame.color);
                }
                if frame.is_final() {
                    break;
                }
            }
        }));
    }
}

impl Drop for Animator {
    fn drop(&mut self) {
        self.cancel();
    }
}
