//! Per-page color overlay: rendering surface abstraction, animation and the
//! controller deciding what to paint and how fast.
//!
//! A page context owns exactly one [`controller::OverlayController`]. The
//! controller never touches a document directly; it drives an
//! [`OverlaySurface`], which is whatever can host a full-viewport element for
//! that page (a DOM bridge, the terminal renderer in [`terminal`], or the
//! recording surface used by tests).

pub mod animation;
pub mod color;
pub mod controller;
pub mod terminal;

#[cfg(any(test, feature = "testing-support"))]
pub mod testing;

use anyhow::Result;
use std::fmt;

use crate::common::constants::{OVERLAY_BLEED_PERCENT, OVERLAY_Z_INDEX};
pub use color::{Rgb, kelvin_to_rgb};
pub use controller::{ApplyReason, FilterOutcome, OverlayController, OverlayOptions, PageEvent};

/// Handle of an overlay element created by a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OverlayId(pub u64);

impl fmt::Display for OverlayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "overlay-{}", self.0)
    }
}

/// Where the overlay element is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountPoint {
    /// The document body
    Body,
    /// The element currently shown fullscreen, identified by the surface
    Fullscreen(String),
}

impl fmt::Display for MountPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MountPoint::Body => write!(f, "body"),
            MountPoint::Fullscreen(element) => write!(f, "fullscreen element {element}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendMode {
    Multiply,
}

/// Compositing properties of the overlay element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayStyle {
    pub blend: BlendMode,
    pub z_index: i32,
    /// Input passes through to the page
    pub pointer_transparent: bool,
    /// Extra size on every side, as a percentage of the viewport
    pub bleed_percent: u32,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            blend: BlendMode::Multiply,
            z_index: OVERLAY_Z_INDEX,
            pointer_transparent: true,
            bleed_percent: OVERLAY_BLEED_PERCENT,
        }
    }
}

/// One painted animation frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub color: Rgb,
    /// Linear time progress (`elapsed / duration`) in `[0, 1]`; `1.0` is the
    /// final frame. Easing applies to the color, not to this value.
    pub progress: f32,
}

impl Frame {
    pub fn settled(color: Rgb) -> Self {
        Self {
            color,
            progress: 1.0,
        }
    }

    pub fn is_final(&self) -> bool {
        self.progress >= 1.0
    }
}

/// A page's rendering capabilities.
///
/// Methods are synchronous, the way DOM manipulation is; implementations
/// must be cheap enough to call once per animation frame.
pub trait OverlaySurface: Send + Sync {
    /// Hostname of the page, matched against the exclusion list.
    fn hostname(&self) -> String;

    /// Current attachment point, or `None` while the page has no document.
    fn mount_point(&self) -> Option<MountPoint>;

    fn create_overlay(&self, mount: &MountPoint, style: &OverlayStyle) -> Result<OverlayId>;

    /// Whether `id` is still in the document (pages may remove it).
    fn is_attached(&self, id: OverlayId) -> bool;

    fn paint(&self, id: OverlayId, frame: Frame);

    fn remove_overlay(&self, id: OverlayId);
}
