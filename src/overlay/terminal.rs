//! Overlay surface that renders to the terminal log.
//!
//! Used by `nightglow run --host NAME` to watch what a page would show. Only
//! settled frames are logged; intermediate animation frames are counted.

use anyhow::Result;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use super::{Frame, MountPoint, OverlayId, OverlayStyle, OverlaySurface};

#[derive(Default)]
struct Elements {
    next_id: u64,
    live: BTreeMap<OverlayId, usize>,
}

pub struct TerminalSurface {
    hostname: String,
    elements: Mutex<Elements>,
}

impl TerminalSurface {
    pub fn new(hostname: &str) -> Arc<Self> {
        Arc::new(Self {
            hostname: hostname.to_string(),
            elements: Mutex::new(Elements::default()),
        })
    }
}

impl OverlaySurface for TerminalSurface {
    fn hostname(&self) -> String {
        self.hostname.clone()
    }

    fn mount_point(&self) -> Option<MountPoint> {
        Some(MountPoint::Body)
    }

    fn create_overlay(&self, mount: &MountPoint, style: &OverlayStyle) -> Result<OverlayId> {
        let mut elements = self
            .elements
            .lock()
            .map_err(|_| anyhow::anyhow!("terminal surface state poisoned"))?;
        elements.next_id += 1;
        let id = OverlayId(elements.next_id);
        elements.live.insert(id, 0);

        log_decorated!("{}: created {id} on {mount}", self.hostname);
        log_debug!(
            "{}: z-index {}, bleed {}%, pointer-transparent {}",
            self.hostname,
            style.z_index,
            style.bleed_percent,
            style.pointer_transparent
        );
        Ok(id)
    }

    fn is_attached(&self, id: OverlayId) -> bool {
        self.elements
            .lock()
            .map(|elements| elements.live.contains_key(&id))
            .unwrap_or(false)
    }

    fn paint(&self, id: OverlayId, frame: Frame) {
        let Ok(mut elements) = self.elements.lock() else {
            return;
        };
        let Some(frames) = elements.live.get_mut(&id) else {
            return;
        };
        *frames += 1;
        if frame.is_final() {
            let count = std::mem::take(frames);
            log_decorated!(
                "{}: tint {} {} ({count} frames)",
                self.hostname,
                frame.color,
                frame.color.css()
            );
        }
    }

    fn remove_overlay(&self, id: OverlayId) {
        let removed = self
            .elements
            .lock()
            .map(|mut elements| elements.live.remove(&id).is_some())
            .unwrap_or(false);
        if removed {
            log_decorated!("{}: removed {id}", self.hostname);
        }
    }
}
