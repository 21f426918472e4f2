//! In-memory overlay surface that records every call, for tests.

use anyhow::{Result, bail};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use super::{Frame, MountPoint, OverlayId, OverlayStyle, OverlaySurface, Rgb};

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceEvent {
    Created { id: OverlayId, mount: MountPoint },
    Painted { id: OverlayId, frame: Frame },
    Removed { id: OverlayId },
}

#[derive(Debug, Clone)]
struct Element {
    mount: MountPoint,
    attached: bool,
    color: Option<Rgb>,
    frames: usize,
}

struct State {
    mount: Option<MountPoint>,
    next_id: u64,
    elements: BTreeMap<OverlayId, Element>,
    events: Vec<SurfaceEvent>,
}

pub struct RecordingSurface {
    hostname: String,
    state: Mutex<State>,
}

impl RecordingSurface {
    pub fn new(hostname: &str) -> Arc<Self> {
        Arc::new(Self {
            hostname: hostname.to_string(),
            state: Mutex::new(State {
                mount: Some(MountPoint::Body),
                next_id: 1,
                elements: BTreeMap::new(),
                events: Vec::new(),
            }),
        })
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("surface lock")
    }

    /// Change where new overlays would be mounted (`None`: no document).
    pub fn set_mount_point(&self, mount: Option<MountPoint>) {
        self.state().mount = mount;
    }

    /// Simulate the page dropping the element from its document.
    pub fn detach(&self, id: OverlayId) {
        if let Some(element) = self.state().elements.get_mut(&id) {
            element.attached = false;
        }
    }

    /// Elements currently in the document.
    pub fn attached(&self) -> Vec<OverlayId> {
        self.state()
            .elements
            .iter()
            .filter(|(_, element)| element.attached)
            .map(|(id, _)| *id)
            .collect()
    }

    /// The single attached overlay, if exactly one exists.
    pub fn current(&self) -> Option<OverlayId> {
        match self.attached().as_slice() {
            [id] => Some(*id),
            _ => None,
        }
    }

    pub fn mount_of(&self, id: OverlayId) -> Option<MountPoint> {
        self.state().elements.get(&id).map(|element| element.mount.clone())
    }

    pub fn color_of(&self, id: OverlayId) -> Option<Rgb> {
        self.state().elements.get(&id).and_then(|element| element.color)
    }

    /// Color of the single attached overlay.
    pub fn current_color(&self) -> Option<Rgb> {
        self.current().and_then(|id| self.color_of(id))
    }

    pub fn frames_painted(&self, id: OverlayId) -> usize {
        self.state()
            .elements
            .get(&id)
            .map(|element| element.frames)
            .unwrap_or(0)
    }

    pub fn events(&self) -> Vec<SurfaceEvent> {
        self.state().events.clone()
    }

    pub fn created_count(&self) -> usize {
        self.state()
            .events
            .iter()
            .filter(|event| matches!(event, SurfaceEvent::Created { .. }))
            .count()
    }

    pub fn clear_events(&self) {
        self.state().events.clear();
    }
}

impl OverlaySurface for RecordingSurface {
    fn hostname(&self) -> String {
        self.hostname.clone()
    }

    fn mount_point(&self) -> Option<MountPoint> {
        self.state().mount.clone()
    }

    fn create_overlay(&self, mount: &MountPoint, _style: &OverlayStyle) -> Result<OverlayId> {
        let mut state = self.state();
        if state.mount.as_ref() != Some(mount) {
            bail!("mount point {mount} is not in the document");
        }
        let id = OverlayId(state.next_id);
        state.next_id += 1;
        state.elements.insert(
            id,
            Element {
                mount: mount.clone(),
                attached: true,
                color: None,
                frames: 0,
            },
        );
        state.events.push(SurfaceEvent::Created {
            id,
            mount: mount.clone(),
        });
        Ok(id)
    }

    fn is_attached(&self, id: OverlayId) -> bool {
        self.state()
            .elements
            .get(&id)
            .is_some_and(|element| element.attached)
    }

    fn paint(&self, id: OverlayId, frame: Frame) {
        let mut state = self.state();
        let Some(element) = state.elements.get_mut(&id) else {
            return;
        };
        element.color = Some(frame.color);
        element.frames += 1;
        state.events.push(SurfaceEvent::Painted { id, frame });
    }

    fn remove_overlay(&self, id: OverlayId) {
        let mut state = self.state();
        if let Some(element) = state.elements.get_mut(&id) {
            element.attached = false;
            state.events.push(SurfaceEvent::Removed { id });
        }
    }
}
