//! Best-effort messages from the popup/background to page contexts.
//!
//! The only message is `{"action": "updateFilter", "mode": ...}`, asking a
//! page to recompute its overlay right away with a given transition speed.
//! Delivery is point-to-point per page and never fails the sender: a page
//! that has gone away (closed tab, no content script) is dropped from the
//! registry and the broadcast continues with the rest.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Transition speed requested for an overlay update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateMode {
    /// Slow scheduled transition, subject to the throttle
    Auto,
    /// Short transition for user-driven changes
    Preview,
    /// No transition at all
    Instant,
}

impl fmt::Display for UpdateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateMode::Auto => write!(f, "auto"),
            UpdateMode::Preview => write!(f, "preview"),
            UpdateMode::Instant => write!(f, "instant"),
        }
    }
}

/// Message delivered to page contexts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Message {
    UpdateFilter { mode: UpdateMode },
}

impl Message {
    pub fn update_filter(mode: UpdateMode) -> Self {
        Message::UpdateFilter { mode }
    }
}

/// Identifier of a registered page context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PageId(pub u64);

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "page-{}", self.0)
    }
}

/// Registry of page inboxes.
#[derive(Clone, Default)]
pub struct Messenger {
    inner: Arc<Mutex<Registry>>,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    pages: BTreeMap<PageId, mpsc::UnboundedSender<Message>>,
}

impl Messenger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new page and hand back its id and inbox.
    pub fn register(&self) -> (PageId, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut registry = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        registry.next_id += 1;
        let id = PageId(registry.next_id);
        registry.pages.insert(id, tx);
        (id, rx)
    }

    pub fn unregister(&self, id: PageId) {
        if let Ok(mut registry) = self.inner.lock() {
            registry.pages.remove(&id);
        }
    }

    /// Number of pages currently registered.
    pub fn page_count(&self) -> usize {
        self.inner.lock().map(|r| r.pages.len()).unwrap_or(0)
    }

    /// Send to one page. Returns whether it was delivered.
    pub fn send(&self, id: PageId, message: Message) -> bool {
        let Ok(mut registry) = self.inner.lock() else {
            return false;
        };
        let delivered = registry
            .pages
            .get(&id)
            .is_some_and(|tx| tx.send(message).is_ok());
        if !delivered {
            registry.pages.remove(&id);
        }
        delivered
    }

    /// Send to every page. Failed recipients are pruned and skipped.
    ///
    /// Returns the number of pages that received the message.
    pub fn broadcast(&self, message: Message) -> usize {
        let Ok(mut registry) = self.inner.lock() else {
            return 0;
        };
        let mut gone = Vec::new();
        let mut delivered = 0;
        for (id, tx) in &registry.pages {
            if tx.send(message).is_ok() {
                delivered += 1;
            } else {
                gone.push(*id);
            }
        }
        for id in gone {
            log_debug!("Dropping unreachable {id}");
            registry.pages.remove(&id);
        }
        delivered
    }
}
