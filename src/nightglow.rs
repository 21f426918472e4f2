//! Application coordinator wiring every context together.
//!
//! One [`Nightglow`] builder yields a [`Running`] instance that owns:
//! - the shared [`Store`] (optionally watched for writes by other processes)
//! - the background [`TemperatureResolver`]
//! - the popup state machine
//! - one overlay controller task per open page
//!
//! The contexts only share the store handle and the messenger; nothing else
//! is passed between them.
//!
//! ```no_run
//! use nightglow::{Nightglow, config::Config, overlay::terminal::TerminalSurface, store::Store};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let store = Store::open_file(nightglow::store::file::default_store_path()?)?;
//! let mut running = Nightglow::new(store, Config::default()).watch_store().start().await?;
//! running.open_page(TerminalSurface::new("example.com"));
//! running.shutdown().await;
//! # Ok(())
//! # }
//! ```

use anyhow::Result;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::core::{ResolverHandle, TemperatureResolver};
use crate::messaging::{Messenger, PageId};
use crate::overlay::{OverlayController, OverlaySurface, PageEvent};
use crate::popup::Popup;
use crate::store::watcher::{StoreWatcher, start_store_watcher};
use crate::store::{Settings, Store};
use crate::time::{SharedClock, SystemClock};

/// Builder for a running nightglow instance.
pub struct Nightglow {
    store: Store,
    config: Config,
    clock: SharedClock,
    watch_store: bool,
}

impl Nightglow {
    pub fn new(store: Store, config: Config) -> Self {
        Self {
            store,
            config,
            clock: SystemClock::shared(),
            watch_store: false,
        }
    }

    /// Use another clock (tests, simulations).
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    /// Re-publish writes made to the store file by other processes.
    pub fn watch_store(mut self) -> Self {
        self.watch_store = true;
        self
    }

    /// Initialize the settings record and start the background context.
    pub async fn start(self) -> Result<Running> {
        let defaults = self.config.settings_defaults();
        match Settings::ensure_defaults(&self.store, &defaults).await {
            Ok(0) => {}
            Ok(count) => log_decorated!("Initialized {count} settings with defaults"),
            Err(e) => log_warning!("Settings not initialized: {e}"),
        }

        let watcher = if self.watch_store {
            start_store_watcher(&self.store)?
        } else {
            None
        };

        let resolver = TemperatureResolver::new(
            self.store.clone(),
            Arc::clone(&self.clock),
            defaults,
            self.config.range(),
        )
        .spawn();

        let messenger = Messenger::new();
        let popup = Popup::new(
            self.store.clone(),
            Arc::clone(&self.clock),
            messenger.clone(),
            self.config.popup_options(),
        );

        Ok(Running {
            store: self.store,
            config: self.config,
            clock: self.clock,
            messenger,
            popup,
            resolver,
            pages: BTreeMap::new(),
            _watcher: watcher,
        })
    }
}

struct PageHandle {
    hostname: String,
    events: mpsc::UnboundedSender<PageEvent>,
    task: JoinHandle<()>,
}

/// A started instance. Dropping it stops every task.
pub struct Running {
    store: Store,
    config: Config,
    clock: SharedClock,
    messenger: Messenger,
    popup: Arc<Popup>,
    resolver: ResolverHandle,
    pages: BTreeMap<PageId, PageHandle>,
    _watcher: Option<StoreWatcher>,
}

impl Running {
    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn popup(&self) -> &Arc<Popup> {
        &self.popup
    }

    pub fn messenger(&self) -> &Messenger {
        &self.messenger
    }

    pub fn resolver(&self) -> &Arc<TemperatureResolver> {
        self.resolver.resolver()
    }

    /// Open a page context rendering through `surface`.
    pub fn open_page(&mut self, surface: Arc<dyn OverlaySurface>) -> PageId {
        let hostname = surface.hostname();
        let (id, inbox) = self.messenger.register();
        let changes = self.store.subscribe();
        let (events, event_rx) = mpsc::unbounded_channel();

        let controller = OverlayController::new(
            self.store.clone(),
            Arc::clone(&self.clock),
            surface,
            self.config.overlay_options(),
        );
        let task = tokio::spawn(controller.run(changes, inbox, event_rx));

        log_debug!("Opened {id} for {hostname}");
        self.pages.insert(
            id,
            PageHandle {
                hostname,
                events,
                task,
            },
        );
        id
    }

    /// Deliver a lifecycle event to a page. Returns false for unknown pages.
    pub fn page_event(&self, id: PageId, event: PageEvent) -> bool {
        self.pages
            .get(&id)
            .is_some_and(|page| page.events.send(event).is_ok())
    }

    /// Unload a page and wait for its overlay to be removed.
    pub async fn close_page(&mut self, id: PageId) {
        let Some(page) = self.pages.remove(&id) else {
            return;
        };
        let _ = page.events.send(PageEvent::Unload);
        self.messenger.unregister(id);
        if let Err(e) = page.task.await
            && !e.is_cancelled()
        {
            log_warning!("Page {} ({}) ended abnormally: {e}", id, page.hostname);
        }
    }

    pub fn page_ids(&self) -> Vec<PageId> {
        self.pages.keys().copied().collect()
    }

    /// Close every page and stop the background context.
    pub async fn shutdown(mut self) {
        for id in self.page_ids() {
            self.close_page(id).await;
        }
        if self.popup.previewing().is_some() {
            self.popup.exit_preview().await;
        }
        self.resolver.stop();
    }
}

impl Drop for Running {
    fn drop(&mut self) {
        for page in self.pages.values() {
            page.task.abort();
        }
    }
}
