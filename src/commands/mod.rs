//! Command-line command handlers for nightglow.
//!
//! Each command lives in its own submodule. They all operate on the same
//! file-backed store as a running instance, so one-shot commands such as
//! `preview` or `set` are picked up live by `nightglow run` through its
//! store watcher.

pub mod exclude;
pub mod help;
pub mod preview;
pub mod run;
pub mod set;
pub mod status;

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;

use crate::args::GlobalOptions;
use crate::common::logger::Log;
use crate::common::utils::private_path;
use crate::config::{self, Config};
use crate::messaging::Messenger;
use crate::popup::Popup;
use crate::store::Store;
use crate::store::file::default_store_path;
use crate::time::SystemClock;

/// Configuration and store shared by every command.
pub(crate) struct CommandContext {
    pub config: Config,
    pub config_path: PathBuf,
    pub store: Store,
}

impl CommandContext {
    /// Apply the global flags, load the configuration and open the store.
    pub fn open(options: &GlobalOptions) -> Result<Self> {
        Log::set_debug(options.debug_enabled);
        if options.config_dir.is_some() {
            config::set_config_dir(options.config_dir.clone())?;
        }

        let config_path = config::get_config_path()?;
        let config = Config::load()?;

        let store_path = match &options.store_path {
            Some(path) => PathBuf::from(path),
            None => default_store_path()?,
        };
        let store = Store::open_file(&store_path)
            .with_context(|| format!("Failed to open store {}", private_path(&store_path)))?;

        Ok(Self {
            config,
            config_path,
            store,
        })
    }

    /// A popup on the real clock with no pages attached.
    ///
    /// Pages of a running instance learn about its writes through the store
    /// only, so they never get this popup's `updateFilter{preview}` nudge.
    pub fn popup(&self) -> Arc<Popup> {
        Popup::new(
            self.store.clone(),
            SystemClock::shared(),
            Messenger::new(),
            self.config.popup_options(),
        )
    }
}
