//! Cross-process change notifications for a file-backed store.
//!
//! Another process (the `preview`/`set` commands, a second popup) writing the
//! store file is invisible to this process's subscribers until the file is
//! re-read. The watcher monitors the file's directory and, after a short
//! debounce, reloads the store so the differences are published like any
//! local write.

use anyhow::{Context, Result};
use notify::{
    Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher,
};
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use super::Store;
use crate::common::constants::STORE_WATCH_DEBOUNCE_MS;
use crate::common::utils::private_path;

/// Keeps the file watch alive; dropping it stops the watcher thread.
pub struct StoreWatcher {
    _watcher: RecommendedWatcher,
    path: PathBuf,
}

impl StoreWatcher {
    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

/// Start watching the store's backing file. Memory stores have nothing to watch.
pub fn start_store_watcher(store: &Store) -> Result<Option<StoreWatcher>> {
    let Some(path) = store.path().cloned() else {
        return Ok(None);
    };
    let dir = path
        .parent()
        .map(|p| p.to_path_buf())
        .context("Store file has no parent directory")?;
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create store directory {}", private_path(&dir)))?;

    let (tx, rx) = mpsc::channel::<Event>();
    let mut watcher = RecommendedWatcher::new(
        move |res: Result<Event, notify::Error>| {
            if let Ok(event) = res
                && matches!(
                    event.kind,
                    EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
                )
            {
                let _ = tx.send(event);
            }
        },
        NotifyConfig::default(),
    )
    .context("Failed to create store file watcher")?;

    // The directory, not the file: atomic renames replace the inode
    watcher
        .watch(&dir, RecursiveMode::NonRecursive)
        .with_context(|| format!("Failed to watch {}", private_path(&dir)))?;

    let watched = path.clone();
    let store = store.clone();
    thread::Builder::new()
        .name("store-watcher".to_string())
        .spawn(move || {
            while let Ok(event) = rx.recv() {
                if !event.paths.iter().any(|p| p == &watched) {
                    continue;
                }

                // Let the writer finish, then fold the burst into one reload
                thread::sleep(Duration::from_millis(STORE_WATCH_DEBOUNCE_MS));
                while rx.try_recv().is_ok() {}

                match store.reload_from_disk() {
                    Ok(0) => {}
                    Ok(count) => log_debug!("Store file changed externally ({count} keys)"),
                    Err(e) => log_debug!("Store reload skipped: {e}"),
                }
            }
        })
        .context("Failed to spawn store watcher thread")?;

    log_debug!("Watching store file {}", private_path(&path));
    Ok(Some(StoreWatcher {
        _watcher: watcher,
        path,
    }))
}
