//! Shared key-value store with change notifications.
//!
//! Every context (popup, background resolver, overlay pages) talks to the
//! others only through this store and through [`crate::messaging`]. The store
//! has the usage contract of a browser extension's storage area:
//!
//! - flat namespace of independently readable/writable [`Key`]s holding JSON values
//! - every operation is async and may fail when the context is invalidated
//!   (e.g. mid-reload); callers treat failure as "value unavailable"
//! - writes are last-write-wins, no locking or transactions across keys
//! - each write publishes one [`StorageChange`] listing only keys whose value
//!   actually changed, tagged with the logical [`StorageArea`]
//!
//! The one atomic operation is [`Store::take_flag`], a compare-and-clear used
//! for the instant-apply-once flag so that at most one page observes it set.
//!
//! A store is either memory-only or backed by a JSON file (see [`file`]),
//! optionally watched for writes made by other processes (see [`watcher`]).

pub mod file;
pub mod keys;
pub mod settings;
pub mod watcher;

pub use keys::Key;
pub use settings::{Override, OverrideState, Settings, TemperatureRange};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tokio::sync::broadcast;

use crate::common::constants::CHANGE_CHANNEL_CAPACITY;

/// Failure of a storage operation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The storage context is gone (invalidated, reloading, poisoned).
    #[error("storage context is unavailable")]
    Unavailable,
    #[error("failed to access store file {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed store file {path}")]
    Serialization {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Logical storage area a change belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageArea {
    /// Persisted to disk when file-backed
    Local,
    /// Memory only, gone with the process
    Session,
}

/// Old and new value of one key in a change notification.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueChange {
    pub old: Option<Value>,
    pub new: Option<Value>,
}

/// One write's worth of changes.
#[derive(Debug, Clone)]
pub struct StorageChange {
    pub area: StorageArea,
    pub changes: BTreeMap<Key, ValueChange>,
}

impl StorageChange {
    /// Whether any of `keys` changed in this write.
    pub fn touches(&self, keys: &[Key]) -> bool {
        keys.iter().any(|key| self.changes.contains_key(key))
    }

    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.changes.keys()
    }
}

/// Values read in one `get`, with typed accessors.
///
/// Accessors return `None` for absent keys and for values of the wrong type,
/// so callers fall back to defaults either way.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    values: BTreeMap<Key, Value>,
}

impl Snapshot {
    pub fn get(&self, key: Key) -> Option<&Value> {
        self.values.get(&key).filter(|value| !value.is_null())
    }

    pub fn bool(&self, key: Key) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    pub fn u32(&self, key: Key) -> Option<u32> {
        self.get(key)
            .and_then(Value::as_u64)
            .and_then(|value| u32::try_from(value).ok())
    }

    pub fn i64(&self, key: Key) -> Option<i64> {
        self.get(key).and_then(Value::as_i64)
    }

    pub fn str(&self, key: Key) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Array-of-strings value; non-string members are skipped.
    pub fn strings(&self, key: Key) -> Vec<String> {
        self.get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Cloneable handle to one storage area.
#[derive(Clone)]
pub struct Store {
    inner: Arc<Inner>,
}

struct Inner {
    area: StorageArea,
    data: Mutex<BTreeMap<Key, Value>>,
    file: Option<PathBuf>,
    changes: broadcast::Sender<StorageChange>,
    available: AtomicBool,
}

impl Store {
    /// Memory-only store for the given area.
    pub fn memory(area: StorageArea) -> Self {
        Self::build(area, BTreeMap::new(), None)
    }

    fn build(area: StorageArea, data: BTreeMap<Key, Value>, file: Option<PathBuf>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                area,
                data: Mutex::new(data),
                file,
                changes,
                available: AtomicBool::new(true),
            }),
        }
    }

    pub fn area(&self) -> StorageArea {
        self.inner.area
    }

    /// Backing file, if any.
    pub fn path(&self) -> Option<&PathBuf> {
        self.inner.file.as_ref()
    }

    /// Whether the storage context is currently reachable.
    pub fn is_available(&self) -> bool {
        self.inner.available.load(Ordering::SeqCst)
    }

    /// Mark the context invalidated; every operation fails until [`Store::restore`].
    pub fn invalidate(&self) {
        self.inner.available.store(false, Ordering::SeqCst);
    }

    pub fn restore(&self) {
        self.inner.available.store(true, Ordering::SeqCst);
    }

    /// Subscribe to change notifications from this point on.
    pub fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.inner.changes.subscribe()
    }

    /// Read the given keys. Absent keys are simply missing from the snapshot.
    pub async fn get(&self, keys: &[Key]) -> Result<Snapshot, StoreError> {
        self.checkpoint().await?;
        let data = self.lock()?;
        let values = keys
            .iter()
            .filter_map(|key| data.get(key).map(|value| (*key, value.clone())))
            .collect();
        Ok(Snapshot { values })
    }

    /// Read every key present.
    pub async fn get_all(&self) -> Result<Snapshot, StoreError> {
        self.checkpoint().await?;
        let data = self.lock()?;
        Ok(Snapshot {
            values: data.clone(),
        })
    }

    /// Write several keys at once; one notification covers all that changed.
    pub async fn set<I>(&self, entries: I) -> Result<(), StoreError>
    where
        I: IntoIterator<Item = (Key, Value)>,
    {
        self.checkpoint().await?;
        self.mutate(|data| {
            let mut changes = BTreeMap::new();
            for (key, value) in entries {
                let old = data.insert(key, value.clone());
                if old.as_ref() != Some(&value) {
                    changes.insert(
                        key,
                        ValueChange {
                            old,
                            new: Some(value),
                        },
                    );
                }
            }
            (changes, ())
        })
    }

    /// Remove keys; absent keys are ignored.
    pub async fn remove(&self, keys: &[Key]) -> Result<(), StoreError> {
        self.checkpoint().await?;
        self.mutate(|data| {
            let mut changes = BTreeMap::new();
            for key in keys {
                if let Some(old) = data.remove(key) {
                    changes.insert(
                        *key,
                        ValueChange {
                            old: Some(old),
                            new: None,
                        },
                    );
                }
            }
            (changes, ())
        })
    }

    /// Atomically read a boolean flag and clear it.
    ///
    /// Returns `true` only to the single caller that found it set, across
    /// processes sharing the store file too.
    pub async fn take_flag(&self, key: Key) -> Result<bool, StoreError> {
        self.checkpoint().await?;
        self.mutate(|data| {
            let was_set = data.get(&key).and_then(Value::as_bool).unwrap_or(false);
            let mut changes = BTreeMap::new();
            if was_set {
                let old = data.insert(key, Value::Bool(false));
                changes.insert(
                    key,
                    ValueChange {
                        old,
                        new: Some(Value::Bool(false)),
                    },
                );
            }
            (changes, was_set)
        })
    }

    /// Replace the in-memory contents with the backing file's and publish
    /// whatever differs. Used when another process wrote the file.
    pub fn reload_from_disk(&self) -> Result<usize, StoreError> {
        let Some(path) = self.inner.file.as_ref() else {
            return Ok(0);
        };
        let fresh = file::read_values(path)?;
        let mut data = self.lock()?;
        let changes = replace_contents(&mut *data, fresh);
        let count = changes.len();
        self.publish(changes);
        Ok(count)
    }

    // Every operation yields once so callers never rely on synchronous completion
    async fn checkpoint(&self) -> Result<(), StoreError> {
        tokio::task::yield_now().await;
        if self.is_available() {
            Ok(())
        } else {
            Err(StoreError::Unavailable)
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<Key, Value>>, StoreError> {
        self.inner.data.lock().map_err(|_| StoreError::Unavailable)
    }

    /// Apply one write and publish what it changed.
    ///
    /// File-backed stores hold the file lock for the whole write: the file is
    /// re-read first (publishing writes made by other processes), `apply`
    /// runs on that fresh state, and the result is written back. Keys this
    /// write does not touch keep whatever value is on disk.
    fn mutate<R>(
        &self,
        apply: impl FnOnce(&mut BTreeMap<Key, Value>) -> (BTreeMap<Key, ValueChange>, R),
    ) -> Result<R, StoreError> {
        let mut data = self.lock()?;
        let _file_lock = match self.inner.file.as_ref() {
            Some(path) => {
                let guard = file::FileLock::acquire(path)?;
                let external = replace_contents(&mut *data, file::read_values(path)?);
                self.publish(external);
                Some(guard)
            }
            None => None,
        };

        let (changes, result) = apply(&mut *data);
        if !changes.is_empty()
            && let Some(path) = self.inner.file.as_ref()
        {
            file::write_values(path, &data)?;
        }
        self.publish(changes);
        Ok(result)
    }

    fn publish(&self, changes: BTreeMap<Key, ValueChange>) {
        if changes.is_empty() {
            return;
        }
        // No subscribers is fine
        let _ = self.inner.changes.send(StorageChange {
            area: self.inner.area,
            changes,
        });
    }
}

/// Swap `data` for `fresh`, returning the per-key differences.
fn replace_contents(
    data: &mut BTreeMap<Key, Value>,
    fresh: BTreeMap<Key, Value>,
) -> BTreeMap<Key, ValueChange> {
    let mut changes = BTreeMap::new();
    for (key, new) in &fresh {
        if data.get(key) != Some(new) {
            changes.insert(
                *key,
                ValueChange {
                    old: data.get(key).cloned(),
                    new: Some(new.clone()),
                },
            );
        }
    }
    for (key, old) in data.iter() {
        if !fresh.contains_key(key) {
            changes.insert(
                *key,
                ValueChange {
                    old: Some(old.clone()),
                    new: None,
                },
            );
        }
    }
    *data = fresh;
    changes
}
