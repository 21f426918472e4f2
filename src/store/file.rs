//! JSON file persistence for the `local` storage area.
//!
//! The file is a flat JSON object keyed by the schema names. It is rewritten
//! atomically (temp file + rename) on every change so a concurrent reader in
//! another process never sees a half-written document. Writers serialize
//! through an exclusive lock on a sidecar `.lock` file, since the rename
//! replaces the store file's inode.

use fs2::FileExt;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::{Key, StorageArea, Store, StoreError};
use crate::common::utils::private_path;

impl Store {
    /// Open (or start) a file-backed `local` store.
    pub fn open_file(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let values = read_values(&path)?;
        log_debug!("Opened store {} with {} keys", private_path(&path), values.len());
        Ok(Self::build(StorageArea::Local, values, Some(path)))
    }
}

/// Default location: `$XDG_STATE_HOME/nightglow/store.json`, falling back to
/// the local data directory.
pub fn default_store_path() -> anyhow::Result<PathBuf> {
    let base = dirs::state_dir()
        .or_else(dirs::data_local_dir)
        .ok_or_else(|| anyhow::anyhow!("Could not determine a state directory for the store"))?;
    Ok(base.join("nightglow").join("store.json"))
}

/// Read the file's values. A missing file is an empty store; unknown keys
/// are ignored.
pub(crate) fn read_values(path: &Path) -> Result<BTreeMap<Key, Value>, StoreError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(source) => {
            return Err(StoreError::Io {
                path: private_path(path),
                source,
            });
        }
    };

    if content.trim().is_empty() {
        return Ok(BTreeMap::new());
    }

    let raw: BTreeMap<String, Value> =
        serde_json::from_str(&content).map_err(|source| StoreError::Serialization {
            path: private_path(path),
            source,
        })?;

    Ok(raw
        .into_iter()
        .filter_map(|(name, value)| name.parse::<Key>().ok().map(|key| (key, value)))
        .collect())
}

/// Exclusive cross-process write lock on a store file, released on drop.
pub(crate) struct FileLock {
    file: File,
}

impl FileLock {
    /// Block until no other process is writing the store at `path`.
    pub(crate) fn acquire(path: &Path) -> Result<Self, StoreError> {
        let io_error = |source| StoreError::Io {
            path: private_path(path),
            source,
        };

        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir).map_err(io_error)?;

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(lock_path(path))
            .map_err(io_error)?;
        file.lock_exclusive().map_err(io_error)?;
        Ok(Self { file })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

fn lock_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".lock");
    path.with_file_name(name)
}

pub(crate) fn write_values(path: &Path, values: &BTreeMap<Key, Value>) -> Result<(), StoreError> {
    let io_error = |source| StoreError::Io {
        path: private_path(path),
        source,
    };

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).map_err(io_error)?;

    let document: BTreeMap<&str, &Value> =
        values.iter().map(|(key, value)| (key.as_str(), value)).collect();
    let json = serde_json::to_string_pretty(&document).map_err(|source| {
        StoreError::Serialization {
            path: private_path(path),
            source,
        }
    })?;

    let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(io_error)?;
    temp.write_all(json.as_bytes()).map_err(io_error)?;
    temp.write_all(b"\n").map_err(io_error)?;
    temp.persist(path).map_err(|e| io_error(e.error))?;
    Ok(())
}
