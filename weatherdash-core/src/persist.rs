//! Durable storage for the watchlist.
//!
//! The whole watchlist is written as one versioned root record under a fixed
//! key. Only `cities` is persisted; nothing else in the dashboard is durable.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::{task::JoinHandle, time::Instant};
use tokio_util::sync::CancellationToken;

use crate::{
    error::StorageError, model::WatchedCity, store::WatchlistStore, watchlist::Watchlist,
};

pub const PERSIST_KEY: &str = "weatherdash-root";
pub const PERSIST_VERSION: u32 = 1;

/// Client-local key-value storage.
pub trait KeyValueStorage: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// One `<key>.json` file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.display().to_string(),
        source,
    }
}

impl KeyValueStorage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(&path, e)),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir).map_err(|e| io_error(&self.dir, e))?;

        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value).map_err(|e| io_error(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| io_error(&path, e))
    }
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.items.lock().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.items.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// The persisted root record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedRoot {
    #[serde(default)]
    pub version: u32,
    pub cities: Vec<WatchedCity>,
}

impl PersistedRoot {
    pub fn from_watchlist(watchlist: &Watchlist) -> Self {
        Self {
            version: PERSIST_VERSION,
            cities: watchlist.cities().to_vec(),
        }
    }
}

/// Bring an older record up to [`PERSIST_VERSION`]. `None` if it cannot be understood.
fn migrate(root: PersistedRoot) -> Option<PersistedRoot> {
    match root.version {
        PERSIST_VERSION => Some(root),
        // Version 0 had the same layout, only without a version tag.
        0 => Some(PersistedRoot {
            version: PERSIST_VERSION,
            ..root
        }),
        _ => None,
    }
}

/// Load the watchlist. Missing, unreadable or newer records yield an empty list.
pub fn rehydrate(storage: &dyn KeyValueStorage) -> Watchlist {
    let raw = match storage.get_item(PERSIST_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Watchlist::new(),
        Err(e) => {
            tracing::warn!("could not read persisted watchlist: {}", e);
            return Watchlist::new();
        }
    };

    let root: PersistedRoot = match serde_json::from_str(&raw) {
        Ok(root) => root,
        Err(e) => {
            tracing::warn!("persisted watchlist is corrupt, starting empty: {}", e);
            return Watchlist::new();
        }
    };

    let version = root.version;
    match migrate(root) {
        Some(root) => {
            tracing::info!("rehydrated {} watched cities", root.cities.len());
            Watchlist::from_cities(root.cities)
        }
        None => {
            tracing::warn!(
                "persisted watchlist has unsupported version {} (expected {}), starting empty",
                version,
                PERSIST_VERSION
            );
            Watchlist::new()
        }
    }
}

/// Write `watchlist` immediately.
pub fn flush(storage: &dyn KeyValueStorage, watchlist: &Watchlist) -> Result<(), StorageError> {
    let json = serde_json::to_string(&PersistedRoot::from_watchlist(watchlist))?;
    storage.set_item(PERSIST_KEY, &json)
}

/// Background writer. The first unsaved change arms a `debounce` deadline;
/// further changes ride along without pushing it back, so a steady stream of
/// updates is still written at least once per `debounce`. Flushes once more
/// when `cancel` fires.
pub fn spawn_persistor(
    store: WatchlistStore,
    storage: Arc<dyn KeyValueStorage>,
    debounce: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let mut rx = store.subscribe();

    tokio::spawn(async move {
        let mut deadline: Option<Instant> = None;

        loop {
            let flush_at = deadline.unwrap_or_else(Instant::now);
            tokio::select! {
                changed = rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    deadline.get_or_insert_with(|| Instant::now() + debounce);
                }
                _ = tokio::time::sleep_until(flush_at), if deadline.is_some() => {
                    let current = rx.borrow_and_update().clone();
                    match flush(storage.as_ref(), &current) {
                        Ok(()) => tracing::debug!("persisted {} cities", current.len()),
                        Err(e) => tracing::error!("failed to persist watchlist: {}", e),
                    }
                    deadline = None;
                }
                _ = cancel.cancelled() => {
                    break;
                }
            }
        }

        if deadline.is_some() || rx.has_changed().unwrap_or(false) {
            let current = rx.borrow_and_update().clone();
            if let Err(e) = flush(storage.as_ref(), &current) {
                tracing::error!("final watchlist flush failed: {}", e);
            }
        }
    })
}
