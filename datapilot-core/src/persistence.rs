use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::Write as IoWrite;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, warn};

use crate::domain::Dataset;
use crate::error::PilotError;
use crate::history::RecentQueries;

pub const QUERIES_KEY: &str = "datapilot_queries";
pub const DATASETS_KEY: &str = "datapilot_datasets";

/// Synchronous string key/value storage that survives restarts.
pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: String) -> Result<(), PilotError>;
}

/// In-process store. Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        let guard = self.entries.lock().ok()?;
        guard.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), PilotError> {
        let mut guard = self.entries.lock().map_err(|e| PilotError::Storage {
            message: format!("Memory store lock poisoned: {}", e),
        })?;
        guard.insert(key.to_string(), value);
        Ok(())
    }
}

/// A single JSON object on disk holding every key. Writes go through a
/// temporary sibling file and an atomic rename.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl JsonFileStore {
    /// Opens the store, treating a missing, empty or unreadable file as empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => BTreeMap::new(),
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!(
                    "Ignoring malformed session store {}: {}",
                    path.display(),
                    e
                );
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                warn!("Failed to read session store {}: {}", path.display(), e);
                BTreeMap::new()
            }
        };

        info!(
            "Opened session store {} ({} keys)",
            path.display(),
            entries.len()
        );

        Self { path, entries }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> Result<PathBuf, PilotError> {
        let file_name = self
            .path
            .file_name()
            .ok_or_else(|| PilotError::Storage {
                message: format!("Store path has no file name: {}", self.path.display()),
            })?;
        let mut temp_name = file_name.to_os_string();
        temp_name.push(".tmp");
        Ok(self.path.with_file_name(temp_name))
    }

    fn flush(&self) -> Result<(), PilotError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let content = serde_json::to_string_pretty(&self.entries).map_err(|e| {
            PilotError::Storage {
                message: format!("Failed to serialize session store: {}", e),
            }
        })?;

        let temp_path = self.temp_path()?;
        let mut temp_file = File::create(&temp_path)?;
        temp_file.write_all(content.as_bytes())?;
        temp_file.sync_all()?;
        drop(temp_file);

        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), PilotError> {
        self.entries.insert(key.to_string(), value);
        self.flush()
    }
}

/// The session's view of durable storage: recent questions always, the
/// dataset list only when `persist_datasets` is on.
pub struct SessionStore {
    store: Box<dyn KeyValueStore>,
    persist_datasets: bool,
}

impl SessionStore {
    pub fn new(store: impl KeyValueStore + 'static, persist_datasets: bool) -> Self {
        Self {
            store: Box::new(store),
            persist_datasets,
        }
    }

    pub fn persists_datasets(&self) -> bool {
        self.persist_datasets
    }

    fn load_json<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        let Some(raw) = self.store.get(key) else {
            return T::default();
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!("Discarding malformed stored value for '{}': {}", key, e);
            T::default()
        })
    }

    fn save_json<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) {
        let result = serde_json::to_string(value)
            .map_err(|e| PilotError::Storage {
                message: e.to_string(),
            })
            .and_then(|raw| self.store.set(key, raw));

        if let Err(e) = result {
            warn!("Failed to persist '{}': {}", key, e);
        }
    }

    pub fn load_history(&self) -> RecentQueries {
        RecentQueries::from_entries(self.load_json::<Vec<String>>(QUERIES_KEY))
    }

    pub fn save_history(&mut self, history: &RecentQueries) {
        self.save_json(QUERIES_KEY, history.entries());
    }

    pub fn load_datasets(&self) -> Vec<Dataset> {
        if !self.persist_datasets {
            return Vec::new();
        }
        self.load_json(DATASETS_KEY)
    }

    pub fn save_datasets(&mut self, datasets: &[Dataset]) {
        if self.persist_datasets {
            self.save_json(DATASETS_KEY, datasets);
        }
    }
}
