use crate::results::CartAttemptResult;
use crate::utils::now_millis;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("store lock poisoned")]
    Poisoned,
}

/// The fixed key space of the shared store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreKey {
    /// Single-slot mailbox for the latest cart run
    LastCartResults,
    /// Saved completion API credential
    ApiKey,
    /// Usage counters
    Analytics,
    /// User settings
    Settings,
}

impl StoreKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreKey::LastCartResults => "lastAddToCartResults",
            StoreKey::ApiKey => "openaiApiKey",
            StoreKey::Analytics => "analytics",
            StoreKey::Settings => "settings",
        }
    }
}

/// Shared key-value storage visible to both the orchestrator and the page agent
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: StoreKey) -> Result<Option<Value>, StoreError>;
    fn set(&self, key: StoreKey, value: Value) -> Result<(), StoreError>;
    fn remove(&self, key: StoreKey) -> Result<(), StoreError>;
}

/// Process-local store
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<Map<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: StoreKey) -> Result<Option<Value>, StoreError> {
        let entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.get(key.as_str()).cloned())
    }

    fn set(&self, key: StoreKey, value: Value) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.insert(key.as_str().to_string(), value);
        Ok(())
    }

    fn remove(&self, key: StoreKey) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.remove(key.as_str());
        Ok(())
    }
}

/// Store persisted as one JSON object; the whole file is rewritten on every change
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<Map<String, Value>>,
}

impl FileStore {
    /// Open the store, starting empty if the file does not exist yet
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let entries = match fs::read_to_string(&path) {
            Ok(contents) if !contents.trim().is_empty() => serde_json::from_str(&contents)?,
            Ok(_) => Map::new(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(e) => return Err(e.into()),
        };
        ::log::debug!("Opened store {} with {} keys", path.display(), entries.len());
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    fn flush(&self, entries: &Map<String, Value>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, serde_json::to_string_pretty(entries)?)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: StoreKey) -> Result<Option<Value>, StoreError> {
        let entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.get(key.as_str()).cloned())
    }

    fn set(&self, key: StoreKey, value: Value) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.insert(key.as_str().to_string(), value);
        self.flush(&entries)
    }

    fn remove(&self, key: StoreKey) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        if entries.remove(key.as_str()).is_some() {
            self.flush(&entries)?;
        }
        Ok(())
    }
}

/// Record in the last-results slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredCartResults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<CartAttemptResult>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
}

impl StoredCartResults {
    pub fn results(results: Vec<CartAttemptResult>) -> Self {
        Self {
            results: Some(results),
            error: None,
            timestamp: now_millis(),
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        Self {
            results: None,
            error: Some(error.into()),
            timestamp: now_millis(),
        }
    }
}

/// Best-effort side-channel publish: non-transactional, last write wins,
/// single slot. Failures are logged and otherwise ignored.
pub fn publish_cart_results(store: &dyn KeyValueStore, record: &StoredCartResults) {
    let outcome = serde_json::to_value(record)
        .map_err(StoreError::from)
        .and_then(|value| store.set(StoreKey::LastCartResults, value));
    if let Err(e) = outcome {
        ::log::warn!("Could not persist cart results: {}", e);
    }
}

/// Reads the last-results slot once. A record younger than `freshness_ms` is
/// removed and returned; older records are left alone and ignored.
pub fn take_fresh_cart_results(
    store: &dyn KeyValueStore,
    freshness_ms: u64,
) -> Result<Option<StoredCartResults>, StoreError> {
    let Some(value) = store.get(StoreKey::LastCartResults)? else {
        ::log::debug!("No stored cart results found");
        return Ok(None);
    };

    let record: StoredCartResults = match serde_json::from_value(value) {
        Ok(record) => record,
        Err(e) => {
            ::log::warn!("Discarding unreadable stored cart results: {}", e);
            store.remove(StoreKey::LastCartResults)?;
            return Ok(None);
        }
    };

    let age = now_millis().saturating_sub(record.timestamp);
    if age < 0 || age as u64 >= freshness_ms {
        ::log::info!("Stored cart results are {} ms old, ignoring", age);
        return Ok(None);
    }

    store.remove(StoreKey::LastCartResults)?;
    ::log::info!("Recovered cart results stored {} ms ago", age);
    Ok(Some(record))
}

pub fn load_credential(store: &dyn KeyValueStore) -> Result<Option<String>, StoreError> {
    Ok(store
        .get(StoreKey::ApiKey)?
        .and_then(|v| v.as_str().map(str::to_string))
        .filter(|key| !key.trim().is_empty()))
}

pub fn save_credential(store: &dyn KeyValueStore, credential: &str) -> Result<(), StoreError> {
    store.set(StoreKey::ApiKey, Value::String(credential.to_string()))
}

/// User preferences that outlive one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub auto_add_to_cart: bool,
    pub max_results: usize,
}

pub fn load_settings(store: &dyn KeyValueStore) -> Result<Option<Settings>, StoreError> {
    match store.get(StoreKey::Settings)? {
        Some(value) => match serde_json::from_value(value) {
            Ok(settings) => Ok(Some(settings)),
            Err(e) => {
                ::log::warn!("Ignoring unreadable settings: {}", e);
                Ok(None)
            }
        },
        None => Ok(None),
    }
}

pub fn save_settings(store: &dyn KeyValueStore, settings: &Settings) -> Result<(), StoreError> {
    store.set(StoreKey::Settings, serde_json::to_value(settings)?)
}

/// Privacy-friendly usage counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analytics {
    pub total_searches: u64,
    pub successful_additions: u64,
    pub last_used: Option<i64>,
}

pub fn load_analytics(store: &dyn KeyValueStore) -> Result<Analytics, StoreError> {
    match store.get(StoreKey::Analytics)? {
        Some(value) => Ok(serde_json::from_value(value).unwrap_or_default()),
        None => Ok(Analytics::default()),
    }
}

fn update_analytics(
    store: &dyn KeyValueStore,
    update: impl FnOnce(&mut Analytics),
) -> Result<(), StoreError> {
    let mut analytics = load_analytics(store)?;
    update(&mut analytics);
    analytics.last_used = Some(now_millis());
    store.set(StoreKey::Analytics, serde_json::to_value(&analytics)?)
}

pub fn record_search(store: &dyn KeyValueStore) -> Result<(), StoreError> {
    update_analytics(store, |a| a.total_searches += 1)
}

pub fn record_additions(store: &dyn KeyValueStore, added: usize) -> Result<(), StoreError> {
    update_analytics(store, |a| a.successful_additions += added as u64)
}
