//! Storage Module
//!
//! Key/value persistence contract for callers that back cache entries
//! with a store of record. The cache itself never touches storage.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::error::{CacheError, Result};

// == Key Value Store Trait ==
/// String key/value persistence adapter.
pub trait KeyValueStore: Send + Sync {
    /// Stores `value` under `key`, replacing any previous value.
    fn save(&self, key: &str, value: String) -> Result<()>;

    /// Loads the value stored under `key`.
    fn load(&self, key: &str) -> Result<Option<String>>;

    /// Deletes `key`, returning whether it existed.
    fn delete(&self, key: &str) -> Result<bool>;

    /// Serializes `value` as JSON and saves it.
    fn save_json<V>(&self, key: &str, value: &V) -> Result<()>
    where
        V: Serialize + ?Sized,
        Self: Sized,
    {
        let encoded = serde_json::to_string(value)?;
        self.save(key, encoded)
    }

    /// Loads and deserializes a JSON value.
    ///
    /// A stored value that no longer parses is reported as a storage error.
    fn load_json<V>(&self, key: &str) -> Result<Option<V>>
    where
        V: DeserializeOwned,
        Self: Sized,
    {
        let Some(raw) = self.load(key)? else {
            return Ok(None);
        };
        serde_json::from_str(&raw).map(Some).map_err(|err| {
            warn!(key, error = %err, "stored value is not valid JSON");
            CacheError::Storage(format!("cannot decode value for {}: {}", key, err))
        })
    }
}

fn check_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(CacheError::InvalidKey("key must not be empty".to_string()));
    }
    Ok(())
}

// == Memory Store ==
/// Thread-safe in-memory [`KeyValueStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    fn save(&self, key: &str, value: String) -> Result<()> {
        check_key(key)?;
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value);
        Ok(())
    }

    fn load(&self, key: &str) -> Result<Option<String>> {
        check_key(key)?;
        Ok(self
            .items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }

    fn delete(&self, key: &str) -> Result<bool> {
        check_key(key)?;
        Ok(self
            .items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .is_some())
    }
}
