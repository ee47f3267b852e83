//! The durable key-value substrate behind the collection store.
//!
//! A backend stores one text value per key and knows nothing about what the
//! text means. [`LmdbStorage`](crate::local_db_state::LmdbStorage) is the
//! persistent implementation; [`MemoryStorage`] keeps everything in a map and
//! is what the tests run against.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::app_response::AppResponse;

pub trait StorageBackend {
    /// Returns the text stored under `key`, or `None` when the key is absent.
    fn get_item(&self, key: &str) -> Result<Option<String>, AppResponse>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set_item(&self, key: &str, value: &str) -> Result<(), AppResponse>;

    /// Removes every key.
    fn clear(&self) -> Result<(), AppResponse>;
}

/// In-memory substrate with an optional byte quota.
///
/// The quota counts key and value bytes of everything stored, the way a
/// browser counts an origin's local storage usage. A write that would push
/// the total past the quota is rejected and leaves the old value in place.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: Mutex<HashMap<String, String>>,
    quota: Option<usize>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota: usize) -> Self {
        Self {
            items: Mutex::new(HashMap::new()),
            quota: Some(quota),
        }
    }

    /// Total bytes currently stored.
    pub fn used_bytes(&self) -> Result<usize, AppResponse> {
        let items = self.lock()?;
        Ok(items.iter().map(|(k, v)| k.len() + v.len()).sum())
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, String>>, AppResponse> {
        self.items
            .lock()
            .map_err(|_| AppResponse::DatabaseError("Memory storage lock poisoned".to_string()))
    }
}

impl StorageBackend for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, AppResponse> {
        let items = self.lock()?;
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), AppResponse> {
        let mut items = self.lock()?;

        if let Some(quota) = self.quota {
            let others: usize = items
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            let needed = others + key.len() + value.len();
            if needed > quota {
                return Err(AppResponse::QuotaExceeded(format!(
                    "writing '{key}' needs {needed} bytes, quota is {quota}"
                )));
            }
        }

        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), AppResponse> {
        self.lock()?.clear();
        Ok(())
    }
}
