use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::RwLock;

use kstreams_api::{BoxFuture, KStorage, ResourceError, StorageFactory, StorageOptions};

pub const MEMORY_STORAGE_NAME: &str = "memory";

// ═══════════════════════════════════════════════════════════════
//  MemoryStorageConfig
// ═══════════════════════════════════════════════════════════════

fn default_max_keys() -> usize {
    100_000
}

#[derive(Debug, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryStorageConfig {
    #[serde(default = "default_max_keys")]
    pub max_keys: usize,
}

impl Default for MemoryStorageConfig {
    fn default() -> Self {
        Self {
            max_keys: default_max_keys(),
        }
    }
}

impl MemoryStorageConfig {
    /// `Null` and `{}` both mean defaults.
    pub fn from_options(options: &StorageOptions) -> Result<Self, ResourceError> {
        if options.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(options.clone())
            .map_err(|e| ResourceError::config(format!("memory storage options: {e}")))
    }
}

// ═══════════════════════════════════════════════════════════════
//  MemoryStorage
// ═══════════════════════════════════════════════════════════════

/// Baseline in-memory key-value storage. Nothing survives the process.
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, serde_json::Value>>,
    max_keys: usize,
    closed: AtomicBool,
}

impl MemoryStorage {
    pub fn new(max_keys: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_keys,
            closed: AtomicBool::new(false),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> Result<(), ResourceError> {
        if self.is_closed() {
            return Err(ResourceError::closed("memory storage"));
        }
        Ok(())
    }

    fn check_capacity(
        &self,
        entries: &HashMap<String, serde_json::Value>,
        key: &str,
    ) -> Result<(), ResourceError> {
        if !entries.contains_key(key) && entries.len() >= self.max_keys {
            return Err(ResourceError::new(format!(
                "memory storage is full ({} keys), cannot add '{key}'",
                self.max_keys
            )));
        }
        Ok(())
    }
}

impl KStorage for MemoryStorage {
    fn name(&self) -> &str {
        MEMORY_STORAGE_NAME
    }

    fn set(&self, key: &str, value: serde_json::Value) -> BoxFuture<'_, Result<(), ResourceError>> {
        let key = key.to_string();
        Box::pin(async move {
            self.ensure_open()?;
            let mut entries = self.entries.write().await;
            self.check_capacity(&entries, &key)?;
            entries.insert(key, value);
            Ok(())
        })
    }

    fn get(&self, key: &str) -> BoxFuture<'_, Result<Option<serde_json::Value>, ResourceError>> {
        let key = key.to_string();
        Box::pin(async move {
            self.ensure_open()?;
            Ok(self.entries.read().await.get(&key).cloned())
        })
    }

    fn increment(&self, key: &str, by: i64) -> BoxFuture<'_, Result<i64, ResourceError>> {
        let key = key.to_string();
        Box::pin(async move {
            self.ensure_open()?;
            let mut entries = self.entries.write().await;
            let current = match entries.get(&key) {
                None => 0,
                Some(v) => v.as_i64().ok_or_else(|| {
                    ResourceError::new(format!("value under '{key}' is not an integer"))
                })?,
            };
            self.check_capacity(&entries, &key)?;
            let next = current.checked_add(by).ok_or_else(|| {
                ResourceError::new(format!("incrementing '{key}' by {by} overflows"))
            })?;
            entries.insert(key, serde_json::Value::from(next));
            Ok(next)
        })
    }

    fn snapshot(
        &self,
    ) -> BoxFuture<'_, Result<serde_json::Map<String, serde_json::Value>, ResourceError>> {
        Box::pin(async move {
            self.ensure_open()?;
            let entries = self.entries.read().await;
            Ok(entries
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect())
        })
    }

    fn close(&self) -> BoxFuture<'_, Result<(), ResourceError>> {
        Box::pin(async move {
            if self.closed.swap(true, Ordering::AcqRel) {
                tracing::debug!("memory storage closed twice");
            }
            self.entries.write().await.clear();
            Ok(())
        })
    }
}

// ═══════════════════════════════════════════════════════════════
//  MemoryStorageFactory
// ═══════════════════════════════════════════════════════════════

/// Default storage implementation of the stream factory.
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryStorageFactory;

impl StorageFactory for MemoryStorageFactory {
    fn name(&self) -> &str {
        MEMORY_STORAGE_NAME
    }

    fn create(&self, options: &StorageOptions) -> Result<Arc<dyn KStorage>, ResourceError> {
        let config = MemoryStorageConfig::from_options(options)?;
        Ok(Arc::new(MemoryStorage::new(config.max_keys)))
    }
}
