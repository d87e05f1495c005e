#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use kstreams::api::{
    BoxFuture, BrokerConnection, ClientStats, ConnectionFactory, KStorage, KafkaMessage,
    ResourceError, STORAGE_CAPABILITY_VERSION, StorageFactory, StorageOptions,
};

// ═══════════════════════════════════════════════════════════════
//  Storage doubles
// ═══════════════════════════════════════════════════════════════

/// Storage that counts its closes and optionally fails them.
pub struct RecordingStorage {
    version: u32,
    fail_close: bool,
    closes: Arc<AtomicUsize>,
}

impl KStorage for RecordingStorage {
    fn name(&self) -> &str {
        "recording"
    }

    fn capability_version(&self) -> u32 {
        self.version
    }

    fn set(&self, _key: &str, _value: serde_json::Value) -> BoxFuture<'_, Result<(), ResourceError>> {
        Box::pin(async { Ok(()) })
    }

    fn get(&self, _key: &str) -> BoxFuture<'_, Result<Option<serde_json::Value>, ResourceError>> {
        Box::pin(async { Ok(None) })
    }

    fn increment(&self, _key: &str, by: i64) -> BoxFuture<'_, Result<i64, ResourceError>> {
        Box::pin(async move { Ok(by) })
    }

    fn snapshot(
        &self,
    ) -> BoxFuture<'_, Result<serde_json::Map<String, serde_json::Value>, ResourceError>> {
        Box::pin(async { Ok(serde_json::Map::new()) })
    }

    fn close(&self) -> BoxFuture<'_, Result<(), ResourceError>> {
        Box::pin(async move {
            self.closes.fetch_add(1, Ordering::SeqCst);
            if self.fail_close {
                return Err(ResourceError::io("disk went away"));
            }
            Ok(())
        })
    }
}

/// Storage implementation with knobs for every validation outcome.
pub struct RecordingStorageFactory {
    pub version: u32,
    pub constructible: bool,
    pub fail_close: bool,
    pub created: Arc<AtomicUsize>,
    pub closes: Arc<AtomicUsize>,
    pub last_options: std::sync::Mutex<Option<StorageOptions>>,
}

impl Default for RecordingStorageFactory {
    fn default() -> Self {
        Self {
            version: STORAGE_CAPABILITY_VERSION,
            constructible: true,
            fail_close: false,
            created: Arc::new(AtomicUsize::new(0)),
            closes: Arc::new(AtomicUsize::new(0)),
            last_options: std::sync::Mutex::new(None),
        }
    }
}

impl RecordingStorageFactory {
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

impl StorageFactory for RecordingStorageFactory {
    fn name(&self) -> &str {
        "recording"
    }

    fn create(&self, options: &StorageOptions) -> Result<Arc<dyn KStorage>, ResourceError> {
        if !self.constructible {
            return Err(ResourceError::config("constructor exploded"));
        }
        self.created.fetch_add(1, Ordering::SeqCst);
        *self.last_options.lock().unwrap() = Some(options.clone());
        Ok(Arc::new(RecordingStorage {
            version: self.version,
            fail_close: self.fail_close,
            closes: self.closes.clone(),
        }))
    }
}

/// Memory storage whose first write of one key fails.
pub struct FlakyStorage {
    inner: storage_memory::MemoryStorage,
    fail_once_on: std::sync::Mutex<Option<String>>,
}

impl FlakyStorage {
    pub fn failing_once_on(key: &str) -> Self {
        Self {
            inner: storage_memory::MemoryStorage::new(1024),
            fail_once_on: std::sync::Mutex::new(Some(key.to_string())),
        }
    }
}

impl KStorage for FlakyStorage {
    fn name(&self) -> &str {
        "flaky"
    }

    fn set(&self, key: &str, value: serde_json::Value) -> BoxFuture<'_, Result<(), ResourceError>> {
        let fail = {
            let mut armed = self.fail_once_on.lock().unwrap();
            if armed.as_deref() == Some(key) {
                *armed = None;
                true
            } else {
                false
            }
        };
        if fail {
            let key = key.to_string();
            return Box::pin(async move { Err(ResourceError::io(format!("write of '{key}' failed"))) });
        }
        self.inner.set(key, value)
    }

    fn get(&self, key: &str) -> BoxFuture<'_, Result<Option<serde_json::Value>, ResourceError>> {
        self.inner.get(key)
    }

    fn increment(&self, key: &str, by: i64) -> BoxFuture<'_, Result<i64, ResourceError>> {
        self.inner.increment(key, by)
    }

    fn snapshot(
        &self,
    ) -> BoxFuture<'_, Result<serde_json::Map<String, serde_json::Value>, ResourceError>> {
        self.inner.snapshot()
    }

    fn close(&self) -> BoxFuture<'_, Result<(), ResourceError>> {
        self.inner.close()
    }
}

// ═══════════════════════════════════════════════════════════════
//  Connection doubles
// ═══════════════════════════════════════════════════════════════

pub struct RecordingConnection {
    topic: String,
    fail_close: bool,
    closes: Arc<AtomicUsize>,
}

impl BrokerConnection for RecordingConnection {
    fn topic(&self) -> &str {
        &self.topic
    }

    fn stats(&self) -> ClientStats {
        ClientStats {
            client_id: "recording".into(),
            topic: self.topic.clone(),
            connected: self.closes.load(Ordering::SeqCst) == 0,
            produced: 0,
            consumed: 0,
            next_offset: 0,
            created_at_ms: 0,
        }
    }

    fn send(
        &self,
        _key: Option<String>,
        _value: serde_json::Value,
    ) -> BoxFuture<'_, Result<u64, ResourceError>> {
        Box::pin(async { Ok(0) })
    }

    fn poll(&self, _max: usize) -> BoxFuture<'_, Result<Vec<KafkaMessage>, ResourceError>> {
        Box::pin(async { Ok(Vec::new()) })
    }

    fn seek(&self, _offset: u64) -> BoxFuture<'_, Result<(), ResourceError>> {
        Box::pin(async { Ok(()) })
    }

    fn close(&self) -> BoxFuture<'_, Result<(), ResourceError>> {
        Box::pin(async move {
            self.closes.fetch_add(1, Ordering::SeqCst);
            if self.fail_close {
                return Err(ResourceError::io(format!("broker refused to close '{}'", self.topic)));
            }
            Ok(())
        })
    }
}

/// Connection factory counting closes; connections to `fail_close_topic`
/// fail to close, connections to `unreachable_topic` cannot be created.
#[derive(Default)]
pub struct RecordingConnectionFactory {
    pub fail_close_topic: Option<String>,
    pub unreachable_topic: Option<String>,
    pub closes: Arc<AtomicUsize>,
}

impl RecordingConnectionFactory {
    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

impl ConnectionFactory for RecordingConnectionFactory {
    fn name(&self) -> &str {
        "recording"
    }

    fn connect(&self, topic: &str) -> Result<Arc<dyn BrokerConnection>, ResourceError> {
        if self.unreachable_topic.as_deref() == Some(topic) {
            return Err(ResourceError::io(format!("no leader for '{topic}'")));
        }
        Ok(Arc::new(RecordingConnection {
            topic: topic.to_string(),
            fail_close: self.fail_close_topic.as_deref() == Some(topic),
            closes: self.closes.clone(),
        }))
    }
}
