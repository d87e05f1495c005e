//! In-process broker: one append-only log per topic, shared by every
//! connection created from the same [`MemoryBroker`].

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::{Mutex, RwLock};

use kstreams_api::{
    BoxFuture, BrokerConnection, ClientStats, ConnectionFactory, KafkaMessage, ResourceError,
    now_ms,
};

pub const MEMORY_BROKER_NAME: &str = "memory";

fn default_max_messages() -> usize {
    100_000
}

// ═══════════════════════════════════════════════════════════════
//  MemoryBroker
// ═══════════════════════════════════════════════════════════════

/// Shared topic logs. Cloning shares the same logs.
#[derive(Clone)]
pub struct MemoryBroker {
    topics: Arc<RwLock<HashMap<String, Vec<KafkaMessage>>>>,
    max_messages_per_topic: usize,
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new(default_max_messages())
    }
}

impl MemoryBroker {
    pub fn new(max_messages_per_topic: usize) -> Self {
        Self {
            topics: Arc::new(RwLock::new(HashMap::new())),
            max_messages_per_topic,
        }
    }

    /// Number of records currently in `topic`'s log.
    pub async fn topic_len(&self, topic: &str) -> usize {
        self.topics.read().await.get(topic).map_or(0, Vec::len)
    }

    async fn append(
        &self,
        topic: &str,
        key: Option<String>,
        value: serde_json::Value,
    ) -> Result<u64, ResourceError> {
        let mut topics = self.topics.write().await;
        let log = topics.entry(topic.to_string()).or_default();
        if log.len() >= self.max_messages_per_topic {
            return Err(ResourceError::io(format!(
                "topic '{topic}' is full ({} messages)",
                self.max_messages_per_topic
            )));
        }
        let offset = log.len() as u64;
        log.push(KafkaMessage {
            topic: topic.to_string(),
            partition: 0,
            offset,
            key,
            value,
            timestamp_ms: now_ms(),
        });
        Ok(offset)
    }

    async fn read(&self, topic: &str, from: u64, max: usize) -> Vec<KafkaMessage> {
        let topics = self.topics.read().await;
        match topics.get(topic) {
            Some(log) => log.iter().skip(from as usize).take(max).cloned().collect(),
            None => Vec::new(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  MemoryConnection
// ═══════════════════════════════════════════════════════════════

/// Connection to one topic of a [`MemoryBroker`], with its own cursor.
pub struct MemoryConnection {
    broker: MemoryBroker,
    client_id: String,
    topic: String,
    /// Held for the whole read-and-advance so concurrent polls never
    /// hand out the same offsets.
    cursor: Mutex<u64>,
    /// Copy of `cursor` for `stats()`, which cannot await the lock.
    next_offset: AtomicU64,
    produced: AtomicU64,
    consumed: AtomicU64,
    closed: AtomicBool,
    created_at_ms: i64,
}

impl MemoryConnection {
    pub fn new(broker: MemoryBroker, client_id: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            broker,
            client_id: client_id.into(),
            topic: topic.into(),
            cursor: Mutex::new(0),
            next_offset: AtomicU64::new(0),
            produced: AtomicU64::new(0),
            consumed: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            created_at_ms: now_ms(),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> Result<(), ResourceError> {
        if self.is_closed() {
            return Err(ResourceError::closed(format!("connection to topic '{}'", self.topic)));
        }
        Ok(())
    }
}

impl BrokerConnection for MemoryConnection {
    fn topic(&self) -> &str {
        &self.topic
    }

    fn stats(&self) -> ClientStats {
        ClientStats {
            client_id: self.client_id.clone(),
            topic: self.topic.clone(),
            connected: !self.is_closed(),
            produced: self.produced.load(Ordering::Relaxed),
            consumed: self.consumed.load(Ordering::Relaxed),
            next_offset: self.next_offset.load(Ordering::Relaxed),
            created_at_ms: self.created_at_ms,
        }
    }

    fn send(
        &self,
        key: Option<String>,
        value: serde_json::Value,
    ) -> BoxFuture<'_, Result<u64, ResourceError>> {
        Box::pin(async move {
            self.ensure_open()?;
            let offset = self.broker.append(&self.topic, key, value).await?;
            self.produced.fetch_add(1, Ordering::Relaxed);
            Ok(offset)
        })
    }

    fn poll(&self, max: usize) -> BoxFuture<'_, Result<Vec<KafkaMessage>, ResourceError>> {
        Box::pin(async move {
            self.ensure_open()?;
            let mut cursor = self.cursor.lock().await;
            let batch = self.broker.read(&self.topic, *cursor, max).await;
            if let Some(last) = batch.last() {
                *cursor = last.offset + 1;
                self.next_offset.store(*cursor, Ordering::Release);
                self.consumed.fetch_add(batch.len() as u64, Ordering::Relaxed);
            }
            Ok(batch)
        })
    }

    fn seek(&self, offset: u64) -> BoxFuture<'_, Result<(), ResourceError>> {
        Box::pin(async move {
            self.ensure_open()?;
            let mut cursor = self.cursor.lock().await;
            *cursor = offset;
            self.next_offset.store(offset, Ordering::Release);
            tracing::debug!(topic = %self.topic, offset, "cursor moved");
            Ok(())
        })
    }

    fn close(&self) -> BoxFuture<'_, Result<(), ResourceError>> {
        Box::pin(async move {
            if self.closed.swap(true, Ordering::AcqRel) {
                tracing::debug!(topic = %self.topic, "memory connection closed twice");
            }
            Ok(())
        })
    }
}

// ═══════════════════════════════════════════════════════════════
//  MemoryConnectionFactory
// ═══════════════════════════════════════════════════════════════

pub struct MemoryConnectionFactory {
    broker: MemoryBroker,
    client_id: String,
}

impl MemoryConnectionFactory {
    pub fn new(broker: MemoryBroker, client_id: impl Into<String>) -> Self {
        Self {
            broker,
            client_id: client_id.into(),
        }
    }

    pub fn broker(&self) -> &MemoryBroker {
        &self.broker
    }
}

impl ConnectionFactory for MemoryConnectionFactory {
    fn name(&self) -> &str {
        MEMORY_BROKER_NAME
    }

    fn connect(&self, topic: &str) -> Result<Arc<dyn BrokerConnection>, ResourceError> {
        if topic.is_empty() {
            return Err(ResourceError::config("topic name must not be empty"));
        }
        Ok(Arc::new(MemoryConnection::new(
            self.broker.clone(),
            self.client_id.clone(),
            topic,
        )))
    }
}
