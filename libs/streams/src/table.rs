use std::sync::{Arc, Weak};

use kstreams_api::{BrokerConnection, KStorage, KafkaMessage, ResourceError};

use crate::factory::KafkaStreams;

/// Maps a record to the `(key, value)` a table keeps for it.
/// `None` skips the record.
pub type KeyMapEtl = Arc<dyn Fn(&KafkaMessage) -> Option<(String, serde_json::Value)> + Send + Sync>;

/// Use the record's own key; keyless records are skipped.
pub fn key_from_message() -> KeyMapEtl {
    Arc::new(|msg: &KafkaMessage| msg.key.clone().map(|k| (k, msg.value.clone())))
}

/// Use a field of the record's value as the key (dot-separated path).
/// String fields are taken as-is, other scalars are rendered as JSON.
pub fn key_from_field(path: impl Into<String>) -> KeyMapEtl {
    let path = path.into();
    Arc::new(move |msg: &KafkaMessage| {
        let mut current = &msg.value;
        for segment in path.split('.') {
            current = current.get(segment)?;
        }
        let key = match current {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Null
            | serde_json::Value::Array(_)
            | serde_json::Value::Object(_) => return None,
            other => other.to_string(),
        };
        Some((key, msg.value.clone()))
    })
}

/// A topic seen as a keyed, compacted view: the storage holds the latest
/// value per key.
pub struct KTable {
    topic: String,
    key_map: KeyMapEtl,
    storage: Arc<dyn KStorage>,
    connection: Arc<dyn BrokerConnection>,
    factory: Weak<KafkaStreams>,
}

impl std::fmt::Debug for KTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KTable")
            .field("topic", &self.topic)
            .field("storage", &self.storage.name())
            .finish()
    }
}

impl KTable {
    pub fn new(
        topic: impl Into<String>,
        key_map: KeyMapEtl,
        storage: Arc<dyn KStorage>,
        connection: Arc<dyn BrokerConnection>,
    ) -> Self {
        Self {
            topic: topic.into(),
            key_map,
            storage,
            connection,
            factory: Weak::new(),
        }
    }

    pub fn set_factory_reference(&mut self, factory: &Arc<KafkaStreams>) {
        self.factory = Arc::downgrade(factory);
    }

    pub fn factory(&self) -> Option<Arc<KafkaStreams>> {
        self.factory.upgrade()
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn key_map(&self) -> &KeyMapEtl {
        &self.key_map
    }

    pub fn storage(&self) -> &Arc<dyn KStorage> {
        &self.storage
    }

    pub fn connection(&self) -> &Arc<dyn BrokerConnection> {
        &self.connection
    }

    /// Upsert the record's key into the table. Returns `false` when the
    /// key map skipped the record.
    pub async fn apply(&self, message: &KafkaMessage) -> Result<bool, ResourceError> {
        match (self.key_map)(message) {
            Some((key, value)) => {
                self.storage.set(&key, value).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Poll up to `max` records and apply each. Returns how many produced a key.
    ///
    /// If a record fails to apply, the cursor is moved back to it before the
    /// error is returned, so the next `sync` retries it and the rest of the batch.
    pub async fn sync(&self, max: usize) -> Result<usize, ResourceError> {
        let batch = self.connection.poll(max).await?;
        let mut applied = 0;
        for message in &batch {
            match self.apply(message).await {
                Ok(true) => applied += 1,
                Ok(false) => {}
                Err(err) => {
                    tracing::warn!(
                        topic = %self.topic,
                        offset = message.offset,
                        error = %err,
                        "apply failed, rewinding"
                    );
                    self.connection.seek(message.offset).await?;
                    return Err(err);
                }
            }
        }
        tracing::debug!(topic = %self.topic, polled = batch.len(), applied, "table synced");
        Ok(applied)
    }

    pub async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, ResourceError> {
        self.storage.get(key).await
    }

    /// Current table contents.
    pub async fn snapshot(
        &self,
    ) -> Result<serde_json::Map<String, serde_json::Value>, ResourceError> {
        self.storage.snapshot().await
    }
}
