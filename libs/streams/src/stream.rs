use std::sync::{Arc, Weak};

use kstreams_api::{BrokerConnection, KStorage, KafkaMessage, ResourceError};

use crate::factory::KafkaStreams;

/// A topic seen as an unbounded sequence of change events.
///
/// The view owns nothing the factory doesn't also track: its connection
/// and storage stay registered in the factory that issued them.
pub struct KStream {
    topic: String,
    storage: Arc<dyn KStorage>,
    connection: Arc<dyn BrokerConnection>,
    factory: Weak<KafkaStreams>,
}

impl std::fmt::Debug for KStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KStream")
            .field("topic", &self.topic)
            .field("storage", &self.storage.name())
            .finish()
    }
}

impl KStream {
    pub fn new(
        topic: impl Into<String>,
        storage: Arc<dyn KStorage>,
        connection: Arc<dyn BrokerConnection>,
    ) -> Self {
        Self {
            topic: topic.into(),
            storage,
            connection,
            factory: Weak::new(),
        }
    }

    /// Point the view back at the factory that created it (non-owning).
    pub fn set_factory_reference(&mut self, factory: &Arc<KafkaStreams>) {
        self.factory = Arc::downgrade(factory);
    }

    /// The creating factory, if it is still alive.
    pub fn factory(&self) -> Option<Arc<KafkaStreams>> {
        self.factory.upgrade()
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn storage(&self) -> &Arc<dyn KStorage> {
        &self.storage
    }

    pub fn connection(&self) -> &Arc<dyn BrokerConnection> {
        &self.connection
    }

    /// Append a change event to the topic.
    pub async fn produce(
        &self,
        key: Option<String>,
        value: serde_json::Value,
    ) -> Result<u64, ResourceError> {
        self.connection.send(key, value).await
    }

    /// Next batch of change events.
    pub async fn poll(&self, max: usize) -> Result<Vec<KafkaMessage>, ResourceError> {
        self.connection.poll(max).await
    }
}
