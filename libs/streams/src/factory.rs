use std::sync::{Arc, Mutex, MutexGuard};

use kstreams_api::{
    BrokerConnection, ClientStats, ConnectionFactory, KStorage, KafkaMessage, ResourceError,
    STORAGE_CAPABILITY_VERSION, StorageFactory, StorageOptions,
};
use storage_memory::MemoryStorageFactory;

use crate::broker::connection_factory_from_config;
use crate::config::StreamsConfig;
use crate::error::StreamsError;
use crate::registry::{ResourceId, ResourceRegistry};
use crate::stream::KStream;
use crate::table::{KTable, KeyMapEtl};

// ═══════════════════════════════════════════════════════════════
//  Teardown report
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Connection,
    Storage,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKind::Connection => f.write_str("connection"),
            ResourceKind::Storage => f.write_str("storage"),
        }
    }
}

/// One resource whose `close()` failed during [`KafkaStreams::close_all`].
#[derive(Debug, Clone)]
pub struct CloseFailure {
    pub kind: ResourceKind,
    pub id: ResourceId,
    /// Topic for connections, implementation name for storages.
    pub name: String,
    pub error: ResourceError,
}

/// Outcome of [`KafkaStreams::close_all`].
#[derive(Debug, Clone, Default)]
pub struct CloseReport {
    /// Connections taken out of the registry (closed or not).
    pub connections_released: usize,
    /// Storages taken out of the registry (closed or not).
    pub storages_released: usize,
    pub failures: Vec<CloseFailure>,
}

impl CloseReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// `Err` carrying the first failure if any close failed.
    pub fn into_result(self) -> Result<Self, StreamsError> {
        match self.failures.first() {
            None => Ok(self),
            Some(first) => Err(StreamsError::Teardown {
                count: self.failures.len(),
                first: first.error.clone(),
            }),
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  KafkaStreams
// ═══════════════════════════════════════════════════════════════

/// Factory for [`KStream`] and [`KTable`] views.
///
/// Every connection and storage it issues is registered until
/// [`close_all`](Self::close_all), so they can be inspected and torn
/// down together. Views only point back at the factory weakly.
pub struct KafkaStreams {
    config: StreamsConfig,
    connection_factory: Arc<dyn ConnectionFactory>,
    storage_factory: Arc<dyn StorageFactory>,
    storage_options: StorageOptions,
    connections: Mutex<ResourceRegistry<dyn BrokerConnection>>,
    storages: Mutex<ResourceRegistry<dyn KStorage>>,
}

impl std::fmt::Debug for KafkaStreams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KafkaStreams")
            .field("client_id", &self.config.client_id)
            .field("broker", &self.connection_factory.name())
            .field("storage", &self.storage_factory.name())
            .field("connections", &self.connection_count())
            .field("storages", &self.storage_count())
            .finish()
    }
}

fn lock_registry<'a, T: ?Sized>(
    registry: &'a Mutex<ResourceRegistry<T>>,
    what: &str,
) -> MutexGuard<'a, ResourceRegistry<T>> {
    match registry.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!(registry = what, "registry lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

impl KafkaStreams {
    /// Factory with the built-in memory storage and default options.
    pub fn new(config: StreamsConfig) -> Result<Arc<Self>, StreamsError> {
        Self::builder(config).build()
    }

    pub fn builder(config: StreamsConfig) -> KafkaStreamsBuilder {
        KafkaStreamsBuilder::new(config)
    }

    /// Probe a storage implementation with a throwaway instance.
    ///
    /// The instance is built without options, checked against the host's
    /// storage contract version and dropped again.
    pub fn check_storage(factory: &dyn StorageFactory) -> Result<(), StreamsError> {
        let probe = factory
            .probe()
            .map_err(|source| StreamsError::StorageNotConstructible {
                name: factory.name().to_string(),
                source,
            })?;

        let found = probe.capability_version();
        if found != STORAGE_CAPABILITY_VERSION {
            return Err(StreamsError::StorageCapability {
                name: factory.name().to_string(),
                found,
                expected: STORAGE_CAPABILITY_VERSION,
            });
        }
        Ok(())
    }

    pub fn config(&self) -> &StreamsConfig {
        &self.config
    }

    pub fn storage_name(&self) -> &str {
        self.storage_factory.name()
    }

    pub fn connection_count(&self) -> usize {
        lock_registry(&self.connections, "connections").len()
    }

    pub fn storage_count(&self) -> usize {
        lock_registry(&self.storages, "storages").len()
    }

    /// New connection bound to `topic`. Never reuses an existing one.
    pub fn get_connection(&self, topic: &str) -> Result<Arc<dyn BrokerConnection>, ResourceError> {
        let connection = self.connection_factory.connect(topic)?;
        let id = lock_registry(&self.connections, "connections").insert(connection.clone());
        tracing::debug!(topic = %topic, id = %id, "connection created");
        Ok(connection)
    }

    /// New storage instance built with this factory's options.
    pub fn get_storage(&self) -> Result<Arc<dyn KStorage>, ResourceError> {
        let storage = self.storage_factory.create(&self.storage_options)?;
        let id = lock_registry(&self.storages, "storages").insert(storage.clone());
        tracing::debug!(storage = %self.storage_factory.name(), id = %id, "storage created");
        Ok(storage)
    }

    /// Stream view of `topic`.
    ///
    /// A caller-supplied `storage` is used as-is and not registered again.
    /// The connection is always new.
    pub fn get_kstream(
        self: &Arc<Self>,
        topic: &str,
        storage: Option<Arc<dyn KStorage>>,
    ) -> Result<KStream, ResourceError> {
        let storage = match storage {
            Some(storage) => storage,
            None => self.get_storage()?,
        };
        let connection = self.get_connection(topic)?;

        let mut stream = KStream::new(topic, storage, connection);
        stream.set_factory_reference(self);
        Ok(stream)
    }

    /// Table view of `topic`, compacted by the key `key_map` extracts.
    pub fn get_ktable<F>(
        self: &Arc<Self>,
        topic: &str,
        key_map: F,
        storage: Option<Arc<dyn KStorage>>,
    ) -> Result<KTable, ResourceError>
    where
        F: Fn(&KafkaMessage) -> Option<(String, serde_json::Value)> + Send + Sync + 'static,
    {
        self.get_ktable_with(topic, Arc::new(key_map), storage)
    }

    /// Like [`get_ktable`](Self::get_ktable) with an already shared key map.
    pub fn get_ktable_with(
        self: &Arc<Self>,
        topic: &str,
        key_map: KeyMapEtl,
        storage: Option<Arc<dyn KStorage>>,
    ) -> Result<KTable, ResourceError> {
        let storage = match storage {
            Some(storage) => storage,
            None => self.get_storage()?,
        };
        let connection = self.get_connection(topic)?;

        let mut table = KTable::new(topic, key_map, storage, connection);
        table.set_factory_reference(self);
        Ok(table)
    }

    /// Statistics of every registered connection, in creation order.
    ///
    /// Closed connections are included. The result grows with every
    /// connection created since the last teardown.
    pub fn stats(&self) -> Vec<ClientStats> {
        lock_registry(&self.connections, "connections")
            .iter()
            .map(|(_, connection)| connection.stats())
            .collect()
    }

    /// Close every connection, then every storage, this factory issued.
    ///
    /// Both registries are emptied before the first close runs. Each close
    /// is awaited in creation order; a failing close is logged and
    /// reported but does not stop the others.
    pub async fn close_all(&self) -> CloseReport {
        let connections = lock_registry(&self.connections, "connections").drain();
        let storages = lock_registry(&self.storages, "storages").drain();

        let mut report = CloseReport {
            connections_released: connections.len(),
            storages_released: storages.len(),
            failures: Vec::new(),
        };

        for (id, connection) in connections {
            if let Err(error) = connection.close().await {
                tracing::warn!(topic = %connection.topic(), id = %id, error = %error, "failed to close connection");
                report.failures.push(CloseFailure {
                    kind: ResourceKind::Connection,
                    id,
                    name: connection.topic().to_string(),
                    error,
                });
            }
        }

        for (id, storage) in storages {
            if let Err(error) = storage.close().await {
                tracing::warn!(storage = %storage.name(), id = %id, error = %error, "failed to close storage");
                report.failures.push(CloseFailure {
                    kind: ResourceKind::Storage,
                    id,
                    name: storage.name().to_string(),
                    error,
                });
            }
        }

        tracing::info!(
            connections = report.connections_released,
            storages = report.storages_released,
            failures = report.failures.len(),
            "closed all resources"
        );
        report
    }
}

impl Drop for KafkaStreams {
    fn drop(&mut self) {
        let connections = match self.connections.get_mut() {
            Ok(registry) => registry.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        };
        let storages = match self.storages.get_mut() {
            Ok(registry) => registry.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        };
        if connections + storages > 0 {
            tracing::warn!(
                connections,
                storages,
                "stream factory dropped without close_all, resources left open"
            );
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Builder
// ═══════════════════════════════════════════════════════════════

pub struct KafkaStreamsBuilder {
    config: StreamsConfig,
    storage: Option<Arc<dyn StorageFactory>>,
    storage_options: StorageOptions,
    skip_storage_check: bool,
    connection_factory: Option<Arc<dyn ConnectionFactory>>,
}

impl KafkaStreamsBuilder {
    pub fn new(config: StreamsConfig) -> Self {
        Self {
            config,
            storage: None,
            storage_options: StorageOptions::Null,
            skip_storage_check: false,
            connection_factory: None,
        }
    }

    /// Storage implementation. Defaults to [`MemoryStorageFactory`].
    pub fn storage(mut self, factory: Arc<dyn StorageFactory>) -> Self {
        self.storage = Some(factory);
        self
    }

    /// Options passed to every storage instance.
    pub fn storage_options(mut self, options: StorageOptions) -> Self {
        self.storage_options = options;
        self
    }

    /// Skip probing the storage implementation at build time.
    pub fn skip_storage_check(mut self, skip: bool) -> Self {
        self.skip_storage_check = skip;
        self
    }

    /// Use this connection factory instead of the one `config.broker` selects.
    pub fn connection_factory(mut self, factory: Arc<dyn ConnectionFactory>) -> Self {
        self.connection_factory = Some(factory);
        self
    }

    pub fn build(self) -> Result<Arc<KafkaStreams>, StreamsError> {
        let storage_factory: Arc<dyn StorageFactory> = match self.storage {
            Some(factory) => factory,
            None => Arc::new(MemoryStorageFactory),
        };

        if !self.skip_storage_check {
            KafkaStreams::check_storage(storage_factory.as_ref())?;
        }

        let connection_factory = match self.connection_factory {
            Some(factory) => factory,
            None => connection_factory_from_config(&self.config)?,
        };

        tracing::info!(
            client_id = %self.config.client_id,
            broker = %connection_factory.name(),
            storage = %storage_factory.name(),
            "stream factory created"
        );

        Ok(Arc::new(KafkaStreams {
            config: self.config,
            connection_factory,
            storage_factory,
            storage_options: self.storage_options,
            connections: Mutex::new(ResourceRegistry::new()),
            storages: Mutex::new(ResourceRegistry::new()),
        }))
    }
}
