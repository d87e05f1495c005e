mod common;

use std::sync::Arc;

use serde_json::json;

use common::{RecordingConnectionFactory, RecordingStorageFactory};
use kstreams::api::{ErrorKind, StorageFactory, STORAGE_CAPABILITY_VERSION};
use kstreams::{KafkaStreams, ResourceKind, StreamsConfig, StreamsError, key_from_message};

fn recording_factory(
    storage: Arc<RecordingStorageFactory>,
    connections: Arc<RecordingConnectionFactory>,
) -> Arc<KafkaStreams> {
    KafkaStreams::builder(StreamsConfig::default())
        .storage(storage)
        .connection_factory(connections)
        .build()
        .unwrap()
}

// ── construction & validation ──

#[test]
fn test_default_factory_builds() {
    let factory = KafkaStreams::new(StreamsConfig::default()).unwrap();
    assert_eq!(factory.storage_name(), "memory");
    assert_eq!(factory.connection_count(), 0);
    assert_eq!(factory.storage_count(), 0);
}

#[test]
fn test_unconstructible_storage_is_config_error() {
    let storage = Arc::new(RecordingStorageFactory {
        constructible: false,
        ..Default::default()
    });
    let err = KafkaStreams::builder(StreamsConfig::default())
        .storage(storage)
        .build()
        .unwrap_err();

    assert!(err.is_config());
    assert!(matches!(err, StreamsError::StorageNotConstructible { .. }));
    assert!(err.to_string().contains("must be constructible"));
}

#[test]
fn test_incompatible_storage_is_config_error() {
    let storage = Arc::new(RecordingStorageFactory {
        version: STORAGE_CAPABILITY_VERSION + 1,
        ..Default::default()
    });
    let err = KafkaStreams::builder(StreamsConfig::default())
        .storage(storage.clone())
        .build()
        .unwrap_err();

    assert!(err.is_config());
    match err {
        StreamsError::StorageCapability { found, expected, .. } => {
            assert_eq!(found, STORAGE_CAPABILITY_VERSION + 1);
            assert_eq!(expected, STORAGE_CAPABILITY_VERSION);
        }
        other => panic!("unexpected error: {other}"),
    }
    // The probe was built (construction itself succeeded) but never closed.
    assert_eq!(storage.created(), 1);
    assert_eq!(storage.closes(), 0);
}

#[test]
fn test_skip_storage_check_never_fails() {
    for storage in [
        RecordingStorageFactory {
            constructible: false,
            ..Default::default()
        },
        RecordingStorageFactory {
            version: 0,
            ..Default::default()
        },
    ] {
        let storage = Arc::new(storage);
        let factory = KafkaStreams::builder(StreamsConfig::default())
            .storage(storage.clone())
            .skip_storage_check(true)
            .build()
            .unwrap();
        assert_eq!(storage.created(), 0);
        assert_eq!(factory.storage_count(), 0);
    }
}

#[test]
fn test_probe_is_not_registered() {
    let storage = Arc::new(RecordingStorageFactory::default());
    let factory = recording_factory(storage.clone(), Arc::default());

    assert_eq!(storage.created(), 1);
    assert_eq!(factory.storage_count(), 0);
    assert_eq!(factory.connection_count(), 0);
}

#[test]
fn test_check_storage_standalone() {
    assert!(KafkaStreams::check_storage(&storage_memory::MemoryStorageFactory).is_ok());
    let broken = RecordingStorageFactory {
        constructible: false,
        ..Default::default()
    };
    assert!(KafkaStreams::check_storage(&broken).is_err());
}

#[test]
fn test_invalid_broker_config_fails_build() {
    let config = StreamsConfig {
        broker: kstreams::BrokerConfig::Memory {
            max_messages_per_topic: 0,
        },
        ..StreamsConfig::default()
    };
    let err = KafkaStreams::new(config).unwrap_err();
    assert!(err.is_config());
}

// ── acquisition ──

#[test]
fn test_connections_are_never_shared() {
    let factory = KafkaStreams::new(StreamsConfig::default()).unwrap();
    let a = factory.get_connection("orders").unwrap();
    let b = factory.get_connection("orders").unwrap();

    assert!(!Arc::ptr_eq(&a, &b));
    assert_eq!(factory.connection_count(), 2);
}

#[test]
fn test_storage_receives_options() {
    let storage = Arc::new(RecordingStorageFactory::default());
    let factory = KafkaStreams::builder(StreamsConfig::default())
        .storage(storage.clone())
        .storage_options(json!({"path": "/tmp/state"}))
        .build()
        .unwrap();

    factory.get_storage().unwrap();
    factory.get_storage().unwrap();
    assert_eq!(factory.storage_count(), 2);
    assert_eq!(
        *storage.last_options.lock().unwrap(),
        Some(json!({"path": "/tmp/state"}))
    );
}

#[test]
fn test_views_register_one_of_each() {
    let factory = KafkaStreams::new(StreamsConfig::default()).unwrap();

    factory.get_kstream("orders", None).unwrap();
    assert_eq!(factory.connection_count(), 1);
    assert_eq!(factory.storage_count(), 1);

    factory.get_ktable("orders", |_| None, None).unwrap();
    assert_eq!(factory.connection_count(), 2);
    assert_eq!(factory.storage_count(), 2);
}

#[test]
fn test_supplied_storage_is_not_registered_again() {
    let factory = KafkaStreams::new(StreamsConfig::default()).unwrap();
    let shared = factory.get_storage().unwrap();
    assert_eq!(factory.storage_count(), 1);

    let stream = factory.get_kstream("orders", Some(shared.clone())).unwrap();
    let table = factory
        .get_ktable_with("customers", key_from_message(), Some(shared.clone()))
        .unwrap();

    assert!(Arc::ptr_eq(stream.storage(), &shared));
    assert!(Arc::ptr_eq(table.storage(), &shared));
    assert_eq!(factory.storage_count(), 1);
    assert_eq!(factory.connection_count(), 2);
}

#[test]
fn test_connection_errors_propagate_unchanged() {
    let connections = Arc::new(RecordingConnectionFactory {
        unreachable_topic: Some("ghost".into()),
        ..Default::default()
    });
    let factory = recording_factory(Arc::default(), connections);

    let err = factory.get_kstream("ghost", None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
    assert_eq!(err.message(), "no leader for 'ghost'");

    // The storage was acquired before the connection failed and stays tracked.
    assert_eq!(factory.storage_count(), 1);
    assert_eq!(factory.connection_count(), 0);
}

#[test]
fn test_storage_errors_propagate_unchanged() {
    let storage = Arc::new(RecordingStorageFactory {
        constructible: false,
        ..Default::default()
    });
    let factory = KafkaStreams::builder(StreamsConfig::default())
        .storage(storage)
        .skip_storage_check(true)
        .build()
        .unwrap();

    let err = factory.get_kstream("orders", None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
    assert_eq!(err.message(), "constructor exploded");
    assert_eq!(factory.connection_count(), 0);
}

// ── statistics ──

#[test]
fn test_stats_in_creation_order() {
    let factory = KafkaStreams::new(StreamsConfig::new("stats-app")).unwrap();
    let topics = ["a", "b", "c", "a", "d"];
    for topic in topics {
        factory.get_connection(topic).unwrap();
    }

    let stats = factory.stats();
    assert_eq!(stats.len(), topics.len());
    let seen: Vec<&str> = stats.iter().map(|s| s.topic.as_str()).collect();
    assert_eq!(seen, topics);
    assert!(stats.iter().all(|s| s.client_id == "stats-app"));
}

#[tokio::test]
async fn test_stats_include_closed_connections() {
    let factory = KafkaStreams::new(StreamsConfig::default()).unwrap();
    let conn = factory.get_connection("orders").unwrap();
    conn.close().await.unwrap();

    let stats = factory.stats();
    assert_eq!(stats.len(), 1);
    assert!(!stats[0].connected);
}

// ── teardown ──

#[tokio::test]
async fn test_close_all_empties_registries() {
    let factory = KafkaStreams::new(StreamsConfig::default()).unwrap();
    factory.get_kstream("orders", None).unwrap();
    factory.get_connection("payments").unwrap();

    let report = factory.close_all().await;
    assert!(report.is_clean());
    assert_eq!(report.connections_released, 2);
    assert_eq!(report.storages_released, 1);

    assert_eq!(factory.connection_count(), 0);
    assert_eq!(factory.storage_count(), 0);
    assert!(factory.stats().is_empty());
}

#[tokio::test]
async fn test_orders_walkthrough() {
    let storage = Arc::new(RecordingStorageFactory::default());
    let connections = Arc::new(RecordingConnectionFactory::default());
    let factory = recording_factory(storage.clone(), connections.clone());

    let _stream = factory.get_kstream("orders", None).unwrap();
    assert_eq!(factory.connection_count(), 1);
    assert_eq!(factory.storage_count(), 1);

    let _table = factory.get_ktable("orders", |_| None, None).unwrap();
    assert_eq!(factory.connection_count(), 2);
    assert_eq!(factory.storage_count(), 2);

    let report = factory.close_all().await;
    assert!(report.is_clean());
    assert_eq!(factory.connection_count(), 0);
    assert_eq!(factory.storage_count(), 0);
    assert_eq!(connections.closes(), 2);
    assert_eq!(storage.closes(), 2);
}

#[tokio::test]
async fn test_second_close_all_closes_nothing() {
    let storage = Arc::new(RecordingStorageFactory::default());
    let connections = Arc::new(RecordingConnectionFactory::default());
    let factory = recording_factory(storage.clone(), connections.clone());
    factory.get_kstream("orders", None).unwrap();

    factory.close_all().await;
    let second = factory.close_all().await;

    assert!(second.is_clean());
    assert_eq!(second.connections_released, 0);
    assert_eq!(second.storages_released, 0);
    assert_eq!(connections.closes(), 1);
    assert_eq!(storage.closes(), 1);
}

#[tokio::test]
async fn test_failing_close_does_not_stop_others() {
    let storage = Arc::new(RecordingStorageFactory {
        fail_close: true,
        ..Default::default()
    });
    let connections = Arc::new(RecordingConnectionFactory {
        fail_close_topic: Some("b".into()),
        ..Default::default()
    });
    let factory = recording_factory(storage.clone(), connections.clone());
    for topic in ["a", "b", "c"] {
        factory.get_kstream(topic, None).unwrap();
    }

    let report = factory.close_all().await;
    assert_eq!(connections.closes(), 3);
    assert_eq!(storage.closes(), 3);
    assert_eq!(factory.connection_count(), 0);
    assert_eq!(factory.storage_count(), 0);

    assert_eq!(report.failures.len(), 4);
    assert_eq!(report.failures[0].kind, ResourceKind::Connection);
    assert_eq!(report.failures[0].name, "b");
    assert!(
        report.failures[1..]
            .iter()
            .all(|f| f.kind == ResourceKind::Storage)
    );

    let err = report.into_result().unwrap_err();
    assert!(matches!(err, StreamsError::Teardown { count: 4, .. }));
}

#[tokio::test]
async fn test_resources_after_teardown_are_untracked() {
    let factory = KafkaStreams::new(StreamsConfig::default()).unwrap();
    factory.get_connection("orders").unwrap();
    factory.close_all().await;

    factory.get_connection("orders").unwrap();
    assert_eq!(factory.connection_count(), 1);
    assert_eq!(factory.stats().len(), 1);
    assert!(factory.stats()[0].connected);
}

#[test]
fn test_memory_storage_factory_is_default() {
    let factory = KafkaStreams::new(StreamsConfig::default()).unwrap();
    let storage = factory.get_storage().unwrap();
    assert_eq!(storage.name(), storage_memory::MemoryStorageFactory.name());
}
