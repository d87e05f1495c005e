use std::sync::Arc;

use serde::Serialize;

use kstreams::{CloseReport, KTable, KafkaStreams, key_from_field, key_from_message};
use kstreams_api::ClientStats;

use crate::config::{FileConfig, InspectArgs, ViewKind};
use crate::error::CliError;

/// Records pulled into each table before its snapshot is taken.
const TABLE_SYNC_BATCH: usize = 10_000;

#[derive(Serialize)]
struct InspectOutput {
    client_id: String,
    storage: String,
    stats: Vec<ClientStats>,
    tables: serde_json::Map<String, serde_json::Value>,
    teardown: TeardownOutput,
}

#[derive(Serialize)]
struct TeardownOutput {
    connections_released: usize,
    storages_released: usize,
    failures: Vec<String>,
}

impl From<&CloseReport> for TeardownOutput {
    fn from(report: &CloseReport) -> Self {
        Self {
            connections_released: report.connections_released,
            storages_released: report.storages_released,
            failures: report
                .failures
                .iter()
                .map(|f| format!("{} {} ({}): {}", f.kind, f.id, f.name, f.error))
                .collect(),
        }
    }
}

pub async fn run(args: InspectArgs) -> Result<(), CliError> {
    let config = FileConfig::load(&args.config)?;
    tracing::info!(config = %args.config, "loaded config");

    if config.topics.is_empty() {
        return Err(CliError::NoComponents("[[topics]]"));
    }

    let mut builder = KafkaStreams::builder(config.streams.clone())
        .skip_storage_check(args.skip_storage_check);
    if let Some(options) = config.storage.clone() {
        builder = builder.storage_options(options);
    }
    let factory = builder.build()?;

    let inspection = inspect(&factory, &config).await;
    let snapshots = match inspection.tables {
        Ok(snapshots) => snapshots,
        Err(err) => {
            tracing::warn!(
                error = %err,
                connections_released = inspection.report.connections_released,
                storages_released = inspection.report.storages_released,
                "inspect aborted after teardown"
            );
            return Err(err);
        }
    };

    let output = InspectOutput {
        client_id: factory.config().client_id.clone(),
        storage: factory.storage_name().to_string(),
        stats: inspection.stats,
        tables: snapshots,
        teardown: TeardownOutput::from(&inspection.report),
    };
    let rendered = if args.pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    println!("{rendered}");

    inspection.report.into_result()?;
    Ok(())
}

struct Inspection {
    tables: Result<serde_json::Map<String, serde_json::Value>, CliError>,
    stats: Vec<ClientStats>,
    report: CloseReport,
}

/// Seed, open and sync every configured topic, then tear the factory down
/// whether or not that succeeded.
async fn inspect(factory: &Arc<KafkaStreams>, config: &FileConfig) -> Inspection {
    let tables = open_and_sync(factory, config).await;
    let stats = factory.stats();
    let report = factory.close_all().await;
    Inspection { tables, stats, report }
}

async fn open_and_sync(
    factory: &Arc<KafkaStreams>,
    config: &FileConfig,
) -> Result<serde_json::Map<String, serde_json::Value>, CliError> {
    for topic in config.topics.iter().filter(|t| !t.records.is_empty()) {
        let producer = factory.get_kstream(&topic.name, None)?;
        for record in &topic.records {
            producer.produce(record.key.clone(), record.value.clone()).await?;
        }
        tracing::info!(topic = %topic.name, records = topic.records.len(), "seeded topic");
    }

    let mut tables: Vec<KTable> = Vec::new();
    for topic in &config.topics {
        match topic.view {
            ViewKind::Stream => {
                factory.get_kstream(&topic.name, None)?;
            }
            ViewKind::Table => {
                let key_map = match &topic.key_field {
                    Some(field) => key_from_field(field.clone()),
                    None => key_from_message(),
                };
                tables.push(factory.get_ktable_with(&topic.name, key_map, None)?);
            }
        }
        tracing::info!(topic = %topic.name, view = ?topic.view, "opened view");
    }

    let mut snapshots = serde_json::Map::new();
    for table in &tables {
        table.sync(TABLE_SYNC_BATCH).await?;
        let snapshot = table.snapshot().await?;
        snapshots.insert(table.topic().to_string(), serde_json::Value::Object(snapshot));
    }
    Ok(snapshots)
}
