use std::sync::Arc;

use broker_memory::{MemoryBroker, MemoryConnectionFactory};
use kstreams_api::ConnectionFactory;

use crate::config::{BrokerConfig, StreamsConfig};
use crate::error::StreamsError;

/// Build the connection factory selected by `config.broker`.
pub fn connection_factory_from_config(
    config: &StreamsConfig,
) -> Result<Arc<dyn ConnectionFactory>, StreamsError> {
    match &config.broker {
        BrokerConfig::Memory {
            max_messages_per_topic,
        } => {
            if *max_messages_per_topic == 0 {
                return Err(StreamsError::Config(
                    "broker.max_messages_per_topic must be greater than 0".into(),
                ));
            }
            let broker = MemoryBroker::new(*max_messages_per_topic);
            Ok(Arc::new(MemoryConnectionFactory::new(
                broker,
                config.client_id.clone(),
            )))
        }
    }
}
