use serde::{Deserialize, Serialize};

use crate::error::StreamsError;

/// Factory configuration.
///
/// Only `client_id` and `broker` are read by the built-in connection
/// factory; every other key lands in `extra` and is carried verbatim for
/// custom connection factories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamsConfig {
    #[serde(default = "default_client_id")]
    pub client_id: String,

    #[serde(default)]
    pub broker: BrokerConfig,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn default_client_id() -> String {
    "kstreams".to_string()
}

impl Default for StreamsConfig {
    fn default() -> Self {
        Self {
            client_id: default_client_id(),
            broker: BrokerConfig::default(),
            extra: serde_json::Map::new(),
        }
    }
}

/// Which broker backend the built-in connection factory talks to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BrokerConfig {
    /// In-process broker, one log per topic.
    Memory {
        #[serde(default = "default_max_messages_per_topic")]
        max_messages_per_topic: usize,
    },
}

fn default_max_messages_per_topic() -> usize {
    100_000
}

impl Default for BrokerConfig {
    fn default() -> Self {
        BrokerConfig::Memory {
            max_messages_per_topic: default_max_messages_per_topic(),
        }
    }
}

impl StreamsConfig {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            ..Self::default()
        }
    }

    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self, StreamsError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| StreamsError::Config(format!("{path}: {e}")))?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(toml_str: &str) -> Result<Self, StreamsError> {
        toml::from_str(toml_str).map_err(|e| StreamsError::Config(e.to_string()))
    }
}
