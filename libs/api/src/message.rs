use serde::{Deserialize, Serialize};

/// A single record read from or written to a topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KafkaMessage {
    pub topic: String,
    pub partition: i32,
    /// Position of the record inside its partition log.
    pub offset: u64,
    /// Partition / compaction key. `None` for keyless records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub value: serde_json::Value,
    /// Timestamp in milliseconds (Unix epoch).
    pub timestamp_ms: i64,
}

/// Current Unix time in milliseconds.
pub fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
