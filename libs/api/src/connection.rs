use std::sync::Arc;

use crate::{BoxFuture, ClientStats, KafkaMessage, ResourceError};

// ════════════════════════════════════════════════════════════════
//  Broker connection
// ════════════════════════════════════════════════════════════════

/// A live client binding to exactly one topic.
///
/// Connections may still be initializing in the background when they
/// are handed out; implementations own any connect/timeout semantics.
pub trait BrokerConnection: Send + Sync {
    /// Topic this connection is bound to.
    fn topic(&self) -> &str;

    /// Statistics snapshot. Must not fail, also not after `close()`.
    fn stats(&self) -> ClientStats;

    /// Append a record to the topic. Returns the offset it was written at.
    fn send(
        &self,
        key: Option<String>,
        value: serde_json::Value,
    ) -> BoxFuture<'_, Result<u64, ResourceError>>;

    /// Fetch up to `max` records after the connection's cursor and
    /// advance the cursor past them.
    fn poll(&self, max: usize) -> BoxFuture<'_, Result<Vec<KafkaMessage>, ResourceError>>;

    /// Move the cursor so the next `poll` starts at `offset`.
    fn seek(&self, offset: u64) -> BoxFuture<'_, Result<(), ResourceError>>;

    /// Release the connection.
    fn close(&self) -> BoxFuture<'_, Result<(), ResourceError>>;
}

/// Produces new connections on demand, one per call.
pub trait ConnectionFactory: Send + Sync {
    /// Name used in logs (e.g. `"memory"`).
    fn name(&self) -> &str;

    /// Build a new connection bound to `topic`. Never deduplicates.
    fn connect(&self, topic: &str) -> Result<Arc<dyn BrokerConnection>, ResourceError>;
}
