use serde::{Deserialize, Serialize};

/// Point-in-time statistics of one broker connection.
///
/// Snapshots are taken as-is, even from connections that were already
/// closed; `connected` tells them apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientStats {
    pub client_id: String,
    pub topic: String,
    pub connected: bool,
    /// Records appended through this connection.
    pub produced: u64,
    /// Records handed out by `poll` on this connection.
    pub consumed: u64,
    /// Offset the next `poll` starts from.
    pub next_offset: u64,
    pub created_at_ms: i64,
}
