use std::sync::Arc;

use crate::{BoxFuture, ResourceError};

/// Version of the [`KStorage`] contract the host was built against.
///
/// Bump this whenever the trait changes in a way that existing storage
/// implementations would not honor.
pub const STORAGE_CAPABILITY_VERSION: u32 = 1;

/// Opaque options handed to every storage instance a factory creates.
/// `Null` means "defaults".
pub type StorageOptions = serde_json::Value;

/// Storage capability: key-value persistence backing a stream or table view.
pub trait KStorage: Send + Sync {
    /// Implementation name, for logs.
    fn name(&self) -> &str;

    /// Contract version this instance implements.
    fn capability_version(&self) -> u32 {
        STORAGE_CAPABILITY_VERSION
    }

    /// Insert or overwrite `key`.
    fn set(&self, key: &str, value: serde_json::Value) -> BoxFuture<'_, Result<(), ResourceError>>;

    fn get(&self, key: &str) -> BoxFuture<'_, Result<Option<serde_json::Value>, ResourceError>>;

    /// Add `by` to the integer stored under `key` (missing = 0) and return
    /// the new value.
    fn increment(&self, key: &str, by: i64) -> BoxFuture<'_, Result<i64, ResourceError>>;

    /// Copy of the whole key space.
    fn snapshot(
        &self,
    ) -> BoxFuture<'_, Result<serde_json::Map<String, serde_json::Value>, ResourceError>>;

    fn close(&self) -> BoxFuture<'_, Result<(), ResourceError>>;
}

/// A pluggable storage implementation: builds [`KStorage`] instances
/// from options.
pub trait StorageFactory: Send + Sync {
    fn name(&self) -> &str;

    fn create(&self, options: &StorageOptions) -> Result<Arc<dyn KStorage>, ResourceError>;

    /// Build a throwaway instance with no options at all.
    fn probe(&self) -> Result<Arc<dyn KStorage>, ResourceError> {
        self.create(&serde_json::Value::Null)
    }
}
