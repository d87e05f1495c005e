//! Contracts between the stream factory and its collaborators: broker
//! connections, connection factories and pluggable storages.

pub mod connection;
pub mod error;
pub mod message;
pub mod stats;
pub mod storage;

use std::future::Future;
use std::pin::Pin;

pub use connection::{BrokerConnection, ConnectionFactory};
pub use error::{ErrorKind, ResourceError};
pub use message::{KafkaMessage, now_ms};
pub use stats::ClientStats;
pub use storage::{KStorage, STORAGE_CAPABILITY_VERSION, StorageFactory, StorageOptions};

/// Boxed `Send` future returned by collaborator trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
