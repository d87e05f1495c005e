//! Factory and lifecycle registry for stream and table views over a
//! partitioned message log.
//!
//! [`KafkaStreams`] hands out [`KStream`] / [`KTable`] views, each backed by
//! a fresh broker connection and a storage instance, and tracks every
//! connection and storage it ever created so they can be inspected
//! ([`KafkaStreams::stats`]) and released together
//! ([`KafkaStreams::close_all`]).

pub mod broker;
pub mod config;
pub mod error;
pub mod factory;
pub mod registry;
pub mod stream;
pub mod table;

pub use config::{BrokerConfig, StreamsConfig};
pub use error::StreamsError;
pub use factory::{CloseFailure, CloseReport, KafkaStreams, KafkaStreamsBuilder, ResourceKind};
pub use registry::{ResourceId, ResourceRegistry};
pub use stream::KStream;
pub use table::{KTable, KeyMapEtl, key_from_field, key_from_message};

pub use kstreams_api as api;
