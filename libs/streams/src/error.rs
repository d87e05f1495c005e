use kstreams_api::ResourceError;

#[derive(Debug, thiserror::Error)]
pub enum StreamsError {
    #[error("storage implementation '{name}' must be constructible: {source}")]
    StorageNotConstructible {
        name: String,
        #[source]
        source: ResourceError,
    },

    #[error(
        "storage implementation '{name}' must satisfy the storage capability \
         (instance implements version {found}, host requires {expected})"
    )]
    StorageCapability {
        name: String,
        found: u32,
        expected: u32,
    },

    #[error("config error: {0}")]
    Config(String),

    #[error("{count} resource(s) failed to close, first: {first}")]
    Teardown { count: usize, first: ResourceError },

    #[error(transparent)]
    Resource(#[from] ResourceError),
}

impl StreamsError {
    /// Errors that make factory construction fail fast.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            StreamsError::StorageNotConstructible { .. }
                | StreamsError::StorageCapability { .. }
                | StreamsError::Config(_)
        )
    }
}
