#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("config ({context}): {detail}")]
    Config { context: &'static str, detail: String },

    #[error("no {0} configured")]
    NoComponents(&'static str),

    #[error("{0}")]
    Streams(#[from] kstreams::StreamsError),

    #[error("resource: {0}")]
    Resource(#[from] kstreams_api::ResourceError),

    #[error("output: {0}")]
    Output(#[from] serde_json::Error),
}
