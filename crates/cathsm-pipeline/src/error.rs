use std::path::PathBuf;

use cathsm_client::ClientError;
use cathsm_common::CommonError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("failed to write cache target '{path}': {source}")]
    CacheWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read cache target '{path}': {source}")]
    CacheRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed hits document for '{scope}': {source}")]
    MalformedHits {
        scope: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Input(#[from] CommonError),
}
