use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CommonError {
    #[error("failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed FASTA in '{path}': {reason}")]
    MalformedFasta { path: PathBuf, reason: String },

    #[error("no sequences found in '{path}'")]
    EmptyFasta { path: PathBuf },
}
