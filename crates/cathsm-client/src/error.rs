use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("authentication against {base_url} failed: {reason}")]
    Auth { base_url: String, reason: String },

    #[error("job submission rejected (HTTP {status}): {body}")]
    Submission { status: u16, body: String },

    #[error("submit response is missing job id field '{field}'")]
    MissingJobId { field: String },

    #[error("gave up polling job {job_id} after {attempts} consecutive failed polls")]
    PollTimeout { job_id: String, attempts: u32 },

    #[error("remote service reported job {job_id} as failed")]
    JobFailed { job_id: String },

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ClientError {
    /// Transient errors are worth retrying during polling: network-level
    /// failures and 5xx responses. Anything else is fatal to the job.
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::Http(err) => {
                err.is_timeout()
                    || err.is_connect()
                    || err.status().is_some_and(|s| s.is_server_error())
            }
            _ => false,
        }
    }
}
