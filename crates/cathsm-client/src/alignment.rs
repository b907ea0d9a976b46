//! Client for the SM alignment/modelling service (stage 2).
//!
//! Endpoints:
//!   submit: POST {base}/api/alignment/
//!   status: GET  {base}/api/alignment/{project_id}/
//!   model:  GET  {base}/api/alignment/{project_id}/model.pdb

use tracing::info;

use crate::client::{ApiClient, Credentials, PollPolicy};
use crate::error::ClientError;
use crate::models::{RemoteJobHandle, SubmitAlignment};

const SUBMIT_PATH: &str = "/api/alignment/";

#[derive(Debug, Clone)]
pub struct AlignmentClient {
    api: ApiClient,
}

impl AlignmentClient {
    pub async fn connect(
        base_url: impl Into<String>,
        credentials: Credentials,
        poll: PollPolicy,
    ) -> Result<Self, ClientError> {
        let api = ApiClient::connect(base_url, credentials, poll).await?;
        Ok(Self { api })
    }

    fn status_path(project_id: &str) -> String {
        format!("/api/alignment/{project_id}/")
    }

    pub async fn submit(&self, submit: &SubmitAlignment) -> Result<RemoteJobHandle, ClientError> {
        self.api.submit_job(SUBMIT_PATH, submit, "project_id").await
    }

    /// Submit an alignment job, wait for completion, and download the
    /// resulting atomic-coordinate model (PDB format).
    pub async fn model(&self, submit: &SubmitAlignment) -> Result<Vec<u8>, ClientError> {
        let handle = self.submit(submit).await?;
        self.api
            .wait_for_completion(&Self::status_path(&handle.job_id), &handle.job_id)
            .await?;
        let pdb = self
            .api
            .get_bytes(&format!("/api/alignment/{}/model.pdb", handle.job_id))
            .await?;
        info!(
            project_id = %handle.job_id,
            pdb_id = %submit.pdb_id,
            bytes = pdb.len(),
            "downloaded model coordinates"
        );
        Ok(pdb)
    }
}
