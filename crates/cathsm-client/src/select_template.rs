//! Client for the CATH select-template service (stage 1).
//!
//! Endpoints:
//!   submit:     POST {base}/api/select-template/
//!   status:     GET  {base}/api/select-template/{uuid}/
//!   hits:       GET  {base}/api/select-template/{uuid}/hits
//!   alignments: GET  {base}/api/select-template/hit/{hit_uuid}/alignments

use tracing::info;
use uuid::Uuid;

use crate::client::{ApiClient, Credentials, PollPolicy};
use crate::error::ClientError;
use crate::models::{AlignmentCandidate, RemoteJobHandle, SubmitSelectTemplate};

const SUBMIT_PATH: &str = "/api/select-template/";

#[derive(Debug, Clone)]
pub struct SelectTemplateClient {
    api: ApiClient,
}

impl SelectTemplateClient {
    pub async fn connect(
        base_url: impl Into<String>,
        credentials: Credentials,
        poll: PollPolicy,
    ) -> Result<Self, ClientError> {
        let api = ApiClient::connect(base_url, credentials, poll).await?;
        Ok(Self { api })
    }

    fn status_path(task_uuid: &str) -> String {
        format!("/api/select-template/{task_uuid}/")
    }

    pub async fn submit(
        &self,
        submit: &SubmitSelectTemplate,
    ) -> Result<RemoteJobHandle, ClientError> {
        self.api.submit_job(SUBMIT_PATH, submit, "uuid").await
    }

    /// Submit a query sequence and block until the remote job completes.
    /// Returns the task uuid used to address hits.
    pub async fn run(&self, submit: &SubmitSelectTemplate) -> Result<String, ClientError> {
        let handle = self.submit(submit).await?;
        self.api
            .wait_for_completion(&Self::status_path(&handle.job_id), &handle.job_id)
            .await?;
        Ok(handle.job_id)
    }

    /// Fetch the hits document verbatim; the pipeline caches these bytes
    /// unmodified so re-runs see exactly what the service returned.
    pub async fn hits_raw(&self, task_uuid: &str) -> Result<Vec<u8>, ClientError> {
        let raw = self
            .api
            .get_bytes(&format!("/api/select-template/{task_uuid}/hits"))
            .await?;
        info!(%task_uuid, bytes = raw.len(), "retrieved hits document");
        Ok(raw)
    }

    /// Template alignments for one hit, best candidate first.
    pub async fn alignments(&self, hit_uuid: Uuid) -> Result<Vec<AlignmentCandidate>, ClientError> {
        self.api
            .get_json(&format!("/api/select-template/hit/{hit_uuid}/alignments"))
            .await
    }
}
