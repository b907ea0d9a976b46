//! Stage 1: submit a query sequence to the template-selection service and
//! cache the hits document.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use cathsm_client::models::{parse_hits, SubmitSelectTemplate};
use cathsm_client::SelectTemplateClient;
use cathsm_common::{safe_id, SequenceRecord};

use crate::error::TaskError;
use crate::target::CachedTarget;
use crate::task::{Produced, Task, TaskIdentity};

/// Submits one query sequence, waits for the remote scan to finish, and
/// produces the raw hits document. The cached file is the verbatim service
/// payload, named `select_template.<safe_id>.json` under the work dir.
pub struct SelectTemplateTask {
    record: SequenceRecord,
    client: Arc<SelectTemplateClient>,
    target: CachedTarget,
}

impl SelectTemplateTask {
    pub fn new(
        record: SequenceRecord,
        client: Arc<SelectTemplateClient>,
        work_dir: &Path,
    ) -> Self {
        let safe = safe_id(&record.id);
        let target = CachedTarget::new(work_dir.join(format!("select_template.{safe}.json")));
        Self {
            record,
            client,
            target,
        }
    }

    /// The hits document location, for wiring the downstream aggregator.
    pub fn hits_target(&self) -> CachedTarget {
        self.target.clone()
    }
}

#[async_trait]
impl Task for SelectTemplateTask {
    fn identity(&self) -> TaskIdentity {
        TaskIdentity::new(
            "select_template",
            &safe_id(&self.record.id),
            &SubmitSelectTemplate::from_record(&self.record),
        )
    }

    fn target(&self) -> Option<CachedTarget> {
        Some(self.target.clone())
    }

    async fn produce(&self) -> Result<Produced, TaskError> {
        info!(
            query_id = %self.record.id,
            residues = self.record.sequence.len(),
            "submitting query for template selection"
        );
        let submit = SubmitSelectTemplate::from_record(&self.record);
        let task_uuid = self.client.run(&submit).await?;
        let raw = self.client.hits_raw(&task_uuid).await?;

        // Validate before caching so a malformed payload never satisfies a
        // later run's cache check.
        let hits = parse_hits(&raw).map_err(|source| TaskError::MalformedHits {
            scope: self.record.id.clone(),
            source,
        })?;
        info!(query_id = %self.record.id, hits = hits.len(), "template scan finished");
        Ok(Produced::Output(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cathsm_client::{Credentials, PollPolicy};
    use mockito::Server;
    use std::time::Duration;

    fn fast_poll() -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(5),
            backoff_base: Duration::from_millis(5),
            backoff_cap: Duration::from_millis(20),
            max_retries: 2,
        }
    }

    fn record() -> SequenceRecord {
        SequenceRecord {
            id: "sp|P12345|QUERY".into(),
            sequence: "MKTAILV".into(),
        }
    }

    // Token clients are cheap to build; no I/O happens until a request.
    async fn offline_client() -> Arc<SelectTemplateClient> {
        Arc::new(
            SelectTemplateClient::connect(
                "http://localhost:9",
                Credentials::token("tok"),
                fast_poll(),
            )
            .await
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn target_uses_sanitised_id() {
        let dir = tempfile::tempdir().unwrap();
        let task = SelectTemplateTask::new(record(), offline_client().await, dir.path());
        assert_eq!(
            task.target().unwrap().path(),
            dir.path().join("select_template.spP12345QUERY.json")
        );
    }

    #[tokio::test]
    async fn produce_runs_job_and_returns_hits_bytes() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/api/select-template/")
            .with_status(201)
            .with_body(r#"{"uuid": "t-7"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/api/select-template/t-7/")
            .with_status(200)
            .with_body(r#"{"status": "success"}"#)
            .create_async()
            .await;
        let hits_body = r#"[{"hit_uuid": "6ecf8a4c-74a6-4a72-9a68-8c1b6e1f6a01"}]"#;
        server
            .mock("GET", "/api/select-template/t-7/hits")
            .with_status(200)
            .with_body(hits_body)
            .create_async()
            .await;

        let client = Arc::new(
            SelectTemplateClient::connect(server.url(), Credentials::token("tok"), fast_poll())
                .await
                .unwrap(),
        );
        let dir = tempfile::tempdir().unwrap();
        let task = SelectTemplateTask::new(record(), client, dir.path());

        match task.produce().await.unwrap() {
            Produced::Output(bytes) => assert_eq!(bytes, hits_body.as_bytes()),
            Produced::Children { .. } => panic!("expected terminal output"),
        }
    }

    #[tokio::test]
    async fn malformed_hits_fail_before_caching() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/api/select-template/")
            .with_status(201)
            .with_body(r#"{"uuid": "t-8"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/api/select-template/t-8/")
            .with_status(200)
            .with_body(r#"{"status": "success"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/api/select-template/t-8/hits")
            .with_status(200)
            .with_body("this is not json")
            .create_async()
            .await;

        let client = Arc::new(
            SelectTemplateClient::connect(server.url(), Credentials::token("tok"), fast_poll())
                .await
                .unwrap(),
        );
        let dir = tempfile::tempdir().unwrap();
        let task = SelectTemplateTask::new(record(), client, dir.path());

        let err = task.produce().await.unwrap_err();
        assert!(matches!(err, TaskError::MalformedHits { .. }));
    }
}
