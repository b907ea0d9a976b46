//! Authenticated HTTP client with the submit → poll → fetch job shape.

use std::time::Duration;

use reqwest::header::AUTHORIZATION;
use reqwest::{Client, ClientBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::ClientError;
use crate::models::{JobStatus, RemoteJobHandle};

const TOKEN_AUTH_PATH: &str = "/api/api-token-auth/";
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// How a service authenticates: a pre-shared token, or a username/password
/// pair exchanged once for a token at client construction.
#[derive(Debug, Clone)]
pub enum Credentials {
    Token(SecretString),
    UserPassword { user: String, password: SecretString },
}

impl Credentials {
    pub fn token(token: impl Into<String>) -> Self {
        Credentials::Token(SecretString::from(token.into()))
    }

    pub fn user_password(user: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials::UserPassword {
            user: user.into(),
            password: SecretString::from(password.into()),
        }
    }
}

/// Poll loop tuning. The interval is the fixed wait between successful
/// status polls; backoff applies only to transient poll failures.
#[derive(Debug, Clone)]
pub struct PollPolicy {
    pub interval: Duration,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
    pub max_retries: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            backoff_base: Duration::from_secs(1),
            backoff_cap: Duration::from_secs(30),
            max_retries: 5,
        }
    }
}

impl PollPolicy {
    fn backoff_delay(&self, consecutive_failures: u32) -> Duration {
        let exp = consecutive_failures.saturating_sub(1).min(16);
        let delay = self.backoff_base.saturating_mul(1u32 << exp);
        delay.min(self.backoff_cap)
    }
}

/// One remote job service endpoint, with the token header set reused for
/// every submit/poll/fetch call on a job.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    token: SecretString,
    poll: PollPolicy,
}

#[derive(Debug, serde::Deserialize)]
struct TokenResponse {
    token: String,
}

#[derive(Debug, serde::Deserialize)]
struct StatusBody {
    status: JobStatus,
}

impl ApiClient {
    /// Build a client for `base_url`, exchanging username/password for a
    /// token if no pre-shared token was given.
    pub async fn connect(
        base_url: impl Into<String>,
        credentials: Credentials,
        poll: PollPolicy,
    ) -> Result<Self, ClientError> {
        let base_url = base_url.into();
        let http = ClientBuilder::new().timeout(HTTP_TIMEOUT).build()?;

        let token = match credentials {
            Credentials::Token(token) => token,
            Credentials::UserPassword { user, password } => {
                debug!(%base_url, %user, "exchanging credentials for API token");
                let url = join_url(&base_url, TOKEN_AUTH_PATH);
                let resp = http
                    .post(&url)
                    .json(&serde_json::json!({
                        "username": user,
                        "password": password.expose_secret(),
                    }))
                    .send()
                    .await?;
                if !resp.status().is_success() {
                    return Err(ClientError::Auth {
                        base_url,
                        reason: format!("token endpoint returned HTTP {}", resp.status()),
                    });
                }
                let body: TokenResponse = resp.json().await?;
                SecretString::from(body.token)
            }
        };

        Ok(Self {
            http,
            base_url,
            token,
            poll,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }

    fn auth_value(&self) -> String {
        format!("Token {}", self.token.expose_secret())
    }

    /// POST a job payload; the job id is read from `id_field` in the
    /// response body (`uuid` for select-template, `project_id` for
    /// alignment).
    pub async fn submit_job<T: Serialize>(
        &self,
        path: &str,
        payload: &T,
        id_field: &str,
    ) -> Result<RemoteJobHandle, ClientError> {
        let url = self.url(path);
        debug!(%url, "POST job submission");
        let resp = self
            .http
            .post(&url)
            .header(AUTHORIZATION, self.auth_value())
            .json(payload)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Submission {
                status: status.as_u16(),
                body,
            });
        }

        let body: serde_json::Value = resp.json().await?;
        let job_id = body
            .get(id_field)
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| ClientError::MissingJobId {
                field: id_field.to_string(),
            })?;

        info!(%job_id, %url, "job submitted");
        Ok(RemoteJobHandle {
            job_id,
            status: JobStatus::Pending,
        })
    }

    /// One status poll.
    pub async fn poll_status(&self, path: &str) -> Result<JobStatus, ClientError> {
        let url = self.url(path);
        let resp = self
            .http
            .get(&url)
            .header(AUTHORIZATION, self.auth_value())
            .send()
            .await?
            .error_for_status()?;
        let body: StatusBody = resp.json().await?;
        Ok(body.status)
    }

    /// Poll `status_path` at the fixed interval until the job reaches a
    /// terminal status. Transient poll failures (network, 5xx) are retried
    /// with bounded exponential backoff; once the retry ceiling is hit the
    /// job is abandoned with [`ClientError::PollTimeout`].
    pub async fn wait_for_completion(
        &self,
        status_path: &str,
        job_id: &str,
    ) -> Result<JobStatus, ClientError> {
        let mut consecutive_failures: u32 = 0;
        loop {
            match self.poll_status(status_path).await {
                Ok(JobStatus::Success) => {
                    info!(%job_id, "job completed successfully");
                    return Ok(JobStatus::Success);
                }
                Ok(JobStatus::Failed) => {
                    return Err(ClientError::JobFailed {
                        job_id: job_id.to_string(),
                    });
                }
                Ok(status) => {
                    debug!(%job_id, ?status, "job still in progress");
                    consecutive_failures = 0;
                    tokio::time::sleep(self.poll.interval).await;
                }
                Err(err) if err.is_transient() => {
                    consecutive_failures += 1;
                    if consecutive_failures > self.poll.max_retries {
                        return Err(ClientError::PollTimeout {
                            job_id: job_id.to_string(),
                            attempts: consecutive_failures,
                        });
                    }
                    let delay = self.poll.backoff_delay(consecutive_failures);
                    warn!(
                        %job_id,
                        attempt = consecutive_failures,
                        delay_ms = delay.as_millis() as u64,
                        "transient poll failure, backing off: {err}"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let url = self.url(path);
        debug!(%url, "GET");
        let resp = self
            .http
            .get(&url)
            .header(AUTHORIZATION, self.auth_value())
            .send()
            .await?
            .error_for_status()?;
        Ok(resp.json().await?)
    }

    /// Fetch a raw result payload. Only meaningful once the job's status
    /// polled `Success`.
    pub async fn get_bytes(&self, path: &str) -> Result<Vec<u8>, ClientError> {
        let url = self.url(path);
        debug!(%url, "GET (raw)");
        let resp = self
            .http
            .get(&url)
            .header(AUTHORIZATION, self.auth_value())
            .send()
            .await?
            .error_for_status()?;
        Ok(resp.bytes().await?.to_vec())
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    fn fast_poll() -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(5),
            backoff_base: Duration::from_millis(20),
            backoff_cap: Duration::from_millis(100),
            max_retries: 3,
        }
    }

    async fn token_client(server: &mockito::ServerGuard) -> ApiClient {
        ApiClient::connect(server.url(), Credentials::token("tok"), fast_poll())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn exchanges_user_password_for_token() {
        let mut server = Server::new_async().await;
        let auth = server
            .mock("POST", "/api/api-token-auth/")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"token": "secret-token"}"#)
            .create_async()
            .await;
        let status = server
            .mock("GET", "/api/select-template/abc/")
            .match_header("authorization", "Token secret-token")
            .with_status(200)
            .with_body(r#"{"status": "queued"}"#)
            .create_async()
            .await;

        let client = ApiClient::connect(
            server.url(),
            Credentials::user_password("apiuser", "apipassword"),
            fast_poll(),
        )
        .await
        .unwrap();

        let got = client.poll_status("/api/select-template/abc/").await.unwrap();
        assert_eq!(got, JobStatus::Queued);
        auth.assert_async().await;
        status.assert_async().await;
    }

    #[tokio::test]
    async fn rejected_credentials_fail_construction() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/api/api-token-auth/")
            .with_status(400)
            .with_body(r#"{"non_field_errors": ["bad credentials"]}"#)
            .create_async()
            .await;

        let err = ApiClient::connect(
            server.url(),
            Credentials::user_password("apiuser", "wrong"),
            fast_poll(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ClientError::Auth { .. }));
    }

    #[tokio::test]
    async fn submit_extracts_job_id() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/select-template/")
            .match_header("authorization", "Token tok")
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(r#"{"uuid": "job-123"}"#)
            .create_async()
            .await;

        let client = token_client(&server).await;
        let handle = client
            .submit_job(
                "/api/select-template/",
                &serde_json::json!({"query_id": "q"}),
                "uuid",
            )
            .await
            .unwrap();
        assert_eq!(handle.job_id, "job-123");
        assert_eq!(handle.status, JobStatus::Pending);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn submit_rejection_is_submission_error() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/api/select-template/")
            .with_status(400)
            .with_body("malformed payload")
            .create_async()
            .await;

        let client = token_client(&server).await;
        let err = client
            .submit_job("/api/select-template/", &serde_json::json!({}), "uuid")
            .await
            .unwrap_err();
        match err {
            ClientError::Submission { status, body } => {
                assert_eq!(status, 400);
                assert_eq!(body, "malformed payload");
            }
            other => panic!("expected Submission error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn submit_without_id_field_fails() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/api/alignment/")
            .with_status(200)
            .with_body(r#"{"something_else": "x"}"#)
            .create_async()
            .await;

        let client = token_client(&server).await;
        let err = client
            .submit_job("/api/alignment/", &serde_json::json!({}), "project_id")
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::MissingJobId { field } if field == "project_id"));
    }

    #[tokio::test]
    async fn wait_polls_until_success() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let mut server = Server::new_async().await;
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_in_mock = calls.clone();
        // Report queued/running for the first two polls, then success.
        let mock = server
            .mock("GET", "/api/select-template/j1/")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body_from_request(move |_| {
                match calls_in_mock.fetch_add(1, Ordering::SeqCst) {
                    0 => br#"{"status": "queued"}"#.to_vec(),
                    1 => br#"{"status": "running"}"#.to_vec(),
                    _ => br#"{"status": "success"}"#.to_vec(),
                }
            })
            .expect(3)
            .create_async()
            .await;

        let client = token_client(&server).await;
        let status = client
            .wait_for_completion("/api/select-template/j1/", "j1")
            .await
            .unwrap();
        assert_eq!(status, JobStatus::Success);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn wait_retries_transient_5xx_then_succeeds() {
        let mut server = Server::new_async().await;
        // Competing mocks: the later-declared 502 takes precedence until it
        // is removed, after which polling sees the success response.
        let done = server
            .mock("GET", "/api/alignment/j2/")
            .with_status(200)
            .with_body(r#"{"status": "success"}"#)
            .create_async()
            .await;
        let flaky = server
            .mock("GET", "/api/alignment/j2/")
            .with_status(502)
            .create_async()
            .await;

        let client = token_client(&server).await;
        let wait = tokio::spawn(async move {
            client.wait_for_completion("/api/alignment/j2/", "j2").await
        });
        tokio::time::sleep(Duration::from_millis(30)).await;
        flaky.remove_async().await;

        let status = wait.await.unwrap().unwrap();
        assert_eq!(status, JobStatus::Success);
        done.assert_async().await;
    }

    #[tokio::test]
    async fn wait_gives_up_after_retry_ceiling() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/api/alignment/j3/")
            .with_status(500)
            .expect_at_least(4)
            .create_async()
            .await;

        let client = token_client(&server).await;
        let err = client
            .wait_for_completion("/api/alignment/j3/", "j3")
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::PollTimeout { attempts: 4, .. }));
    }

    #[tokio::test]
    async fn failed_job_status_is_fatal() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/api/select-template/j4/")
            .with_status(200)
            .with_body(r#"{"status": "error"}"#)
            .create_async()
            .await;

        let client = token_client(&server).await;
        let err = client
            .wait_for_completion("/api/select-template/j4/", "j4")
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::JobFailed { job_id } if job_id == "j4"));
    }

    #[tokio::test]
    async fn non_transient_4xx_poll_error_is_fatal() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/api/select-template/j5/")
            .with_status(404)
            .create_async()
            .await;

        let client = token_client(&server).await;
        let err = client
            .wait_for_completion("/api/select-template/j5/", "j5")
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Http(_)));
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let poll = PollPolicy {
            interval: Duration::from_secs(2),
            backoff_base: Duration::from_secs(1),
            backoff_cap: Duration::from_secs(5),
            max_retries: 10,
        };
        assert_eq!(poll.backoff_delay(1), Duration::from_secs(1));
        assert_eq!(poll.backoff_delay(2), Duration::from_secs(2));
        assert_eq!(poll.backoff_delay(3), Duration::from_secs(4));
        assert_eq!(poll.backoff_delay(4), Duration::from_secs(5));
        assert_eq!(poll.backoff_delay(10), Duration::from_secs(5));
    }
}
