//! cathsm-client — HTTP clients for the two CATH-SM remote job services.
//!
//! Both services share the same three-call shape: submit a job payload, poll
//! its status until terminal, fetch the result payload. [`ApiClient`] owns
//! that shape (plus authentication and retry/backoff); the thin
//! [`SelectTemplateClient`] and [`AlignmentClient`] wrappers own the URL
//! layout of each service.

pub mod alignment;
pub mod client;
pub mod error;
pub mod models;
pub mod select_template;

pub use alignment::AlignmentClient;
pub use client::{ApiClient, Credentials, PollPolicy};
pub use error::ClientError;
pub use models::{
    AlignmentCandidate, Hit, JobStatus, RemoteJobHandle, SubmitAlignment, SubmitSelectTemplate,
};
pub use select_template::SelectTemplateClient;
