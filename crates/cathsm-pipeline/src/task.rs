//! The schedulable unit of work and its identity/outcome types.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::TaskError;
use crate::target::CachedTarget;

/// Deterministic key derived from a task's parameters. Two tasks built from
/// identical parameters always produce the same identity, which in turn
/// names the same cached target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskIdentity(String);

impl TaskIdentity {
    /// `family` names the task kind, `scope` is a short human-readable
    /// discriminator (e.g. a sanitised sequence id), and `params` is the
    /// full parameter set, hashed for uniqueness.
    pub fn new<P: Serialize>(family: &str, scope: &str, params: &P) -> Self {
        // Parameter structs are plain data and serialize infallibly; should
        // one ever not, hashing the error text keeps the identity
        // deterministic instead of panicking mid-run.
        let canonical =
            serde_json::to_vec(params).unwrap_or_else(|err| err.to_string().into_bytes());
        let digest = Sha256::digest(&canonical);
        let mut hash = String::with_capacity(12);
        for byte in digest.iter().take(6) {
            hash.push_str(&format!("{byte:02x}"));
        }
        if scope.is_empty() {
            Self(format!("{family}.{hash}"))
        } else {
            Self(format!("{family}.{scope}.{hash}"))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A child emitted by a dynamic fan-out, with dependencies expressed as
/// indices of earlier siblings in the same batch (keeping the graph acyclic
/// by construction).
pub struct ChildSpec {
    pub task: Arc<dyn Task>,
    pub deps: Vec<usize>,
}

impl ChildSpec {
    pub fn leaf(task: Arc<dyn Task>) -> Self {
        Self { task, deps: Vec::new() }
    }

    pub fn with_deps(task: Arc<dyn Task>, deps: Vec<usize>) -> Self {
        Self { task, deps }
    }
}

/// What a successful `produce()` yielded.
pub enum Produced {
    /// Terminal output; the engine writes it to the task's target.
    Output(Vec<u8>),
    /// A dynamically-sized batch of new tasks (aggregator fan-out), plus
    /// labels for per-hit skips that should be recorded without creating a
    /// child.
    Children {
        children: Vec<ChildSpec>,
        skipped: Vec<String>,
    },
}

impl fmt::Debug for Produced {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Produced::Output(bytes) => {
                f.debug_tuple("Output").field(&bytes.len()).finish()
            }
            Produced::Children { children, skipped } => f
                .debug_struct("Children")
                .field("children", &children.len())
                .field("skipped", skipped)
                .finish(),
        }
    }
}

/// A unit of schedulable work.
#[async_trait]
pub trait Task: Send + Sync {
    fn identity(&self) -> TaskIdentity;

    /// The durable output location, or `None` for aggregate-only tasks
    /// (which never produce terminal output themselves).
    fn target(&self) -> Option<CachedTarget>;

    async fn produce(&self) -> Result<Produced, TaskError>;
}

/// Terminal per-task outcome of an engine run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Target already existed; no work performed.
    Cached,
    Succeeded,
    Failed(String),
    /// A hit yielded no usable alignment candidate and was skipped.
    SkippedNoCandidates,
    /// The run was cancelled before this task was dispatched.
    Cancelled,
}

/// Per-task outcomes for one engine run. The run as a whole fails iff at
/// least one task failed; independent branches always run to completion.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    outcomes: BTreeMap<String, TaskOutcome>,
}

impl RunReport {
    pub(crate) fn new() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            outcomes: BTreeMap::new(),
        }
    }

    pub(crate) fn record(&mut self, key: impl Into<String>, outcome: TaskOutcome) {
        self.outcomes.insert(key.into(), outcome);
    }

    pub(crate) fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn outcomes(&self) -> &BTreeMap<String, TaskOutcome> {
        &self.outcomes
    }

    pub fn outcome(&self, key: &str) -> Option<&TaskOutcome> {
        self.outcomes.get(key)
    }

    pub fn failed(&self) -> impl Iterator<Item = (&str, &str)> {
        self.outcomes.iter().filter_map(|(k, v)| match v {
            TaskOutcome::Failed(reason) => Some((k.as_str(), reason.as_str())),
            _ => None,
        })
    }

    pub fn skipped(&self) -> impl Iterator<Item = &str> {
        self.outcomes.iter().filter_map(|(k, v)| {
            matches!(v, TaskOutcome::SkippedNoCandidates).then_some(k.as_str())
        })
    }

    pub fn is_success(&self) -> bool {
        self.failed().next().is_none()
    }
}
