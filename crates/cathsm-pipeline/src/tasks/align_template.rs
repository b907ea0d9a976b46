//! Stage 2: build a homology model from one target/template alignment.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use cathsm_client::{AlignmentCandidate, AlignmentClient, SubmitAlignment};

use crate::error::TaskError;
use crate::target::CachedTarget;
use crate::task::{Produced, Task, TaskIdentity};

/// Submits one alignment to the modelling service and produces the PDB
/// coordinates. The output lands at
/// `<out_dir>/<safe_seq_id>/<safe_seq_id>.<pdb_id><auth_asym_id>.pdb`, so
/// models from different template hits of the same query never collide.
pub struct AlignTemplateTask {
    seq_id: String,
    submit: SubmitAlignment,
    client: Arc<AlignmentClient>,
    target: CachedTarget,
}

impl AlignTemplateTask {
    /// `seq_id` must already be filesystem-safe.
    pub fn new(
        seq_id: &str,
        candidate: AlignmentCandidate,
        client: Arc<AlignmentClient>,
        out_dir: &Path,
    ) -> Self {
        let submit = SubmitAlignment::from(candidate);
        let file = format!("{seq_id}.{}{}.pdb", submit.pdb_id, submit.auth_asym_id);
        let target = CachedTarget::new(out_dir.join(seq_id).join(file));
        Self {
            seq_id: seq_id.to_string(),
            submit,
            client,
            target,
        }
    }
}

#[async_trait]
impl Task for AlignTemplateTask {
    fn identity(&self) -> TaskIdentity {
        let scope = format!(
            "{}.{}{}",
            self.seq_id, self.submit.pdb_id, self.submit.auth_asym_id
        );
        TaskIdentity::new("align_template", &scope, &self.submit)
    }

    fn target(&self) -> Option<CachedTarget> {
        Some(self.target.clone())
    }

    async fn produce(&self) -> Result<Produced, TaskError> {
        info!(
            seq_id = %self.seq_id,
            pdb_id = %self.submit.pdb_id,
            auth_asym_id = %self.submit.auth_asym_id,
            "submitting alignment for modelling"
        );
        let pdb = self.client.model(&self.submit).await?;
        Ok(Produced::Output(pdb))
    }
}
