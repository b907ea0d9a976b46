//! Dynamic fan-out from a cached hits document to per-hit modelling tasks.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use cathsm_client::models::parse_hits;
use cathsm_client::{AlignmentClient, SelectTemplateClient};

use crate::error::TaskError;
use crate::target::CachedTarget;
use crate::task::{ChildSpec, Produced, Task, TaskIdentity};
use crate::tasks::AlignTemplateTask;

/// Reads the stage-1 hits document for one query, fetches template
/// alignments per hit, and emits one [`AlignTemplateTask`] per hit that has
/// a usable candidate. Hits whose alignment list comes back empty are
/// recorded as skipped rather than failing the run.
///
/// The aggregator itself has no target: its children's outputs are the
/// durable artefacts, so a re-run re-expands the (cached) hits document and
/// lets each child's own cache check decide whether anything is left to do.
pub struct AlignTemplateAggregator {
    seq_id: String,
    hits_target: CachedTarget,
    select_client: Arc<SelectTemplateClient>,
    align_client: Arc<AlignmentClient>,
    out_dir: PathBuf,
}

impl AlignTemplateAggregator {
    /// `seq_id` must already be filesystem-safe; `hits_target` is the
    /// upstream [`SelectTemplateTask`](crate::tasks::SelectTemplateTask)'s
    /// cached output.
    pub fn new(
        seq_id: impl Into<String>,
        hits_target: CachedTarget,
        select_client: Arc<SelectTemplateClient>,
        align_client: Arc<AlignmentClient>,
        out_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            seq_id: seq_id.into(),
            hits_target,
            select_client,
            align_client,
            out_dir: out_dir.into(),
        }
    }

    fn skip_label(&self, hit_uuid: &impl std::fmt::Display) -> String {
        format!("align_template.{}.{hit_uuid}", self.seq_id)
    }
}

#[async_trait]
impl Task for AlignTemplateAggregator {
    fn identity(&self) -> TaskIdentity {
        TaskIdentity::new(
            "align_templates",
            &self.seq_id,
            &(&self.seq_id, self.hits_target.path().to_string_lossy()),
        )
    }

    fn target(&self) -> Option<CachedTarget> {
        None
    }

    async fn produce(&self) -> Result<Produced, TaskError> {
        let raw = self.hits_target.read()?;
        let hits = parse_hits(&raw).map_err(|source| TaskError::MalformedHits {
            scope: self.seq_id.clone(),
            source,
        })?;
        info!(seq_id = %self.seq_id, hits = hits.len(), "expanding template hits");

        let mut children = Vec::with_capacity(hits.len());
        let mut skipped = Vec::new();
        for hit in hits {
            info!(
                seq_id = %self.seq_id,
                hit_uuid = %hit.hit_uuid,
                ff_id = %hit.ff_id,
                "fetching alignments for hit"
            );
            let mut candidates = self.select_client.alignments(hit.hit_uuid).await?;
            if candidates.is_empty() {
                warn!(
                    seq_id = %self.seq_id,
                    hit_uuid = %hit.hit_uuid,
                    ff_id = %hit.ff_id,
                    "FunFam hit has no template alignment, skipping"
                );
                skipped.push(self.skip_label(&hit.hit_uuid));
                continue;
            }
            // Candidates arrive best-first; only the top one is modelled.
            let best = candidates.swap_remove(0);
            let task = AlignTemplateTask::new(
                &self.seq_id,
                best,
                self.align_client.clone(),
                &self.out_dir,
            );
            children.push(ChildSpec::leaf(Arc::new(task)));
        }

        Ok(Produced::Children { children, skipped })
    }
}
