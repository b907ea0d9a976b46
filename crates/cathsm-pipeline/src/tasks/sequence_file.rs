//! Root task: expand a multi-sequence FASTA file into the two-stage graph.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use cathsm_client::{AlignmentClient, SelectTemplateClient};
use cathsm_common::{read_fasta_file, safe_id};

use crate::error::TaskError;
use crate::target::CachedTarget;
use crate::task::{ChildSpec, Produced, Task, TaskIdentity};
use crate::tasks::{AlignTemplateAggregator, SelectTemplateTask};

/// Parses the query FASTA file and emits, per sequence, a
/// [`SelectTemplateTask`] plus an [`AlignTemplateAggregator`] that depends
/// on it. Sequences before `start_seq` (1-based) are skipped entirely,
/// matching resume-after-partial-run usage.
pub struct SequenceFileTask {
    infile: PathBuf,
    start_seq: usize,
    select_client: Arc<SelectTemplateClient>,
    align_client: Arc<AlignmentClient>,
    work_dir: PathBuf,
    out_dir: PathBuf,
}

impl SequenceFileTask {
    pub fn new(
        infile: impl Into<PathBuf>,
        start_seq: usize,
        select_client: Arc<SelectTemplateClient>,
        align_client: Arc<AlignmentClient>,
        work_dir: impl Into<PathBuf>,
        out_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            infile: infile.into(),
            start_seq: start_seq.max(1),
            select_client,
            align_client,
            work_dir: work_dir.into(),
            out_dir: out_dir.into(),
        }
    }
}

#[async_trait]
impl Task for SequenceFileTask {
    fn identity(&self) -> TaskIdentity {
        let scope = self
            .infile
            .file_stem()
            .map(|s| safe_id(&s.to_string_lossy()))
            .unwrap_or_default();
        TaskIdentity::new(
            "sequence_file",
            &scope,
            &(self.infile.to_string_lossy(), self.start_seq),
        )
    }

    fn target(&self) -> Option<CachedTarget> {
        None
    }

    async fn produce(&self) -> Result<Produced, TaskError> {
        let records = read_fasta_file(&self.infile)?;
        info!(
            infile = %self.infile.display(),
            sequences = records.len(),
            start_seq = self.start_seq,
            "expanding query file"
        );

        let mut children: Vec<ChildSpec> = Vec::new();
        for (index, record) in records.into_iter().enumerate() {
            if index + 1 < self.start_seq {
                info!(seq_id = %record.id, position = index + 1, "before start offset, skipping");
                continue;
            }
            let seq_id = safe_id(&record.id);
            let select = Arc::new(SelectTemplateTask::new(
                record,
                self.select_client.clone(),
                &self.work_dir,
            ));
            let aggregator = Arc::new(AlignTemplateAggregator::new(
                seq_id,
                select.hits_target(),
                self.select_client.clone(),
                self.align_client.clone(),
                &self.out_dir,
            ));

            let select_index = children.len();
            children.push(ChildSpec::leaf(select));
            children.push(ChildSpec::with_deps(aggregator, vec![select_index]));
        }

        Ok(Produced::Children {
            children,
            skipped: Vec::new(),
        })
    }
}
