//! Concrete pipeline tasks: FASTA expansion, stage-1 template selection,
//! per-sequence hit aggregation, and stage-2 model building.

mod aggregator;
mod align_template;
mod select_template;
mod sequence_file;

pub use aggregator::AlignTemplateAggregator;
pub use align_template::AlignTemplateTask;
pub use select_template::SelectTemplateTask;
pub use sequence_file::SequenceFileTask;
