//! cathsm-pipeline — dependency-driven task engine for the CATH-SM
//! two-stage modelling pipeline.
//!
//! Each unit of work is a [`Task`] with a declared [`CachedTarget`]; a task
//! whose target already exists is never recomputed. The [`Engine`] resolves
//! static dependencies (stage 1 before stage 2) together with dynamic
//! fan-out (stage-2 tasks are discovered only after stage 1's hit list is
//! inspected) under a bounded worker count.

pub mod engine;
pub mod error;
pub mod target;
pub mod task;
pub mod tasks;

pub use engine::Engine;
pub use error::TaskError;
pub use target::CachedTarget;
pub use task::{ChildSpec, Produced, RunReport, Task, TaskIdentity, TaskOutcome};
pub use tasks::{
    AlignTemplateAggregator, AlignTemplateTask, SelectTemplateTask, SequenceFileTask,
};
