//! Event-driven execution engine with bounded workers and dynamic fan-out.
//!
//! The graph is a flat arena of nodes with dependency counts. Whenever any
//! node completes, the engine re-resolves readiness: dependents whose count
//! drops to zero join the FIFO ready queue, and children emitted by an
//! aggregator are registered on the spot. A node occupies a worker slot for
//! its entire `produce()` call, including the blocking poll loop of a
//! remote job, which bounds outbound request concurrency.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::TaskError;
use crate::task::{ChildSpec, Produced, RunReport, Task, TaskOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeState {
    Pending,
    Ready,
    Running,
    /// Aggregator that has emitted children and succeeds once they are all
    /// terminal.
    WaitingChildren,
    Cached,
    Succeeded,
    Failed,
}

struct Node {
    task: Arc<dyn Task>,
    state: NodeState,
    deps_remaining: usize,
    dependents: Vec<usize>,
    parent: Option<usize>,
    children_remaining: usize,
}

enum WorkerOutput {
    Output,
    Children {
        children: Vec<ChildSpec>,
        skipped: Vec<String>,
    },
}

enum Settle {
    Success(NodeState),
    Failure(String),
}

pub struct Engine {
    max_workers: usize,
    cancel: CancellationToken,
}

impl Engine {
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers: max_workers.max(1),
            cancel: CancellationToken::new(),
        }
    }

    /// Token that stops dispatching new nodes when cancelled. In-flight
    /// `produce()` calls finish or fail naturally; the remote job is not
    /// owned by this process once submitted.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Execute the graph rooted at `root` to quiescence and report per-task
    /// outcomes. Node-local failures never abort unrelated branches.
    pub async fn run(&self, root: Arc<dyn Task>) -> RunReport {
        let mut report = RunReport::new();
        let mut graph: Vec<Node> = Vec::new();
        let mut ready: VecDeque<usize> = VecDeque::new();
        let mut workers: JoinSet<(usize, Result<WorkerOutput, TaskError>)> = JoinSet::new();

        info!(task = %root.identity(), max_workers = self.max_workers, "engine run started");
        graph.push(Node {
            task: root,
            state: NodeState::Ready,
            deps_remaining: 0,
            dependents: Vec::new(),
            parent: None,
            children_remaining: 0,
        });
        ready.push_back(0);

        loop {
            self.dispatch(&mut graph, &mut ready, &mut report, &mut workers);

            let Some(joined) = workers.join_next().await else {
                if ready.is_empty() || self.cancel.is_cancelled() {
                    break;
                }
                continue;
            };

            match joined {
                Ok((id, Ok(WorkerOutput::Output))) => {
                    debug!(task = %graph[id].task.identity(), "task succeeded");
                    settle(
                        &mut graph,
                        &mut ready,
                        &mut report,
                        id,
                        Settle::Success(NodeState::Succeeded),
                    );
                }
                Ok((id, Ok(WorkerOutput::Children { children, skipped }))) => {
                    for label in skipped {
                        warn!(%label, "no usable alignment candidate, skipping");
                        report.record(label, TaskOutcome::SkippedNoCandidates);
                    }
                    register_children(&mut graph, &mut ready, &mut report, id, children);
                }
                Ok((id, Err(err))) => {
                    warn!(task = %graph[id].task.identity(), "task failed: {err}");
                    settle(
                        &mut graph,
                        &mut ready,
                        &mut report,
                        id,
                        Settle::Failure(err.to_string()),
                    );
                }
                Err(join_err) => {
                    // The node id is lost on panic; the node stays Running
                    // and is swept up after the loop.
                    warn!("worker task did not complete: {join_err}");
                }
            }
        }

        self.sweep_unfinished(&graph, &mut report);
        report.finish();

        let failed = report.failed().count();
        if failed == 0 {
            info!(tasks = report.outcomes().len(), "engine run completed");
        } else {
            warn!(tasks = report.outcomes().len(), failed, "engine run completed with failures");
        }
        report
    }

    /// Admit ready nodes FIFO until the worker pool is full. Nodes whose
    /// target already exists become Cached without consuming a slot.
    fn dispatch(
        &self,
        graph: &mut Vec<Node>,
        ready: &mut VecDeque<usize>,
        report: &mut RunReport,
        workers: &mut JoinSet<(usize, Result<WorkerOutput, TaskError>)>,
    ) {
        if self.cancel.is_cancelled() {
            return;
        }
        while workers.len() < self.max_workers {
            let Some(id) = ready.pop_front() else { break };
            // Queued entries may have been failed by upstream propagation.
            if graph[id].state != NodeState::Ready {
                continue;
            }
            if let Some(target) = graph[id].task.target() {
                if target.exists() {
                    debug!(
                        task = %graph[id].task.identity(),
                        path = %target.path().display(),
                        "target exists, using cached output"
                    );
                    settle(graph, ready, report, id, Settle::Success(NodeState::Cached));
                    continue;
                }
            }
            graph[id].state = NodeState::Running;
            let task = graph[id].task.clone();
            workers.spawn(async move { (id, execute(task).await) });
        }
    }

    fn sweep_unfinished(&self, graph: &[Node], report: &mut RunReport) {
        for node in graph {
            let identity = node.task.identity().to_string();
            match node.state {
                NodeState::Pending | NodeState::Ready => {
                    report.record(identity, TaskOutcome::Cancelled);
                }
                NodeState::WaitingChildren => {
                    let outcome = if self.cancel.is_cancelled() {
                        TaskOutcome::Cancelled
                    } else {
                        TaskOutcome::Failed("children never completed".to_string())
                    };
                    report.record(identity, outcome);
                }
                NodeState::Running => {
                    report.record(
                        identity,
                        TaskOutcome::Failed("worker did not complete".to_string()),
                    );
                }
                NodeState::Cached | NodeState::Succeeded | NodeState::Failed => {}
            }
        }
    }
}

async fn execute(task: Arc<dyn Task>) -> Result<WorkerOutput, TaskError> {
    debug!(task = %task.identity(), "producing");
    match task.produce().await? {
        Produced::Output(bytes) => {
            if let Some(target) = task.target() {
                target.write(&bytes)?;
            }
            Ok(WorkerOutput::Output)
        }
        Produced::Children { children, skipped } => Ok(WorkerOutput::Children { children, skipped }),
    }
}

/// Register an aggregator's emitted children. Sibling dependencies are
/// expressed as batch indices and may only point backwards, which keeps the
/// graph acyclic by construction.
fn register_children(
    graph: &mut Vec<Node>,
    ready: &mut VecDeque<usize>,
    report: &mut RunReport,
    parent_id: usize,
    children: Vec<ChildSpec>,
) {
    if children.is_empty() {
        debug!(task = %graph[parent_id].task.identity(), "aggregator emitted no children");
        settle(graph, ready, report, parent_id, Settle::Success(NodeState::Succeeded));
        return;
    }

    let base = graph.len();
    graph[parent_id].state = NodeState::WaitingChildren;
    graph[parent_id].children_remaining = children.len();
    debug!(
        task = %graph[parent_id].task.identity(),
        count = children.len(),
        "registered dynamic children"
    );

    for (i, spec) in children.into_iter().enumerate() {
        let id = base + i;
        debug_assert!(spec.deps.iter().all(|&j| j < i), "child deps must point backwards");
        let deps: Vec<usize> = spec.deps.iter().filter(|&&j| j < i).map(|&j| base + j).collect();
        let deps_remaining = deps.len();
        graph.push(Node {
            task: spec.task,
            state: if deps_remaining == 0 {
                NodeState::Ready
            } else {
                NodeState::Pending
            },
            deps_remaining,
            dependents: Vec::new(),
            parent: Some(parent_id),
            children_remaining: 0,
        });
        for d in deps {
            graph[d].dependents.push(id);
        }
        if deps_remaining == 0 {
            ready.push_back(id);
        }
    }
}

/// Mark a node terminal and propagate: wake dependents, fail downstream
/// nodes of a failed dependency, and complete waiting aggregators whose
/// last child just finished. Iterative worklist, no recursion.
fn settle(
    graph: &mut Vec<Node>,
    ready: &mut VecDeque<usize>,
    report: &mut RunReport,
    id: usize,
    first: Settle,
) {
    let mut work: VecDeque<(usize, Settle)> = VecDeque::new();
    work.push_back((id, first));

    while let Some((id, settle)) = work.pop_front() {
        // Failure propagation can reach a node through several upstream
        // edges; only the first settlement counts.
        if matches!(
            graph[id].state,
            NodeState::Cached | NodeState::Succeeded | NodeState::Failed
        ) {
            continue;
        }
        let identity = graph[id].task.identity().to_string();
        match settle {
            Settle::Success(state) => {
                graph[id].state = state;
                let outcome = if state == NodeState::Cached {
                    TaskOutcome::Cached
                } else {
                    TaskOutcome::Succeeded
                };
                report.record(identity, outcome);

                let dependents = graph[id].dependents.clone();
                for d in dependents {
                    graph[d].deps_remaining -= 1;
                    if graph[d].deps_remaining == 0 && graph[d].state == NodeState::Pending {
                        graph[d].state = NodeState::Ready;
                        ready.push_back(d);
                    }
                }
                if let Some(p) = graph[id].parent {
                    complete_child(graph, &mut work, p);
                }
            }
            Settle::Failure(reason) => {
                graph[id].state = NodeState::Failed;
                report.record(identity, TaskOutcome::Failed(reason));

                let dependents = graph[id].dependents.clone();
                for d in dependents {
                    if matches!(graph[d].state, NodeState::Pending | NodeState::Ready) {
                        work.push_back((d, Settle::Failure("upstream dependency failed".to_string())));
                    }
                }
                if let Some(p) = graph[id].parent {
                    complete_child(graph, &mut work, p);
                }
            }
        }
    }
}

fn complete_child(graph: &mut [Node], work: &mut VecDeque<(usize, Settle)>, parent: usize) {
    graph[parent].children_remaining -= 1;
    if graph[parent].children_remaining == 0 && graph[parent].state == NodeState::WaitingChildren {
        work.push_back((parent, Settle::Success(NodeState::Succeeded)));
    }
}
