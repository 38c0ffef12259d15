//! Concurrent walk of a built task graph
//!
//! Tasks are visited in dependency order: a task's visitor starts only after
//! the visitors of every task it depends on have completed. Unrelated tasks
//! run concurrently, bounded by a shared semaphore unless `parallel` is set.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use daggy::NodeIndex;
use futures::future::select_all;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinError;
use tracing::{debug, instrument};

use switchyard_core::PipelineConfig;

use crate::graph::{TaskGraph, TaskNode};
use crate::reporter::{TracingReporter, WalkEvent, WalkReporter};
use crate::task::TaskId;

/// Error type produced by visitors
pub type VisitorError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors surfaced by a walk
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// The visitor returned an error for a task
    #[error("task \"{id}\" failed: {source}")]
    Visitor {
        id: TaskId,
        #[source]
        source: VisitorError,
    },

    /// The visitor panicked for a task
    #[error("task \"{id}\" panicked: {reason}")]
    Panicked { id: TaskId, reason: String },
}

/// Options controlling a single walk
#[derive(Debug, Clone)]
pub struct ExecOptions {
    /// Run every eligible task at once, ignoring the concurrency bound
    pub parallel: bool,
    /// Maximum concurrent visitors when not parallel
    pub concurrency: usize,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            parallel: false,
            concurrency: num_cpus(),
        }
    }
}

impl From<&PipelineConfig> for ExecOptions {
    /// Derive walk options from a pipeline configuration
    fn from(config: &PipelineConfig) -> Self {
        Self {
            parallel: false,
            concurrency: config.concurrency.max(1),
        }
    }
}

fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

type VisitOutcome = (NodeIndex, Result<Result<(), VisitorError>, JoinError>);
type VisitFuture = Pin<Box<dyn Future<Output = VisitOutcome> + Send>>;

/// Walks a [`TaskGraph`] with bounded concurrency
pub struct Executor {
    options: ExecOptions,
    reporter: Arc<dyn WalkReporter>,
}

impl Executor {
    /// Create an executor with the given options and a tracing reporter
    pub fn new(options: ExecOptions) -> Self {
        Self {
            options,
            reporter: Arc::new(TracingReporter),
        }
    }

    /// Replace the walk reporter
    pub fn with_reporter(mut self, reporter: Arc<dyn WalkReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Walk the graph, invoking `visitor` once per package-task.
    ///
    /// Returns every error produced by the visitor; an empty list means
    /// success. A failure never cancels tasks already running; tasks that
    /// depend on a failed task are skipped.
    #[instrument(skip_all, fields(
        tasks = graph.task_count(),
        parallel = self.options.parallel,
        concurrency = self.options.concurrency,
    ))]
    pub async fn execute<F, Fut>(&self, graph: &TaskGraph, visitor: F) -> Vec<ExecutionError>
    where
        F: Fn(TaskId) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), VisitorError>> + Send + 'static,
    {
        let started_at = Instant::now();
        self.reporter.report(&WalkEvent::Started {
            total: graph.task_count(),
        });

        // Per-node walk state, indexed by node index: the number of
        // dependencies still outstanding, and whether any dependency failed
        // or was skipped.
        let node_count = graph.node_count();
        let mut outstanding: Vec<usize> = vec![0; node_count];
        let mut tainted: Vec<bool> = vec![false; node_count];
        let mut ready: VecDeque<NodeIndex> = VecDeque::new();

        for index in graph.node_indices() {
            let deps = graph.dependencies_by_index(index).len();
            outstanding[index.index()] = deps;
            if deps == 0 {
                ready.push_back(index);
            }
        }

        let semaphore = Arc::new(Semaphore::new(self.options.concurrency.max(1)));
        let visitor = Arc::new(visitor);
        let mut running: Vec<VisitFuture> = Vec::new();
        let mut errors: Vec<ExecutionError> = Vec::new();
        let mut succeeded = 0usize;
        let mut failed = 0usize;
        let mut skipped = 0usize;

        loop {
            while let Some(index) = ready.pop_front() {
                match graph.node(index) {
                    TaskNode::Root => {
                        debug!("sentinel traversed");
                        Self::settle(graph, index, true, &mut outstanding, &mut tainted, &mut ready);
                    }
                    TaskNode::Task(id) => {
                        if tainted[index.index()] {
                            skipped += 1;
                            self.reporter.report(&WalkEvent::TaskSkipped { id: id.clone() });
                            Self::settle(
                                graph,
                                index,
                                false,
                                &mut outstanding,
                                &mut tainted,
                                &mut ready,
                            );
                        } else {
                            running.push(self.spawn_visit(
                                index,
                                id.clone(),
                                Arc::clone(&visitor),
                                Arc::clone(&semaphore),
                            ));
                        }
                    }
                }
            }

            if running.is_empty() {
                break;
            }

            let ((index, joined), _, rest) = select_all(running).await;
            running = rest;

            let ok = match joined {
                Ok(Ok(())) => {
                    succeeded += 1;
                    true
                }
                Ok(Err(source)) => {
                    failed += 1;
                    if let TaskNode::Task(id) = graph.node(index) {
                        errors.push(ExecutionError::Visitor {
                            id: id.clone(),
                            source,
                        });
                    }
                    false
                }
                Err(join_error) => {
                    failed += 1;
                    if let TaskNode::Task(id) = graph.node(index) {
                        errors.push(ExecutionError::Panicked {
                            id: id.clone(),
                            reason: join_error.to_string(),
                        });
                    }
                    false
                }
            };
            Self::settle(graph, index, ok, &mut outstanding, &mut tainted, &mut ready);
        }

        self.reporter.report(&WalkEvent::Finished {
            succeeded,
            failed,
            skipped,
            duration: started_at.elapsed(),
        });
        errors
    }

    /// Spawn one visitor invocation, holding a semaphore permit for its
    /// whole duration unless the walk is parallel.
    fn spawn_visit<F, Fut>(
        &self,
        index: NodeIndex,
        id: TaskId,
        visitor: Arc<F>,
        semaphore: Arc<Semaphore>,
    ) -> VisitFuture
    where
        F: Fn(TaskId) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), VisitorError>> + Send + 'static,
    {
        let limiter = (!self.options.parallel).then_some(semaphore);
        let reporter = Arc::clone(&self.reporter);

        let handle = tokio::spawn(async move {
            let _permit = match limiter {
                Some(sem) => Some(sem.acquire_owned().await.unwrap()),
                None => None,
            };
            reporter.report(&WalkEvent::TaskStarted { id: id.clone() });
            let visit_start = Instant::now();
            let result = visitor(id.clone()).await;
            let duration = visit_start.elapsed();
            match &result {
                Ok(()) => reporter.report(&WalkEvent::TaskCompleted { id, duration }),
                Err(error) => reporter.report(&WalkEvent::TaskFailed {
                    id,
                    duration,
                    error: error.to_string(),
                }),
            }
            result
        });

        Box::pin(async move { (index, handle.await) })
    }

    /// Record a node's completion: dependents with no remaining
    /// dependencies become ready. A failed or skipped node taints its
    /// dependents, which will be skipped rather than visited.
    fn settle(
        graph: &TaskGraph,
        index: NodeIndex,
        ok: bool,
        outstanding: &mut [usize],
        tainted: &mut [bool],
        ready: &mut VecDeque<NodeIndex>,
    ) {
        for dependent in graph.dependents_by_index(index) {
            let slot = dependent.index();
            if !ok {
                tainted[slot] = true;
            }
            outstanding[slot] = outstanding[slot].saturating_sub(1);
            if outstanding[slot] == 0 {
                ready.push_back(dependent);
            }
        }
    }
}
