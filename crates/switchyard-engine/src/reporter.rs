//! Walk progress reporting

use std::time::Duration;

use crate::task::TaskId;

/// Events emitted during a task-graph walk
#[derive(Debug, Clone)]
pub enum WalkEvent {
    /// The walk is starting
    Started { total: usize },
    /// A task's visitor is starting
    TaskStarted { id: TaskId },
    /// A task's visitor completed successfully
    TaskCompleted { id: TaskId, duration: Duration },
    /// A task's visitor failed
    TaskFailed {
        id: TaskId,
        duration: Duration,
        error: String,
    },
    /// A task was skipped because a dependency failed
    TaskSkipped { id: TaskId },
    /// The walk finished
    Finished {
        succeeded: usize,
        failed: usize,
        skipped: usize,
        duration: Duration,
    },
}

/// Trait for reporting walk progress
pub trait WalkReporter: Send + Sync {
    /// Handle a walk event
    fn report(&self, event: &WalkEvent);
}

/// Reporter that logs to tracing
#[derive(Debug, Default)]
pub struct TracingReporter;

impl WalkReporter for TracingReporter {
    fn report(&self, event: &WalkEvent) {
        match event {
            WalkEvent::Started { total } => {
                tracing::info!("Walking task graph ({} tasks)", total);
            }
            WalkEvent::TaskStarted { id } => {
                tracing::info!("Starting {}", id);
            }
            WalkEvent::TaskCompleted { id, duration } => {
                tracing::info!("{} completed in {:.1}s", id, duration.as_secs_f64());
            }
            WalkEvent::TaskFailed {
                id,
                duration,
                error,
            } => {
                tracing::error!("{} failed after {:.1}s: {}", id, duration.as_secs_f64(), error);
            }
            WalkEvent::TaskSkipped { id } => {
                tracing::warn!("{} skipped: a dependency failed", id);
            }
            WalkEvent::Finished {
                succeeded,
                failed,
                skipped,
                duration,
            } => {
                tracing::info!(
                    "Walk complete: {} succeeded, {} failed, {} skipped ({:.1}s)",
                    succeeded,
                    failed,
                    skipped,
                    duration.as_secs_f64()
                );
            }
        }
    }
}

/// Reporter that collects events for later inspection (useful for testing)
#[derive(Debug, Default)]
pub struct CollectingReporter {
    events: std::sync::Mutex<Vec<WalkEvent>>,
}

impl CollectingReporter {
    /// Get all collected events
    pub fn events(&self) -> Vec<WalkEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl WalkReporter for CollectingReporter {
    fn report(&self, event: &WalkEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}
