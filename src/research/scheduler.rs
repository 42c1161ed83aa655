//! Scheduler: concurrent fan-out of sub-agents and fault-tolerant join.
//!
//! One independent task is spawned per objective. The join waits for
//! every task to reach a terminal state regardless of individual
//! outcomes; one task's failure never cancels its siblings. Results are
//! collected keyed by objective index, so downstream consumers iterate
//! in the original objective order no matter when each task finished.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::finding::{AgentStatus, Objective, SubAgentResult};
use super::metrics::MetricsCollector;
use super::subagent::SubAgentRunner;
use crate::error::ResearchError;

/// Launches one sub-agent per objective and joins all outcomes.
pub struct Scheduler {
    runner: Arc<SubAgentRunner>,
    metrics: Arc<MetricsCollector>,
}

impl Scheduler {
    /// Creates a scheduler over the given runner.
    #[must_use]
    pub fn new(runner: Arc<SubAgentRunner>, metrics: Arc<MetricsCollector>) -> Self {
        Self { runner, metrics }
    }

    /// Runs every objective concurrently and collects results in
    /// objective order.
    ///
    /// A task that panics is folded into the result set as a failed
    /// agent rather than aborting the run. Degraded and failed
    /// objectives are recorded in the metrics warning log.
    ///
    /// # Errors
    ///
    /// Returns [`ResearchError::TotalFailure`] only when every
    /// sub-agent ends [`AgentStatus::Failed`], carrying one error
    /// description per objective.
    pub async fn run(
        &self,
        objectives: Vec<Objective>,
        deadline: Option<tokio::time::Instant>,
    ) -> Result<Vec<SubAgentResult>, ResearchError> {
        let expected = objectives.len();
        info!(objectives = expected, "launching sub-agents");

        let mut handles = Vec::with_capacity(expected);
        for objective in objectives {
            let runner = Arc::clone(&self.runner);
            // Retained for fabricating a failed result if the task dies.
            let fallback = objective.clone();
            let handle = tokio::spawn(async move { runner.run(objective, deadline).await });
            handles.push((fallback, handle));
        }

        // Await in spawn order: the result vector is keyed by objective
        // index, not completion order.
        let mut results = Vec::with_capacity(expected);
        for (fallback, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => {
                    warn!(objective = fallback.index, error = %e, "sub-agent task died");
                    self.metrics
                        .error(&format!("sub-agent task for objective {} died: {e}", fallback.index + 1));
                    SubAgentResult::failed(
                        fallback,
                        format!("task join failed: {e}"),
                        Duration::ZERO,
                    )
                }
            };
            results.push(result);
        }

        debug_assert_eq!(results.len(), expected);
        debug_assert!(
            results
                .iter()
                .enumerate()
                .all(|(i, r)| r.objective.index == i),
            "result order must equal objective order"
        );

        for result in &results {
            match result.status {
                AgentStatus::Ok => {}
                AgentStatus::Degraded | AgentStatus::Failed => {
                    self.metrics.warning(&format!(
                        "objective {} ended {}: {}",
                        result.objective.index + 1,
                        result.status,
                        result.error.as_deref().unwrap_or("no detail")
                    ));
                }
            }
        }

        if results.iter().all(|r| r.status == AgentStatus::Failed) {
            let errors: Vec<String> = results
                .iter()
                .map(|r| {
                    format!(
                        "objective {}: {}",
                        r.objective.index + 1,
                        r.error.as_deref().unwrap_or("unknown failure")
                    )
                })
                .collect();
            return Err(ResearchError::TotalFailure { errors });
        }

        debug!(
            ok = results.iter().filter(|r| r.status == AgentStatus::Ok).count(),
            degraded = results
                .iter()
                .filter(|r| r.status == AgentStatus::Degraded)
                .count(),
            failed = results
                .iter()
                .filter(|r| r.status == AgentStatus::Failed)
                .count(),
            "sub-agents joined"
        );

        Ok(results)
    }
}
