//! Sub-agent: the bounded round loop for one objective.
//!
//! Each round is a reason → query → retrieve → evaluate cycle:
//!
//! - `REASONING`: one LLM call consumes the objective and every finding
//!   gathered so far, producing an analysis and this round's queries.
//! - `QUERYING`/`RETRIEVING`: the queries are dispatched concurrently
//!   to the retrieval provider, each call independently wrapped by the
//!   retry executor; results merge into the round's findings tagged
//!   with their originating query.
//! - `EVALUATING`: one LLM call summarizes the round and decides
//!   `CONTINUE` or `FINISH`.
//!
//! The loop ends on an explicit `FINISH`, at `max_rounds` (forced
//! terminal, reported as degraded), or when a reasoning/evaluation call
//! exhausts its retries. Failures never propagate upward: the runner
//! always returns a [`SubAgentResult`]. A single retrieval query
//! failing after retries removes only that query's contribution.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures_util::future::join_all;
use tracing::{debug, info, warn};

use super::config::ResearchConfig;
use super::finding::{
    AgentStatus, Finding, Objective, RoundDecision, RoundEvaluation, RoundOutcome, RoundPlan,
    SubAgentResult,
};
use super::metrics::{CallKind, MetricsCollector};
use super::notify::ProgressSink;
use super::prompt::{PromptSet, build_evaluation_prompt, build_reasoning_prompt};
use super::provider::LlmProvider;
use super::retry::RetryExecutor;
use super::search::SearchProvider;
use super::traits::{Agent, decode_structured};
use crate::error::ResearchError;

/// Agent wrapper for a sub-agent's structured-output calls.
struct RoundAgent {
    name: &'static str,
    model: String,
    max_tokens: u32,
    system_prompt: String,
}

#[async_trait]
impl Agent for RoundAgent {
    fn name(&self) -> &'static str {
        self.name
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn json_mode(&self) -> bool {
        true
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }
}

/// Runs the bounded round loop for one objective.
pub struct SubAgentRunner {
    provider: Arc<dyn LlmProvider>,
    search: Arc<dyn SearchProvider>,
    retry: RetryExecutor,
    metrics: Arc<MetricsCollector>,
    sink: Arc<dyn ProgressSink>,
    config: ResearchConfig,
    prompts: PromptSet,
}

impl SubAgentRunner {
    /// Creates a runner sharing the given providers and collectors.
    #[must_use]
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        search: Arc<dyn SearchProvider>,
        retry: RetryExecutor,
        metrics: Arc<MetricsCollector>,
        sink: Arc<dyn ProgressSink>,
        config: &ResearchConfig,
        prompts: &PromptSet,
    ) -> Self {
        Self {
            provider,
            search,
            retry,
            metrics,
            sink,
            config: config.clone(),
            prompts: prompts.clone(),
        }
    }

    /// Executes the round loop for the objective.
    ///
    /// Never returns an error: every failure is folded into the
    /// returned [`SubAgentResult`]'s status and error detail. With a
    /// deadline set, no new round starts after expiry; the in-flight
    /// round completes its evaluation step.
    pub async fn run(
        &self,
        objective: Objective,
        deadline: Option<tokio::time::Instant>,
    ) -> SubAgentResult {
        let started = Instant::now();
        let max_rounds = self.config.max_rounds;

        let mut rounds: Vec<RoundOutcome> = Vec::new();
        let mut findings: Vec<Finding> = Vec::new();
        let mut summary = String::new();
        let mut status = AgentStatus::Ok;
        let mut error: Option<String> = None;
        let mut finished = false;

        for round in 1..=max_rounds {
            if let Some(deadline) = deadline
                && tokio::time::Instant::now() >= deadline
            {
                warn!(objective = objective.index, round, "deadline expired, stopping agent");
                self.metrics.warning(&format!(
                    "objective {}: deadline expired before round {round}",
                    objective.index + 1
                ));
                status = AgentStatus::Degraded;
                error = Some(format!("deadline expired before round {round}"));
                break;
            }

            self.sink.notify(&format!(
                "Objective {}: research round {round}/{max_rounds}...",
                objective.index + 1
            ));

            // REASONING
            let plan = match self.reason(&objective.directive, &findings, round).await {
                Ok(plan) => plan,
                Err(e) => {
                    warn!(objective = objective.index, round, error = %e, "reasoning failed");
                    status = if findings.is_empty() {
                        AgentStatus::Failed
                    } else {
                        AgentStatus::Degraded
                    };
                    error = Some(format!("reasoning failed in round {round}: {e}"));
                    break;
                }
            };
            debug!(
                objective = objective.index,
                round,
                queries = plan.queries.len(),
                "round planned"
            );

            // QUERYING / RETRIEVING
            let round_findings = self.retrieve(&plan.queries).await;

            // EVALUATING
            let evaluation = match self
                .evaluate(&objective.directive, &summary, &round_findings, round)
                .await
            {
                Ok(evaluation) => evaluation,
                Err(e) => {
                    warn!(objective = objective.index, round, error = %e, "evaluation failed");
                    // Keep what this round retrieved even though the
                    // round itself did not complete.
                    findings.extend(round_findings);
                    status = if findings.is_empty() {
                        AgentStatus::Failed
                    } else {
                        AgentStatus::Degraded
                    };
                    error = Some(format!("evaluation failed in round {round}: {e}"));
                    break;
                }
            };

            let decision = evaluation.parsed_decision();
            summary = evaluation.summary;
            findings.extend(round_findings.iter().cloned());
            rounds.push(RoundOutcome {
                round,
                analysis: plan.analysis,
                reasoning: plan.reasoning,
                queries: plan.queries,
                findings: round_findings,
                summary: summary.clone(),
                decision,
            });

            if decision == RoundDecision::Finish {
                finished = true;
                break;
            }
        }

        // Forced terminal: the round budget ran out before the agent
        // decided to finish.
        if status == AgentStatus::Ok && !finished {
            status = AgentStatus::Degraded;
            error = Some(format!(
                "round budget of {max_rounds} exhausted before the agent decided to finish"
            ));
        }

        let rounds_completed = rounds.len();
        debug_assert!(rounds_completed <= max_rounds);

        let mut seen: HashSet<&str> = HashSet::new();
        let sources: Vec<String> = findings
            .iter()
            .filter(|f| seen.insert(f.url.as_str()))
            .map(|f| f.url.clone())
            .collect();

        info!(
            objective = objective.index,
            rounds = rounds_completed,
            findings = findings.len(),
            status = %status,
            "sub-agent finished"
        );

        SubAgentResult {
            objective,
            rounds,
            findings,
            sources,
            rounds_completed,
            status,
            error,
            elapsed: started.elapsed(),
        }
    }

    /// One reasoning call: analysis plus this round's queries.
    async fn reason(
        &self,
        objective: &str,
        findings: &[Finding],
        round: usize,
    ) -> Result<RoundPlan, ResearchError> {
        let agent = RoundAgent {
            name: "subagent_reasoning",
            model: self.config.agent_model.clone(),
            max_tokens: self.config.agent_max_tokens,
            system_prompt: self.prompts.reasoning.clone(),
        };
        let max_rounds = self.config.max_rounds;
        let query_count = self.config.queries_per_round;

        self.retry
            .execute_with_reprompt("subagent_reasoning", |correction| {
                let user_msg = build_reasoning_prompt(
                    objective,
                    findings,
                    round,
                    max_rounds,
                    query_count,
                    correction.as_deref(),
                );
                let agent = &agent;
                async move {
                    let response = agent.execute(self.provider.as_ref(), &user_msg).await?;
                    let mut plan = decode_structured::<RoundPlan>(&response.content)?;
                    plan.queries.retain(|q| !q.trim().is_empty());
                    if plan.queries.is_empty() {
                        return Err(ResearchError::ResponseParse {
                            message: "round plan contained no queries".to_string(),
                            content: response.content,
                        });
                    }
                    plan.queries.truncate(query_count);
                    Ok(plan)
                }
            })
            .await
    }

    /// Dispatches the round's queries concurrently and merges findings.
    ///
    /// Fan-out width equals the number of queries, itself bounded by
    /// `queries_per_round`. A query failing after retries contributes
    /// nothing but does not fail the round.
    async fn retrieve(&self, queries: &[String]) -> Vec<Finding> {
        let calls = queries.iter().map(|query| async move {
            let result = self
                .retry
                .execute(CallKind::Search, "search", || self.search.search(query))
                .await;

            match result {
                Ok(outcome) => {
                    let succeeded = outcome.hits.len() as u64;
                    self.metrics
                        .record_urls(outcome.found, outcome.crawled, succeeded, outcome.failed);
                    let chars: usize = outcome.hits.iter().map(|h| h.content.len()).sum();
                    self.metrics.record_chars(chars as u64);

                    outcome
                        .hits
                        .into_iter()
                        .map(|hit| Finding {
                            text: hit.content,
                            title: hit.title,
                            url: hit.url,
                            query: query.clone(),
                        })
                        .collect()
                }
                Err(e) => {
                    warn!(query = %query, error = %e, "retrieval query failed, dropping its contribution");
                    self.metrics
                        .warning(&format!("query '{query}' dropped: {e}"));
                    Vec::new()
                }
            }
        });

        join_all(calls).await.into_iter().flatten().collect()
    }

    /// One evaluation call: running summary plus the round decision.
    async fn evaluate(
        &self,
        objective: &str,
        previous_summary: &str,
        round_findings: &[Finding],
        round: usize,
    ) -> Result<RoundEvaluation, ResearchError> {
        let agent = RoundAgent {
            name: "subagent_evaluation",
            model: self.config.agent_model.clone(),
            max_tokens: self.config.agent_max_tokens,
            system_prompt: self.prompts.evaluation.clone(),
        };
        let max_rounds = self.config.max_rounds;

        self.retry
            .execute_with_reprompt("subagent_evaluation", |correction| {
                let user_msg = build_evaluation_prompt(
                    objective,
                    previous_summary,
                    round_findings,
                    round,
                    max_rounds,
                    correction.as_deref(),
                );
                let agent = &agent;
                async move {
                    let response = agent.execute(self.provider.as_ref(), &user_msg).await?;
                    decode_structured::<RoundEvaluation>(&response.content)
                }
            })
            .await
    }
}
