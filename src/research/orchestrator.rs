//! Orchestrator for the parallel research pipeline.
//!
//! Coordinates the full run: goal definition → background context →
//! objective decomposition → N concurrent sub-agents → synthesis.
//! Every external call goes through the retry executor, every component
//! records into the per-run metrics collector, and stage transitions
//! are reported through the injected progress sink.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use super::config::ResearchConfig;
use super::coordinator::Coordinator;
use super::finding::FinalReport;
use super::metrics::{CallKind, MetricsCollector, MetricsSnapshot};
use super::notify::{NullProgress, ProgressSink};
use super::prompt::PromptSet;
use super::provider::LlmProvider;
use super::retry::RetryExecutor;
use super::scheduler::Scheduler;
use super::search::SearchProvider;
use super::subagent::SubAgentRunner;
use super::synthesizer::Synthesizer;
use crate::error::ResearchError;

/// Maximum accepted query length in bytes.
const MAX_QUERY_LEN: usize = 10_000;

/// Outcome of one research run.
#[derive(Debug, Clone)]
pub struct ResearchRun {
    /// The final report.
    pub report: FinalReport,
    /// Drained metrics for the run.
    pub metrics: MetricsSnapshot,
    /// Total wall-clock time.
    pub elapsed: Duration,
}

/// Orchestrates the research pipeline.
pub struct Orchestrator {
    provider: Arc<dyn LlmProvider>,
    search: Arc<dyn SearchProvider>,
    sink: Arc<dyn ProgressSink>,
    config: ResearchConfig,
    prompts: PromptSet,
}

impl Orchestrator {
    /// Creates an orchestrator over explicit providers.
    ///
    /// Loads prompt templates from the directory specified in
    /// [`ResearchConfig::prompt_dir`], falling back to compiled-in
    /// defaults.
    #[must_use]
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        search: Arc<dyn SearchProvider>,
        config: ResearchConfig,
    ) -> Self {
        let prompts = PromptSet::load(config.prompt_dir.as_deref());
        Self {
            provider,
            search,
            sink: Arc::new(NullProgress),
            config,
            prompts,
        }
    }

    /// Creates an orchestrator with the default providers resolved
    /// from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ResearchError`] if a provider cannot be constructed.
    pub fn from_config(config: ResearchConfig) -> Result<Self, ResearchError> {
        let provider = super::client::create_provider(&config)?;
        let search = Arc::new(super::search::ExaSearch::new(&config)?);
        Ok(Self::new(provider, search, config))
    }

    /// Replaces the progress sink.
    #[must_use]
    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Executes the full research pipeline for the query.
    ///
    /// # Steps
    ///
    /// 1. Define the research goal and gather background context
    /// 2. Decompose into 2–5 objectives (or the single fallback)
    /// 3. Run one sub-agent per objective concurrently
    /// 4. Synthesize all results into the final report
    ///
    /// # Errors
    ///
    /// Returns [`ResearchError::Orchestration`] for an invalid query
    /// and [`ResearchError::TotalFailure`] when every sub-agent failed.
    /// All other failures degrade: the run yields a report with gap
    /// notes rather than an error.
    pub async fn run(&self, query: &str) -> Result<ResearchRun, ResearchError> {
        if query.trim().is_empty() {
            return Err(ResearchError::Orchestration {
                message: "query cannot be empty".to_string(),
            });
        }
        if query.len() > MAX_QUERY_LEN {
            return Err(ResearchError::Orchestration {
                message: format!(
                    "query exceeds maximum length ({} bytes, max {MAX_QUERY_LEN})",
                    query.len()
                ),
            });
        }

        let started = Instant::now();
        let metrics = Arc::new(MetricsCollector::new());
        let retry = RetryExecutor::new(
            self.config.retry,
            self.config.parse_retries,
            Arc::clone(&metrics),
        );
        let deadline = self
            .config
            .deadline
            .map(|d| tokio::time::Instant::now() + d);

        // Step 1: goal + background context
        self.sink.notify("Gathering initial context...");
        let coordinator = Coordinator::new(&self.config, &self.prompts);
        let (goal, background_query) = coordinator
            .define_goal(self.provider.as_ref(), &retry, &metrics, query)
            .await;
        let background = self
            .gather_background(&retry, &metrics, &background_query)
            .await;

        // Step 2: objectives
        self.sink.notify("Setting research objectives...");
        let objectives = coordinator
            .identify_objectives(
                self.provider.as_ref(),
                &retry,
                &metrics,
                &goal,
                &background,
            )
            .await;
        info!(count = objectives.len(), "objectives identified");

        // Step 3: concurrent sub-agents
        self.sink
            .notify(&format!("Researching {} objectives...", objectives.len()));
        let runner = Arc::new(SubAgentRunner::new(
            Arc::clone(&self.provider),
            Arc::clone(&self.search),
            retry.clone(),
            Arc::clone(&metrics),
            Arc::clone(&self.sink),
            &self.config,
            &self.prompts,
        ));
        let scheduler = Scheduler::new(runner, Arc::clone(&metrics));
        let results = scheduler.run(objectives, deadline).await?;

        // Step 4: synthesis
        self.sink.notify("Synthesizing comprehensive answer...");
        let synthesizer = Synthesizer::new(&self.config, &self.prompts);
        let report = synthesizer
            .combine(self.provider.as_ref(), &retry, &metrics, &goal, &results)
            .await;

        self.sink.notify("Research complete.");
        Ok(ResearchRun {
            report,
            metrics: metrics.drain(),
            elapsed: started.elapsed(),
        })
    }

    /// Runs the introductory background search. Failures degrade to an
    /// empty context rather than affecting the run.
    async fn gather_background(
        &self,
        retry: &RetryExecutor,
        metrics: &MetricsCollector,
        background_query: &str,
    ) -> String {
        let result = retry
            .execute(CallKind::Search, "background_search", || {
                self.search.search(background_query)
            })
            .await;

        match result {
            Ok(outcome) => {
                let succeeded = outcome.hits.len() as u64;
                metrics.record_urls(outcome.found, outcome.crawled, succeeded, outcome.failed);
                let chars: usize = outcome.hits.iter().map(|h| h.content.len()).sum();
                metrics.record_chars(chars as u64);
                debug!(hits = outcome.hits.len(), "background context gathered");
                outcome
                    .hits
                    .iter()
                    .map(|h| format!("From {}: {}", h.title, h.content))
                    .collect::<Vec<_>>()
                    .join("\n\n")
            }
            Err(e) => {
                metrics.warning(&format!("background search failed, proceeding without: {e}"));
                String::new()
            }
        }
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("provider", &self.provider.name())
            .field("search", &self.search.name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::research::finding::AgentStatus;
    use crate::research::testing::{FnProvider, FnSearch, outcome_for, system_prompt_of, text_response};
    use std::sync::Mutex;

    const GOAL_JSON: &str = r#"{
        "statement": "assess the impact of AI on healthcare",
        "scope": "clinical and operational impact",
        "background_query": "AI in healthcare overview"
    }"#;
    const OBJECTIVES_JSON: &str = r#"{
        "objectives": ["AI diagnostics", "AI in hospital operations", "AI regulation in medicine"]
    }"#;
    const REASONING_JSON: &str =
        r#"{"analysis": "a", "reasoning": "r", "queries": ["q1", "q2"]}"#;
    const EVALUATION_JSON: &str = r#"{"summary": "covered", "decision": "FINISH"}"#;

    fn full_provider() -> Arc<FnProvider> {
        let prompts = PromptSet::defaults();
        Arc::new(FnProvider::new(move |req, _i| {
            let system = system_prompt_of(req);
            if system == prompts.goal {
                Ok(text_response(GOAL_JSON))
            } else if system == prompts.objectives {
                Ok(text_response(OBJECTIVES_JSON))
            } else if system == prompts.reasoning {
                Ok(text_response(REASONING_JSON))
            } else if system == prompts.evaluation {
                Ok(text_response(EVALUATION_JSON))
            } else {
                Ok(text_response("# The synthesized report"))
            }
        }))
    }

    fn config() -> ResearchConfig {
        ResearchConfig::builder()
            .api_key("k")
            .search_api_key("k")
            .max_objectives(3)
            .max_rounds(2)
            .queries_per_round(2)
            .build()
            .unwrap_or_else(|_| unreachable!())
    }

    struct RecordingSink {
        stages: Mutex<Vec<String>>,
    }

    impl ProgressSink for RecordingSink {
        fn notify(&self, stage: &str) {
            if let Ok(mut stages) = self.stages.lock() {
                stages.push(stage.to_string());
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_to_end_three_objectives() {
        let provider = full_provider();
        let search = Arc::new(FnSearch::new(|q, _i| Ok(outcome_for(q))));
        let orchestrator = Orchestrator::new(
            provider,
            Arc::clone(&search) as Arc<dyn SearchProvider>,
            config(),
        );

        let run = orchestrator
            .run("impact of AI on healthcare")
            .await
            .unwrap_or_else(|_| unreachable!());

        let report = &run.report;
        assert_eq!(report.sections.len(), 3);
        assert_eq!(
            report.sections[0].objective.directive,
            "AI diagnostics"
        );
        assert_eq!(
            report.sections[2].objective.directive,
            "AI regulation in medicine"
        );
        assert!(report.sections.iter().all(|s| s.status == AgentStatus::Ok));
        assert!(report.gaps.is_empty());
        assert!(!report.fallback);
        assert_eq!(report.narrative, "# The synthesized report");
        assert!(!report.sources.is_empty());

        // 1 background search + 3 agents × 1 round × 2 queries
        assert_eq!(search.call_count(), 7);
        // Goal + objectives + 3×(reason + evaluate) + synthesis
        assert_eq!(run.metrics.llm_calls, 9);
        assert_eq!(run.metrics.llm_failures, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_stages_reported() {
        let provider = full_provider();
        let search = Arc::new(FnSearch::new(|q, _i| Ok(outcome_for(q))));
        let sink = Arc::new(RecordingSink {
            stages: Mutex::new(Vec::new()),
        });
        let orchestrator =
            Orchestrator::new(provider, search as Arc<dyn SearchProvider>, config())
                .with_progress(Arc::clone(&sink) as Arc<dyn ProgressSink>);

        orchestrator
            .run("anything")
            .await
            .unwrap_or_else(|_| unreachable!());

        let stages = sink.stages.lock().unwrap_or_else(|_| unreachable!()).clone();
        assert!(stages[0].contains("initial context"));
        assert!(stages.iter().any(|s| s.contains("objectives")));
        assert!(
            stages
                .last()
                .unwrap_or(&String::new())
                .contains("complete")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_query_rejected() {
        let provider = full_provider();
        let search = Arc::new(FnSearch::new(|q, _i| Ok(outcome_for(q))));
        let orchestrator = Orchestrator::new(provider, search, config());

        let result = orchestrator.run("   ").await;
        assert!(matches!(
            result,
            Err(ResearchError::Orchestration { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_oversized_query_rejected() {
        let provider = full_provider();
        let search = Arc::new(FnSearch::new(|q, _i| Ok(outcome_for(q))));
        let orchestrator = Orchestrator::new(provider, search, config());

        let result = orchestrator.run(&"x".repeat(MAX_QUERY_LEN + 1)).await;
        assert!(matches!(
            result,
            Err(ResearchError::Orchestration { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_search_failure_degrades() {
        let provider = full_provider();
        // Background search is the first search call.
        let search = Arc::new(FnSearch::new(|q, _i| {
            if q == "AI in healthcare overview" {
                Err(ResearchError::SearchRequest {
                    message: "unavailable".to_string(),
                    status: Some(404),
                })
            } else {
                Ok(outcome_for(q))
            }
        }));
        let orchestrator = Orchestrator::new(provider, search, config());

        let run = orchestrator
            .run("impact of AI on healthcare")
            .await
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(run.report.sections.len(), 3);
        assert!(
            run.metrics
                .warnings
                .iter()
                .any(|w| w.message.contains("background search failed"))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_agents_failed_is_total_failure() {
        let prompts = PromptSet::defaults();
        let provider = Arc::new(FnProvider::new(move |req, _i| {
            let system = system_prompt_of(req);
            if system == prompts.goal {
                Ok(text_response(GOAL_JSON))
            } else if system == prompts.objectives {
                Ok(text_response(OBJECTIVES_JSON))
            } else {
                // Every sub-agent reasoning call fails hard.
                Err(ResearchError::ApiRequest {
                    message: "model revoked".to_string(),
                    status: Some(403),
                })
            }
        }));
        let search = Arc::new(FnSearch::new(|q, _i| Ok(outcome_for(q))));
        let orchestrator = Orchestrator::new(provider, search, config());

        let result = orchestrator.run("impact of AI on healthcare").await;
        match result {
            Err(ResearchError::TotalFailure { errors }) => {
                assert_eq!(errors.len(), 3);
            }
            _ => unreachable!("expected TotalFailure"),
        }
    }
}
