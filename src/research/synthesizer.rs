//! Synthesizer: combines all sub-agent outputs into one report.
//!
//! The report's sections are built deterministically in objective order
//! with explicit gap notes for degraded and failed objectives. The
//! narrative comes from one language-model call over those sections;
//! if that call exhausts its retries, the narrative falls back to a
//! plain concatenation of each agent's round summaries, so the run
//! always terminates with output and the failure path has no residual
//! language-model dependency.

use std::fmt::Write as _;

use async_trait::async_trait;
use tracing::{info, warn};

use super::config::ResearchConfig;
use super::finding::{AgentStatus, FinalReport, ReportSection, ResearchGoal, SubAgentResult};
use super::metrics::{CallKind, MetricsCollector};
use super::prompt::{PromptSet, build_synthesizer_prompt};
use super::provider::LlmProvider;
use super::retry::RetryExecutor;
use super::traits::Agent;

/// Agent wrapper for the synthesis call.
struct SynthesizerAgent {
    model: String,
    max_tokens: u32,
    system_prompt: String,
}

#[async_trait]
impl Agent for SynthesizerAgent {
    fn name(&self) -> &'static str {
        "synthesizer"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn temperature(&self) -> f32 {
        0.1
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }
}

/// Builds the final report from all sub-agent results.
pub struct Synthesizer {
    config: ResearchConfig,
    prompts: PromptSet,
}

impl Synthesizer {
    /// Creates a synthesizer with the given configuration and prompts.
    #[must_use]
    pub fn new(config: &ResearchConfig, prompts: &PromptSet) -> Self {
        Self {
            config: config.clone(),
            prompts: prompts.clone(),
        }
    }

    /// Combines the results into a [`FinalReport`].
    ///
    /// `results` must be in objective order; the report preserves it.
    /// This never fails: an unreachable synthesis model produces the
    /// deterministic fallback narrative instead.
    pub async fn combine(
        &self,
        provider: &dyn LlmProvider,
        retry: &RetryExecutor,
        metrics: &MetricsCollector,
        goal: &ResearchGoal,
        results: &[SubAgentResult],
    ) -> FinalReport {
        let sections = Self::build_sections(results);
        let gaps: Vec<usize> = results
            .iter()
            .filter(|r| r.status != AgentStatus::Ok)
            .map(|r| r.objective.index)
            .collect();

        let prompt_sections: Vec<(String, String)> = sections
            .iter()
            .map(|s| (Self::section_heading(s), s.body.clone()))
            .collect();
        let user_msg = build_synthesizer_prompt(goal, &prompt_sections);

        let agent = SynthesizerAgent {
            model: self.config.synthesizer_model.clone(),
            max_tokens: self.config.synthesizer_max_tokens,
            system_prompt: self.prompts.synthesizer.clone(),
        };

        let (narrative, fallback) = match retry
            .execute(CallKind::Llm, "synthesis", || {
                let user_msg = &user_msg;
                let agent = &agent;
                async move { agent.execute(provider, user_msg).await }
            })
            .await
        {
            Ok(response) => (response.content, false),
            Err(e) => {
                warn!(error = %e, "synthesis call failed, using deterministic fallback");
                metrics.warning(&format!("synthesis degraded to concatenation: {e}"));
                (Self::fallback_narrative(goal, &sections), true)
            }
        };

        info!(
            sections = sections.len(),
            gaps = gaps.len(),
            fallback,
            "report assembled"
        );

        FinalReport {
            goal: goal.clone(),
            narrative,
            sections,
            sources: FinalReport::group_sources(results),
            gaps,
            fallback,
        }
    }

    /// Builds one section per result, in the given (objective) order.
    fn build_sections(results: &[SubAgentResult]) -> Vec<ReportSection> {
        results
            .iter()
            .map(|result| ReportSection {
                objective: result.objective.clone(),
                status: result.status,
                body: Self::section_body(result),
            })
            .collect()
    }

    fn section_heading(section: &ReportSection) -> String {
        format!(
            "Objective {}: {} [{}]",
            section.objective.index + 1,
            section.objective.directive,
            section.status.as_str().to_uppercase()
        )
    }

    fn section_body(result: &SubAgentResult) -> String {
        match result.status {
            AgentStatus::Failed => format!(
                "No findings available. Research for this objective failed: {}.",
                result.error.as_deref().unwrap_or("unknown failure")
            ),
            AgentStatus::Ok | AgentStatus::Degraded => {
                let mut body = result.round_summaries();
                if body.is_empty() {
                    body = if result.findings.is_empty() {
                        "No summary was produced for this objective.".to_string()
                    } else {
                        // Rounds broke off before an evaluation; fall
                        // back to the raw findings.
                        result
                            .findings
                            .iter()
                            .map(|f| format!("- [{}] {}", f.url, f.text))
                            .collect::<Vec<_>>()
                            .join("\n")
                    };
                }
                if result.status == AgentStatus::Degraded {
                    let _ = write!(
                        body,
                        "\nNote: research for this objective was incomplete: {}.",
                        result.error.as_deref().unwrap_or("no detail")
                    );
                }
                body
            }
        }
    }

    /// Deterministic no-model narrative: the goal plus every section's
    /// own summaries, in objective order.
    fn fallback_narrative(goal: &ResearchGoal, sections: &[ReportSection]) -> String {
        let mut out = format!(
            "# Research findings\n\nQuestion: {}\nGoal: {}\n",
            goal.query, goal.statement
        );
        for section in sections {
            let _ = write!(
                out,
                "\n## {}\n{}\n",
                Self::section_heading(section),
                section.body
            );
        }
        out
    }
}
