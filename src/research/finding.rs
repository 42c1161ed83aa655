//! Data types for the research pipeline.
//!
//! These types flow through the whole run: the coordinator produces a
//! [`ResearchGoal`] and [`Objective`] list, each sub-agent accumulates
//! [`Finding`]s across [`RoundOutcome`]s, the scheduler collects one
//! [`SubAgentResult`] per objective, and the synthesizer folds them
//! into a [`FinalReport`].

use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// The research goal derived once from the user query.
///
/// Immutable after creation. Owned by the coordinator and read by the
/// synthesizer for framing the final report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchGoal {
    /// The user's original question, verbatim.
    pub query: String,
    /// Free-text goal statement.
    pub statement: String,
    /// Scope note bounding what the research should and should not cover.
    #[serde(default)]
    pub scope: String,
}

/// One decomposed research directive, owned by exactly one sub-agent.
///
/// The index is the objective's identity: the scheduler keys its result
/// set by it and the final report preserves it as section order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Objective {
    /// Position in the coordinator's objective list (0-based).
    pub index: usize,
    /// The research directive text.
    pub directive: String,
}

/// A single piece of retrieved content attributed to a source and query.
///
/// Append-only: findings are never mutated after a sub-agent records
/// them, and their order within a result is discovery order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    /// Extracted text content.
    pub text: String,
    /// Source page title, when the provider returned one.
    #[serde(default)]
    pub title: String,
    /// Source URL.
    pub url: String,
    /// The search query that surfaced this finding.
    pub query: String,
}

/// Decision emitted by a sub-agent's evaluation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RoundDecision {
    /// Keep researching: start another round.
    Continue,
    /// Enough information gathered: stop.
    Finish,
}

impl RoundDecision {
    /// Parses a decision string (case-insensitive).
    ///
    /// Anything that is not recognizably `FINISH` is treated as
    /// `Continue`, so an unparsable decision keeps the agent running
    /// until `max_rounds` bounds it.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("finish") {
            Self::Finish
        } else {
            Self::Continue
        }
    }

    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Continue => "CONTINUE",
            Self::Finish => "FINISH",
        }
    }
}

impl std::fmt::Display for RoundDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one completed reason→query→retrieve→evaluate round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundOutcome {
    /// Round number (1-based).
    pub round: usize,
    /// The agent's analysis of what is known so far.
    pub analysis: String,
    /// Why the chosen queries should close the remaining gaps.
    pub reasoning: String,
    /// Queries issued this round, in the order the model produced them.
    pub queries: Vec<String>,
    /// Findings gathered this round, in discovery order.
    pub findings: Vec<Finding>,
    /// Running summary produced by the evaluation step.
    pub summary: String,
    /// The evaluation decision.
    pub decision: RoundDecision,
}

/// Terminal status of a sub-agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    /// The agent finished its loop normally with findings.
    Ok,
    /// The agent absorbed a failure or hit a bound but kept partial data.
    Degraded,
    /// The agent produced no findings at all.
    Failed,
}

impl AgentStatus {
    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Degraded => "degraded",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result from one sub-agent, produced exactly once per objective.
#[derive(Debug, Clone, Serialize)]
pub struct SubAgentResult {
    /// The objective this agent owned.
    pub objective: Objective,
    /// Outcomes of all completed rounds, in round order.
    pub rounds: Vec<RoundOutcome>,
    /// All findings across rounds, in discovery order.
    pub findings: Vec<Finding>,
    /// Deduplicated source URLs, in first-seen order.
    pub sources: Vec<String>,
    /// Number of rounds completed. Never exceeds the configured maximum.
    pub rounds_completed: usize,
    /// Terminal status.
    pub status: AgentStatus,
    /// Error detail when status is not [`AgentStatus::Ok`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Wall-clock time spent by this agent.
    #[serde(serialize_with = "serialize_duration")]
    pub elapsed: Duration,
}

impl SubAgentResult {
    /// Builds a failed result carrying no findings.
    #[must_use]
    pub fn failed(objective: Objective, error: String, elapsed: Duration) -> Self {
        Self {
            objective,
            rounds: Vec::new(),
            findings: Vec::new(),
            sources: Vec::new(),
            rounds_completed: 0,
            status: AgentStatus::Failed,
            error: Some(error),
            elapsed,
        }
    }

    /// Concatenates the per-round summaries, used by the synthesizer's
    /// deterministic fallback path.
    #[must_use]
    pub fn round_summaries(&self) -> String {
        self.rounds
            .iter()
            .map(|r| format!("Round {}: {}", r.round, r.summary))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn serialize_duration<S>(d: &Duration, s: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    s.serialize_f64(d.as_secs_f64())
}

/// One section of the final report, covering a single objective.
#[derive(Debug, Clone, Serialize)]
pub struct ReportSection {
    /// The objective this section covers.
    pub objective: Objective,
    /// Terminal status of the agent that researched it.
    pub status: AgentStatus,
    /// Section body. For failed objectives this is an explicit gap note.
    pub body: String,
}

/// Sources consulted for one objective, deduplicated across the report.
#[derive(Debug, Clone, Serialize)]
pub struct SourceGroup {
    /// The objective these sources informed.
    pub objective_index: usize,
    /// Topic label (the objective directive).
    pub topic: String,
    /// Source URLs, first-seen order, unique across the whole report.
    pub urls: Vec<String>,
}

/// The terminal artifact of a research run.
///
/// Section order always equals the coordinator's objective order,
/// regardless of sub-agent completion order.
#[derive(Debug, Clone, Serialize)]
pub struct FinalReport {
    /// The goal the run pursued.
    pub goal: ResearchGoal,
    /// Synthesized narrative, or the deterministic fallback text.
    pub narrative: String,
    /// Per-objective sections, ordered by objective index.
    pub sections: Vec<ReportSection>,
    /// Deduplicated, topic-grouped source list.
    pub sources: Vec<SourceGroup>,
    /// Indexes of objectives that degraded or failed.
    pub gaps: Vec<usize>,
    /// Whether the narrative came from the fallback path instead of the
    /// synthesis model.
    pub fallback: bool,
}

impl FinalReport {
    /// Groups and deduplicates sources from the given results.
    ///
    /// A URL is attributed to the first objective (in index order) that
    /// found it; later duplicates are dropped.
    #[must_use]
    pub fn group_sources(results: &[SubAgentResult]) -> Vec<SourceGroup> {
        let mut seen: BTreeSet<&str> = BTreeSet::new();
        let mut groups = Vec::with_capacity(results.len());
        for result in results {
            let urls: Vec<String> = result
                .sources
                .iter()
                .filter(|url| seen.insert(url.as_str()))
                .cloned()
                .collect();
            if !urls.is_empty() {
                groups.push(SourceGroup {
                    objective_index: result.objective.index,
                    topic: result.objective.directive.clone(),
                    urls,
                });
            }
        }
        groups
    }
}

// ─── Wire schemas for structured model output ────────────────────────
//
// The model is asked for JSON matching these shapes; decode failures
// become `ResearchError::ResponseParse` and go through the corrective
// re-prompt retry class.

/// Goal statement returned by the goal-definition call.
#[derive(Debug, Clone, Deserialize)]
pub struct GoalSpec {
    /// Free-text goal statement.
    pub statement: String,
    /// Scope note. Optional in the wire format.
    #[serde(default)]
    pub scope: String,
    /// Single introductory search query for gathering background
    /// context before objectives are set.
    #[serde(default)]
    pub background_query: String,
}

/// Objective list returned by the objective-identification call.
#[derive(Debug, Clone, Deserialize)]
pub struct ObjectiveList {
    /// Research directives, most important first.
    pub objectives: Vec<String>,
}

/// Round plan returned by the reasoning call.
#[derive(Debug, Clone, Deserialize)]
pub struct RoundPlan {
    /// What is known so far and what is missing.
    #[serde(default)]
    pub analysis: String,
    /// Why these queries will help.
    #[serde(default)]
    pub reasoning: String,
    /// Search queries to issue this round.
    pub queries: Vec<String>,
}

/// Evaluation returned by the round-conclusion call.
#[derive(Debug, Clone, Deserialize)]
pub struct RoundEvaluation {
    /// Summary of what this round discovered.
    #[serde(default)]
    pub summary: String,
    /// `"CONTINUE"` or `"FINISH"`. Unrecognized values decode to
    /// [`RoundDecision::Continue`] via [`RoundDecision::parse`].
    #[serde(default)]
    pub decision: String,
}

impl RoundEvaluation {
    /// Returns the typed decision, defaulting to `Continue` for
    /// anything unrecognizable.
    #[must_use]
    pub fn parsed_decision(&self) -> RoundDecision {
        RoundDecision::parse(&self.decision)
    }
}
