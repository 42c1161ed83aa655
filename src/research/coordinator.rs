//! Coordinator: goal definition and objective identification.
//!
//! The coordinator makes the run's first two language-model calls. It
//! is deliberately infallible from the pipeline's point of view: goal
//! definition degrades to the raw user query, and objective
//! identification falls back to a single synthetic objective equal to
//! the raw query once every retry path is exhausted. That fallback is
//! the only case where the objective count may drop below two.

use async_trait::async_trait;
use tracing::{debug, warn};

use super::config::{MIN_OBJECTIVES, ResearchConfig};
use super::finding::{GoalSpec, Objective, ObjectiveList, ResearchGoal};
use super::metrics::MetricsCollector;
use super::prompt::{PromptSet, build_goal_prompt, build_objectives_prompt};
use super::provider::LlmProvider;
use super::retry::RetryExecutor;
use super::traits::{Agent, decode_structured};
use crate::error::ResearchError;

/// Agent wrapper for the coordinator's structured-output calls.
struct CoordinatorAgent {
    name: &'static str,
    model: String,
    max_tokens: u32,
    system_prompt: String,
}

#[async_trait]
impl Agent for CoordinatorAgent {
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

/// Defines the research goal and decomposes it into objectives.
pub struct Coordinator {
    config: ResearchConfig,
    prompts: PromptSet,
}

impl Coordinator {
    /// Creates a coordinator with the given configuration and prompts.
    #[must_use]
    pub fn new(config: &ResearchConfig, prompts: &PromptSet) -> Self {
        Self {
            config: config.clone(),
            prompts: prompts.clone(),
        }
    }

    fn agent(&self, name: &'static str, system_prompt: &str) -> CoordinatorAgent {
        CoordinatorAgent {
            name,
            model: self.config.agent_model.clone(),
            max_tokens: self.config.agent_max_tokens,
            system_prompt: system_prompt.to_string(),
        }
    }

    /// Defines the research goal from the user query.
    ///
    /// Returns the goal and an introductory background query. On any
    /// failure past the retry budgets the goal degrades to the raw
    /// query, so this never fails the run.
    pub async fn define_goal(
        &self,
        provider: &dyn LlmProvider,
        retry: &RetryExecutor,
        metrics: &MetricsCollector,
        query: &str,
    ) -> (ResearchGoal, String) {
        let agent = self.agent("define_goal", &self.prompts.goal);

        let result = retry
            .execute_with_reprompt("define_goal", |correction| {
                let user_msg = build_goal_prompt(query, correction.as_deref());
                let agent = &agent;
                async move {
                    let response = agent.execute(provider, &user_msg).await?;
                    decode_structured::<GoalSpec>(&response.content)
                }
            })
            .await;

        match result {
            Ok(spec) => {
                debug!(statement = %spec.statement, "goal defined");
                let background_query = if spec.background_query.trim().is_empty() {
                    query.to_string()
                } else {
                    spec.background_query
                };
                (
                    ResearchGoal {
                        query: query.to_string(),
                        statement: spec.statement,
                        scope: spec.scope,
                    },
                    background_query,
                )
            }
            Err(e) => {
                warn!(error = %e, "goal definition failed, using raw query");
                metrics.warning(&format!("goal definition degraded to raw query: {e}"));
                (
                    ResearchGoal {
                        query: query.to_string(),
                        statement: query.to_string(),
                        scope: String::new(),
                    },
                    query.to_string(),
                )
            }
        }
    }

    /// Decomposes the goal into an ordered objective list.
    ///
    /// The list length is clamped to the configured maximum; fewer than
    /// two entries is treated as malformed output and re-prompted. If
    /// every retry is exhausted, falls back to one synthetic objective
    /// equal to the raw user query. That fallback is the only path
    /// where the objective count may drop below two.
    pub async fn identify_objectives(
        &self,
        provider: &dyn LlmProvider,
        retry: &RetryExecutor,
        metrics: &MetricsCollector,
        goal: &ResearchGoal,
        background: &str,
    ) -> Vec<Objective> {
        let agent = self.agent("identify_objectives", &self.prompts.objectives);
        let count = self.config.max_objectives;

        let result = retry
            .execute_with_reprompt("identify_objectives", |correction| {
                let user_msg =
                    build_objectives_prompt(goal, background, count, correction.as_deref());
                let agent = &agent;
                async move {
                    let response = agent.execute(provider, &user_msg).await?;
                    let list = decode_structured::<ObjectiveList>(&response.content)?;
                    Self::validate_objectives(list, count, &response.content)
                }
            })
            .await;

        match result {
            Ok(directives) => directives
                .into_iter()
                .enumerate()
                .map(|(index, directive)| Objective { index, directive })
                .collect(),
            Err(e) => {
                warn!(error = %e, "objective identification failed, using single fallback objective");
                metrics.warning(&format!(
                    "objective identification degraded to single objective: {e}"
                ));
                vec![Objective {
                    index: 0,
                    directive: goal.query.clone(),
                }]
            }
        }
    }

    /// Validates and clamps a decoded objective list.
    fn validate_objectives(
        list: ObjectiveList,
        max: usize,
        raw: &str,
    ) -> Result<Vec<String>, ResearchError> {
        let mut directives: Vec<String> = list
            .objectives
            .into_iter()
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();
        directives.truncate(max);

        if directives.len() < MIN_OBJECTIVES {
            return Err(ResearchError::ResponseParse {
                message: format!(
                    "expected at least {MIN_OBJECTIVES} objectives, got {}",
                    directives.len()
                ),
                content: raw.to_string(),
            });
        }
        Ok(directives)
    }
}
