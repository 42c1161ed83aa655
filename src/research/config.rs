//! Run configuration with builder pattern and environment variable support.
//!
//! Configuration is resolved in order: explicit values → environment
//! variables → defaults, and validated once at [`ResearchConfigBuilder::build`].
//! The core never re-validates: a config that reaches the pipeline is
//! known to be in range.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ResearchError;
use crate::research::retry::RetryPolicy;

/// Lowest permitted objective count.
pub const MIN_OBJECTIVES: usize = 2;
/// Highest permitted objective count.
pub const MAX_OBJECTIVES: usize = 5;

/// Default number of research objectives to decompose into.
const DEFAULT_MAX_OBJECTIVES: usize = 3;
/// Default maximum rounds per sub-agent.
const DEFAULT_MAX_ROUNDS: usize = 2;
/// Default queries generated per round.
const DEFAULT_QUERIES_PER_ROUND: usize = 3;
/// Default search results requested per query.
const DEFAULT_URLS_PER_QUERY: usize = 5;
/// Default top results whose content is actually fetched.
const DEFAULT_URLS_TO_CRAWL: usize = 3;
/// Default maximum tokens for coordinator and sub-agent responses.
const DEFAULT_AGENT_MAX_TOKENS: u32 = 4096;
/// Default maximum tokens for the synthesizer response.
const DEFAULT_SYNTHESIZER_MAX_TOKENS: u32 = 8192;
/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 120;
/// Default corrective re-prompt attempts for malformed model output.
const DEFAULT_PARSE_RETRIES: u32 = 2;

/// Configuration for a research run.
#[derive(Debug, Clone)]
pub struct ResearchConfig {
    /// LLM provider name (e.g., "openai").
    pub provider: String,
    /// API key for the LLM provider.
    pub api_key: String,
    /// Optional base URL override (for proxies or compatible APIs).
    pub base_url: Option<String>,
    /// API key for the search provider.
    pub search_api_key: String,
    /// Optional search endpoint override.
    pub search_base_url: Option<String>,
    /// Model for coordinator and sub-agent calls.
    pub agent_model: String,
    /// Model for the final synthesis call.
    pub synthesizer_model: String,
    /// Number of objectives to decompose the question into (2–5).
    pub max_objectives: usize,
    /// Maximum rounds per sub-agent.
    pub max_rounds: usize,
    /// Queries each sub-agent generates per round; also the per-agent
    /// retrieval fan-out width.
    pub queries_per_round: usize,
    /// Search results requested per query.
    pub urls_per_query: usize,
    /// Top results whose content is fetched per query.
    pub urls_to_crawl: usize,
    /// Maximum tokens for coordinator and sub-agent responses.
    pub agent_max_tokens: u32,
    /// Maximum tokens for the synthesizer response.
    pub synthesizer_max_tokens: u32,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Backoff policy for transient failures.
    pub retry: RetryPolicy,
    /// Corrective re-prompt attempts for malformed model output.
    pub parse_retries: u32,
    /// Optional global deadline. Once expired no sub-agent starts a
    /// new round; in-flight rounds complete.
    pub deadline: Option<Duration>,
    /// Directory containing prompt template files.
    ///
    /// When set, system prompts are loaded from markdown files in this
    /// directory, falling back to compiled-in defaults for any missing
    /// files.
    pub prompt_dir: Option<PathBuf>,
}

impl ResearchConfig {
    /// Creates a new builder for `ResearchConfig`.
    #[must_use]
    pub fn builder() -> ResearchConfigBuilder {
        ResearchConfigBuilder::default()
    }

    /// Creates configuration from environment variables with defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ResearchError::ApiKeyMissing`] or
    /// [`ResearchError::SearchKeyMissing`] if a key is not found.
    pub fn from_env() -> Result<Self, ResearchError> {
        Self::builder().from_env().build()
    }
}

/// Builder for [`ResearchConfig`].
#[derive(Debug, Clone, Default)]
pub struct ResearchConfigBuilder {
    provider: Option<String>,
    api_key: Option<String>,
    base_url: Option<String>,
    search_api_key: Option<String>,
    search_base_url: Option<String>,
    agent_model: Option<String>,
    synthesizer_model: Option<String>,
    max_objectives: Option<usize>,
    max_rounds: Option<usize>,
    queries_per_round: Option<usize>,
    urls_per_query: Option<usize>,
    urls_to_crawl: Option<usize>,
    agent_max_tokens: Option<u32>,
    synthesizer_max_tokens: Option<u32>,
    timeout: Option<Duration>,
    retry: Option<RetryPolicy>,
    parse_retries: Option<u32>,
    deadline: Option<Duration>,
    prompt_dir: Option<PathBuf>,
}

impl ResearchConfigBuilder {
    /// Populates unset fields from environment variables.
    #[must_use]
    pub fn from_env(mut self) -> Self {
        if self.provider.is_none() {
            self.provider = std::env::var("RESEARCH_PROVIDER").ok();
        }
        if self.api_key.is_none() {
            self.api_key = std::env::var("OPENAI_API_KEY")
                .or_else(|_| std::env::var("RESEARCH_API_KEY"))
                .ok();
        }
        if self.base_url.is_none() {
            self.base_url = std::env::var("OPENAI_BASE_URL")
                .or_else(|_| std::env::var("RESEARCH_BASE_URL"))
                .ok();
        }
        if self.search_api_key.is_none() {
            self.search_api_key = std::env::var("EXA_API_KEY").ok();
        }
        if self.search_base_url.is_none() {
            self.search_base_url = std::env::var("EXA_BASE_URL").ok();
        }
        if self.agent_model.is_none() {
            self.agent_model = std::env::var("RESEARCH_AGENT_MODEL").ok();
        }
        if self.synthesizer_model.is_none() {
            self.synthesizer_model = std::env::var("RESEARCH_SYNTHESIZER_MODEL").ok();
        }
        if self.max_objectives.is_none() {
            self.max_objectives = std::env::var("RESEARCH_MAX_OBJECTIVES")
                .ok()
                .and_then(|v| v.parse().ok());
        }
        if self.max_rounds.is_none() {
            self.max_rounds = std::env::var("RESEARCH_MAX_ROUNDS")
                .ok()
                .and_then(|v| v.parse().ok());
        }
        if self.queries_per_round.is_none() {
            self.queries_per_round = std::env::var("RESEARCH_QUERIES_PER_ROUND")
                .ok()
                .and_then(|v| v.parse().ok());
        }
        if self.prompt_dir.is_none() {
            self.prompt_dir = std::env::var("RESEARCH_PROMPT_DIR").ok().map(PathBuf::from);
        }
        self
    }

    /// Sets the LLM provider name.
    #[must_use]
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Sets the LLM API key.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the base URL override.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the search provider API key.
    #[must_use]
    pub fn search_api_key(mut self, key: impl Into<String>) -> Self {
        self.search_api_key = Some(key.into());
        self
    }

    /// Sets the search endpoint override.
    #[must_use]
    pub fn search_base_url(mut self, url: impl Into<String>) -> Self {
        self.search_base_url = Some(url.into());
        self
    }

    /// Sets the model for coordinator and sub-agent calls.
    #[must_use]
    pub fn agent_model(mut self, model: impl Into<String>) -> Self {
        self.agent_model = Some(model.into());
        self
    }

    /// Sets the model for the final synthesis call.
    #[must_use]
    pub fn synthesizer_model(mut self, model: impl Into<String>) -> Self {
        self.synthesizer_model = Some(model.into());
        self
    }

    /// Sets the number of objectives (validated to 2–5 at build).
    #[must_use]
    pub const fn max_objectives(mut self, n: usize) -> Self {
        self.max_objectives = Some(n);
        self
    }

    /// Sets the maximum rounds per sub-agent.
    #[must_use]
    pub const fn max_rounds(mut self, n: usize) -> Self {
        self.max_rounds = Some(n);
        self
    }

    /// Sets the queries generated per round.
    #[must_use]
    pub const fn queries_per_round(mut self, n: usize) -> Self {
        self.queries_per_round = Some(n);
        self
    }

    /// Sets the search results requested per query.
    #[must_use]
    pub const fn urls_per_query(mut self, n: usize) -> Self {
        self.urls_per_query = Some(n);
        self
    }

    /// Sets the top results whose content is fetched per query.
    #[must_use]
    pub const fn urls_to_crawl(mut self, n: usize) -> Self {
        self.urls_to_crawl = Some(n);
        self
    }

    /// Sets the maximum tokens for coordinator and sub-agent responses.
    #[must_use]
    pub const fn agent_max_tokens(mut self, n: u32) -> Self {
        self.agent_max_tokens = Some(n);
        self
    }

    /// Sets the maximum tokens for the synthesizer response.
    #[must_use]
    pub const fn synthesizer_max_tokens(mut self, n: u32) -> Self {
        self.synthesizer_max_tokens = Some(n);
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub const fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    /// Sets the backoff policy for transient failures.
    #[must_use]
    pub const fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    /// Sets the corrective re-prompt attempts for malformed output.
    #[must_use]
    pub const fn parse_retries(mut self, n: u32) -> Self {
        self.parse_retries = Some(n);
        self
    }

    /// Sets the global run deadline.
    #[must_use]
    pub const fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Sets the prompt template directory.
    #[must_use]
    pub fn prompt_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.prompt_dir = Some(dir.into());
        self
    }

    /// Builds the [`ResearchConfig`], validating all ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ResearchError::ApiKeyMissing`]/[`ResearchError::SearchKeyMissing`]
    /// for absent keys and [`ResearchError::InvalidConfig`] for
    /// out-of-range values.
    pub fn build(self) -> Result<ResearchConfig, ResearchError> {
        let api_key = self.api_key.ok_or(ResearchError::ApiKeyMissing)?;
        let search_api_key = self.search_api_key.ok_or(ResearchError::SearchKeyMissing)?;

        let max_objectives = self.max_objectives.unwrap_or(DEFAULT_MAX_OBJECTIVES);
        if !(MIN_OBJECTIVES..=MAX_OBJECTIVES).contains(&max_objectives) {
            return Err(ResearchError::InvalidConfig {
                message: format!(
                    "max_objectives must be in [{MIN_OBJECTIVES}, {MAX_OBJECTIVES}], got {max_objectives}"
                ),
            });
        }

        let max_rounds = self.max_rounds.unwrap_or(DEFAULT_MAX_ROUNDS);
        if max_rounds == 0 {
            return Err(ResearchError::InvalidConfig {
                message: "max_rounds must be at least 1".to_string(),
            });
        }

        let queries_per_round = self.queries_per_round.unwrap_or(DEFAULT_QUERIES_PER_ROUND);
        if queries_per_round == 0 {
            return Err(ResearchError::InvalidConfig {
                message: "queries_per_round must be at least 1".to_string(),
            });
        }

        let urls_per_query = self.urls_per_query.unwrap_or(DEFAULT_URLS_PER_QUERY);
        let urls_to_crawl = self.urls_to_crawl.unwrap_or(DEFAULT_URLS_TO_CRAWL);
        if urls_to_crawl == 0 || urls_to_crawl > urls_per_query {
            return Err(ResearchError::InvalidConfig {
                message: format!(
                    "urls_to_crawl must be in [1, urls_per_query={urls_per_query}], got {urls_to_crawl}"
                ),
            });
        }

        let retry = self.retry.unwrap_or_default();
        retry.validate()?;

        Ok(ResearchConfig {
            provider: self.provider.unwrap_or_else(|| "openai".to_string()),
            api_key,
            base_url: self.base_url,
            search_api_key,
            search_base_url: self.search_base_url,
            agent_model: self
                .agent_model
                .unwrap_or_else(|| "gpt-5-mini-2025-08-07".to_string()),
            synthesizer_model: self
                .synthesizer_model
                .unwrap_or_else(|| "gpt-5.2-2025-12-11".to_string()),
            max_objectives,
            max_rounds,
            queries_per_round,
            urls_per_query,
            urls_to_crawl,
            agent_max_tokens: self.agent_max_tokens.unwrap_or(DEFAULT_AGENT_MAX_TOKENS),
            synthesizer_max_tokens: self
                .synthesizer_max_tokens
                .unwrap_or(DEFAULT_SYNTHESIZER_MAX_TOKENS),
            timeout: self
                .timeout
                .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            retry,
            parse_retries: self.parse_retries.unwrap_or(DEFAULT_PARSE_RETRIES),
            deadline: self.deadline,
            prompt_dir: self.prompt_dir,
        })
    }
}
