//! Parallel multi-agent research pipeline.
//!
//! Decomposes a user question into independent research objectives,
//! runs one autonomous sub-agent per objective concurrently, and
//! synthesizes all outputs into a single report. Uses a pluggable
//! provider abstraction backed by OpenAI-compatible APIs and an
//! Exa-compatible search API.
//!
//! # Architecture
//!
//! ```text
//! User query → Orchestrator
//!   ├── Coordinator (defines goal, gathers background, sets 2–5 objectives)
//!   ├── Scheduler → N concurrent SubAgentRunners
//!   │   └── Each loops: reason → query → retrieve → evaluate
//!   │       (up to max_rounds, queries fan out concurrently)
//!   ├── Fault-tolerant join keyed by objective index
//!   └── Synthesizer → final report (ordered sections + source list)
//! ```
//!
//! Every external call is wrapped by [`RetryExecutor`]; all components
//! record into one per-run [`MetricsCollector`]. A single sub-agent's
//! failure degrades the report instead of aborting the run.

pub mod client;
pub mod config;
pub mod coordinator;
pub mod finding;
pub mod message;
pub mod metrics;
pub mod notify;
pub mod orchestrator;
pub mod prompt;
pub mod provider;
pub mod providers;
pub mod retry;
pub mod scheduler;
pub mod search;
pub mod subagent;
pub mod synthesizer;
pub mod traits;

#[cfg(test)]
pub(crate) mod testing;

// Re-export key types
pub use config::ResearchConfig;
pub use coordinator::Coordinator;
pub use finding::{
    AgentStatus, FinalReport, Finding, Objective, ReportSection, ResearchGoal, RoundDecision,
    RoundOutcome, SourceGroup, SubAgentResult,
};
pub use message::{ChatMessage, ChatRequest, ChatResponse, Role, TokenUsage};
pub use metrics::{CallKind, MetricsCollector, MetricsSnapshot};
pub use notify::{NullProgress, ProgressSink, TracingProgress};
pub use orchestrator::{Orchestrator, ResearchRun};
pub use prompt::PromptSet;
pub use provider::LlmProvider;
pub use retry::{RetryExecutor, RetryPolicy};
pub use scheduler::Scheduler;
pub use search::{ExaSearch, SearchHit, SearchOutcome, SearchProvider};
pub use subagent::SubAgentRunner;
pub use synthesizer::Synthesizer;
pub use traits::{Agent, AgentResponse};
