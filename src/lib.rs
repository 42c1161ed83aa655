//! # deep-research-rs
//!
//! Parallel multi-agent deep research orchestrator. Given a question,
//! the pipeline decomposes it into 2–5 independent research objectives,
//! runs one autonomous agent per objective concurrently (each agent
//! performing bounded rounds of reason → query → retrieve → evaluate),
//! and merges all agent outputs into one synthesized report.
//!
//! The hard guarantees:
//!
//! - **Bounded concurrency**: at most `objectives × queries_per_round`
//!   retrieval calls are in flight at any instant.
//! - **Bounded retry**: every external call goes through a single
//!   [`research::RetryExecutor`] with exponential backoff; malformed
//!   model output has its own smaller corrective re-prompt budget.
//! - **Partial-failure tolerance**: one agent's failure never aborts
//!   the run; the report carries explicit gap notes instead.
//! - **Deterministic ordering**: report sections follow objective
//!   order, never completion order.
//! - **Always an answer**: even with the synthesis model unreachable,
//!   a deterministic fallback report is produced. Only a run where
//!   every sub-agent failed returns an error.
//!
//! # Example
//!
//! ```no_run
//! use deep_research_rs::research::{Orchestrator, ResearchConfig};
//!
//! # async fn example() -> Result<(), deep_research_rs::error::ResearchError> {
//! let config = ResearchConfig::from_env()?;
//! let orchestrator = Orchestrator::from_config(config)?;
//! let run = orchestrator.run("impact of AI on healthcare").await?;
//! println!("{}", run.report.narrative);
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod error;
pub mod research;

pub use error::ResearchError;
pub use research::{Orchestrator, ResearchConfig, ResearchRun};
