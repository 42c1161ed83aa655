//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

/// deep-research-rs: parallel multi-agent deep research.
///
/// Decomposes a question into independent research objectives, runs one
/// autonomous agent per objective concurrently, and synthesizes all
/// findings into a single report.
#[derive(Parser, Debug)]
#[command(name = "deep-research-rs")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a research query end to end.
    #[command(after_help = r#"Examples:
  deep-research-rs run "impact of AI on healthcare"
  deep-research-rs run "rust async runtimes compared" --objectives 4 --rounds 3
  deep-research-rs run "state of fusion energy" --deadline 300
  deep-research-rs --format json run "who supplies TSMC" | jq -r '.report.narrative'
"#)]
    Run {
        /// The research question.
        query: String,

        /// Number of research objectives to decompose into (2-5).
        #[arg(short, long, env = "RESEARCH_MAX_OBJECTIVES")]
        objectives: Option<usize>,

        /// Maximum rounds per sub-agent.
        #[arg(short, long, env = "RESEARCH_MAX_ROUNDS")]
        rounds: Option<usize>,

        /// Queries each agent issues per round.
        #[arg(short, long, env = "RESEARCH_QUERIES_PER_ROUND")]
        queries: Option<usize>,

        /// Model for coordinator and sub-agent calls.
        #[arg(long, env = "RESEARCH_AGENT_MODEL")]
        agent_model: Option<String>,

        /// Model for the final synthesis call.
        #[arg(long, env = "RESEARCH_SYNTHESIZER_MODEL")]
        synthesizer_model: Option<String>,

        /// Global deadline in seconds. Once expired, agents finish
        /// their in-flight round and stop.
        #[arg(long)]
        deadline: Option<u64>,

        /// Directory containing prompt template overrides.
        #[arg(long, env = "RESEARCH_PROMPT_DIR")]
        prompt_dir: Option<PathBuf>,

        /// Print the session metrics summary after the report.
        #[arg(long)]
        metrics: bool,
    },

    /// Write the default prompt templates to a directory for editing.
    InitPrompts {
        /// Target directory (defaults to ~/.config/deep-research-rs/prompts).
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },
}

impl Commands {
    /// Converts a `--deadline` seconds value to a [`Duration`].
    #[must_use]
    pub const fn deadline_duration(seconds: Option<u64>) -> Option<Duration> {
        match seconds {
            Some(s) => Some(Duration::from_secs(s)),
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_structure_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_command() {
        let cli = Cli::try_parse_from([
            "deep-research-rs",
            "run",
            "what is rust",
            "--objectives",
            "4",
            "--deadline",
            "300",
        ])
        .unwrap_or_else(|_| unreachable!());

        match cli.command {
            Commands::Run {
                query,
                objectives,
                deadline,
                ..
            } => {
                assert_eq!(query, "what is rust");
                assert_eq!(objectives, Some(4));
                assert_eq!(deadline, Some(300));
            }
            Commands::InitPrompts { .. } => unreachable!("expected run command"),
        }
    }

    #[test]
    fn test_format_defaults_to_text() {
        let cli = Cli::try_parse_from(["deep-research-rs", "run", "q"])
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(cli.format, "text");
        assert!(!cli.verbose);
    }

    #[test]
    fn test_deadline_duration() {
        assert_eq!(
            Commands::deadline_duration(Some(60)),
            Some(Duration::from_secs(60))
        );
        assert_eq!(Commands::deadline_duration(None), None);
    }
}
