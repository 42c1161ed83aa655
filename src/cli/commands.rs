//! CLI command implementations.
//!
//! Contains the business logic for each CLI command.

// CLI results are written to stdout.
#![allow(clippy::print_stdout)]

use std::sync::Arc;

use crate::cli::output::{OutputFormat, format_run};
use crate::cli::parser::{Cli, Commands};
use crate::error::ResearchError;
use crate::research::{Orchestrator, PromptSet, ResearchConfig, TracingProgress};

/// Executes the parsed CLI command.
///
/// # Errors
///
/// Returns [`ResearchError`] on configuration or run failures; the
/// binary maps these to a nonzero exit code.
pub async fn execute(cli: Cli) -> Result<(), ResearchError> {
    let format = OutputFormat::parse(&cli.format);

    match cli.command {
        Commands::Run {
            query,
            objectives,
            rounds,
            queries,
            agent_model,
            synthesizer_model,
            deadline,
            prompt_dir,
            metrics,
        } => {
            let mut builder = ResearchConfig::builder().from_env();
            if let Some(n) = objectives {
                builder = builder.max_objectives(n);
            }
            if let Some(n) = rounds {
                builder = builder.max_rounds(n);
            }
            if let Some(n) = queries {
                builder = builder.queries_per_round(n);
            }
            if let Some(model) = agent_model {
                builder = builder.agent_model(model);
            }
            if let Some(model) = synthesizer_model {
                builder = builder.synthesizer_model(model);
            }
            if let Some(d) = Commands::deadline_duration(deadline) {
                builder = builder.deadline(d);
            }
            if let Some(dir) = prompt_dir {
                builder = builder.prompt_dir(dir);
            }
            let config = builder.build()?;

            let orchestrator =
                Orchestrator::from_config(config)?.with_progress(Arc::new(TracingProgress));
            match orchestrator.run(&query).await {
                Ok(run) => {
                    println!("{}", format_run(&run, format, metrics));
                    Ok(())
                }
                Err(ResearchError::TotalFailure { errors }) => {
                    // The run must never end in silence: emit an
                    // explicit failure report before the error exit.
                    println!("Research failed for every objective:");
                    for error in &errors {
                        println!("  - {error}");
                    }
                    Err(ResearchError::TotalFailure { errors })
                }
                Err(e) => Err(e),
            }
        }

        Commands::InitPrompts { dir } => {
            let target = dir
                .or_else(PromptSet::default_dir)
                .ok_or_else(|| ResearchError::Orchestration {
                    message: "could not determine a prompt directory; pass --dir".to_string(),
                })?;
            let written =
                PromptSet::write_defaults(&target).map_err(|e| ResearchError::Orchestration {
                    message: format!("failed to write prompts to {}: {e}", target.display()),
                })?;

            if written.is_empty() {
                println!("All prompt templates already exist in {}.", target.display());
            } else {
                println!("Wrote {} prompt templates to {}:", written.len(), target.display());
                for path in written {
                    println!("  {}", path.display());
                }
            }
            Ok(())
        }
    }
}
