//! System prompts and template builders for agents.
//!
//! Prompts are the core instructions that define each agent's behavior.
//! Template builders format user messages with the goal, objective, and
//! accumulated findings. All structured-output prompts demand plain
//! JSON matching the wire schemas in [`crate::research::finding`].

use std::fmt::Write;
use std::path::Path;

use super::finding::{Finding, ResearchGoal};

/// System prompt for the goal-definition call.
pub const GOAL_SYSTEM_PROMPT: &str = r#"You are a research strategist. Given a user's question, define the research goal and one introductory background query.

## Instructions

1. Restate what the user actually wants to know as a clear goal statement.
2. Write a scope note bounding what the research should and should not cover.
3. Write ONE introductory search query that gathers context and background about the topic. It should be informational, not an attempt to answer the question directly.

## Output Format (JSON)

```json
{
  "statement": "clear statement of the research goal",
  "scope": "what is in and out of scope",
  "background_query": "one informational background query"
}
```

Return ONLY the JSON object, no surrounding text."#;

/// System prompt for the objective-identification call.
pub const OBJECTIVES_SYSTEM_PROMPT: &str = r#"You are a research strategist. Based on the research goal and the background context gathered, decompose the research into independent objectives.

## Instructions

1. Identify the distinct directions the research must cover to satisfy the goal.
2. Each objective must be independently researchable: a dedicated agent will pursue it without seeing the other objectives' progress.
3. Order objectives from most to least central to the goal.
4. Produce the number of objectives requested in the user message.

## Output Format (JSON)

```json
{
  "objectives": ["first research directive", "second research directive"]
}
```

Return ONLY the JSON object, no surrounding text."#;

/// System prompt for a sub-agent's round reasoning call.
pub const REASONING_SYSTEM_PROMPT: &str = r#"You are a research agent pursuing one objective. Reason about what you have learned so far and plan this round's searches.

## Instructions

1. Analyze the findings gathered so far against your objective. State what is known and what is still missing.
2. Explain why your chosen searches will close the remaining gaps.
3. Generate diverse, specific search queries. Produce exactly the number of queries requested in the user message. Vary the angle of attack between queries rather than rephrasing one.

## Output Format (JSON)

```json
{
  "analysis": "what is known and what is missing",
  "reasoning": "why these searches will help",
  "queries": ["query one", "query two"]
}
```

Return ONLY the JSON object, no surrounding text."#;

/// System prompt for a sub-agent's round evaluation call.
pub const EVALUATION_SYSTEM_PROMPT: &str = r#"You are a research analyst. Summarize what this round's searches found and decide whether to continue researching.

## Instructions

1. Summarize the key information discovered this round, concisely but completely. Carry forward what earlier rounds established.
2. Assess progress against the objective.
3. Decide: CONTINUE if key aspects of the objective are still unanswered and more searching would plausibly help; FINISH if the objective is sufficiently covered or further searching would be redundant. If this is the final permitted round, decide FINISH unless critical information is missing.

## Output Format (JSON)

```json
{
  "summary": "running summary of findings for this objective",
  "decision": "CONTINUE" | "FINISH"
}
```

Return ONLY the JSON object, no surrounding text."#;

/// System prompt for the synthesizer call.
pub const SYNTHESIZER_SYSTEM_PROMPT: &str = r"You are an information organizer. You combine research findings from multiple agents, each of which pursued one objective, into a single comprehensive document.

## Instructions

1. Address every objective in the order given, one section per objective.
2. For each objective, organize that agent's findings into clear, factual prose: key facts, context, recent developments, differing perspectives, and actionable insights. Include concrete figures, names, and dates from the findings.
3. Objectives marked DEGRADED or FAILED have incomplete or missing findings. Write an explicit note of the gap for those sections; never silently omit an objective.
4. Cite sources inline by URL where a claim rests on a specific page.
5. Do not introduce information that is not present in the findings.

Write a well-structured markdown document covering every objective in order.";

/// Default prompt directory under user config.
const DEFAULT_PROMPT_DIR: &str = ".config/deep-research-rs/prompts";

/// Filename for the goal prompt template.
const GOAL_FILENAME: &str = "goal.md";
/// Filename for the objectives prompt template.
const OBJECTIVES_FILENAME: &str = "objectives.md";
/// Filename for the reasoning prompt template.
const REASONING_FILENAME: &str = "reasoning.md";
/// Filename for the evaluation prompt template.
const EVALUATION_FILENAME: &str = "evaluation.md";
/// Filename for the synthesizer prompt template.
const SYNTHESIZER_FILENAME: &str = "synthesizer.md";

/// A set of system prompts for all agents.
///
/// Loaded from external template files when available, falling back to
/// compiled-in defaults. Use [`PromptSet::load`] to resolve the prompt
/// directory from config, environment, or the default path.
#[derive(Debug, Clone)]
pub struct PromptSet {
    /// System prompt for the goal-definition call.
    pub goal: String,
    /// System prompt for the objective-identification call.
    pub objectives: String,
    /// System prompt for round reasoning.
    pub reasoning: String,
    /// System prompt for round evaluation.
    pub evaluation: String,
    /// System prompt for the synthesizer.
    pub synthesizer: String,
}

impl PromptSet {
    /// Loads prompts from the given directory, falling back to compiled-in defaults.
    ///
    /// Resolution order for the directory:
    /// 1. Explicit `prompt_dir` argument (from config or `--prompt-dir`)
    /// 2. `RESEARCH_PROMPT_DIR` environment variable
    /// 3. `~/.config/deep-research-rs/prompts/`
    ///
    /// Each file is loaded independently — a missing file uses its default.
    #[must_use]
    pub fn load(prompt_dir: Option<&Path>) -> Self {
        let resolved_dir = prompt_dir
            .map(std::path::PathBuf::from)
            .or_else(|| {
                std::env::var("RESEARCH_PROMPT_DIR")
                    .ok()
                    .map(std::path::PathBuf::from)
            })
            .or_else(|| dirs::home_dir().map(|h| h.join(DEFAULT_PROMPT_DIR)));

        let load_file = |filename: &str, default: &str| -> String {
            resolved_dir
                .as_ref()
                .map(|dir| dir.join(filename))
                .and_then(|path| std::fs::read_to_string(&path).ok())
                .unwrap_or_else(|| default.to_string())
        };

        Self {
            goal: load_file(GOAL_FILENAME, GOAL_SYSTEM_PROMPT),
            objectives: load_file(OBJECTIVES_FILENAME, OBJECTIVES_SYSTEM_PROMPT),
            reasoning: load_file(REASONING_FILENAME, REASONING_SYSTEM_PROMPT),
            evaluation: load_file(EVALUATION_FILENAME, EVALUATION_SYSTEM_PROMPT),
            synthesizer: load_file(SYNTHESIZER_FILENAME, SYNTHESIZER_SYSTEM_PROMPT),
        }
    }

    /// Returns compiled-in defaults without checking the filesystem.
    #[must_use]
    pub fn defaults() -> Self {
        Self {
            goal: GOAL_SYSTEM_PROMPT.to_string(),
            objectives: OBJECTIVES_SYSTEM_PROMPT.to_string(),
            reasoning: REASONING_SYSTEM_PROMPT.to_string(),
            evaluation: EVALUATION_SYSTEM_PROMPT.to_string(),
            synthesizer: SYNTHESIZER_SYSTEM_PROMPT.to_string(),
        }
    }

    /// Writes the compiled-in default prompts to the given directory.
    ///
    /// Creates the directory if it does not exist. Existing files are
    /// **not** overwritten — use this for initial scaffolding only.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if directory creation or file writing fails.
    pub fn write_defaults(dir: &Path) -> std::io::Result<Vec<std::path::PathBuf>> {
        std::fs::create_dir_all(dir)?;

        let templates = [
            (GOAL_FILENAME, GOAL_SYSTEM_PROMPT),
            (OBJECTIVES_FILENAME, OBJECTIVES_SYSTEM_PROMPT),
            (REASONING_FILENAME, REASONING_SYSTEM_PROMPT),
            (EVALUATION_FILENAME, EVALUATION_SYSTEM_PROMPT),
            (SYNTHESIZER_FILENAME, SYNTHESIZER_SYSTEM_PROMPT),
        ];

        let mut written = Vec::new();
        for (filename, content) in &templates {
            let path = dir.join(filename);
            if !path.exists() {
                std::fs::write(&path, content)?;
                written.push(path);
            }
        }

        Ok(written)
    }

    /// Returns the default prompt directory under the user's home.
    ///
    /// Returns `None` if the home directory cannot be determined.
    #[must_use]
    pub fn default_dir() -> Option<std::path::PathBuf> {
        dirs::home_dir().map(|h| h.join(DEFAULT_PROMPT_DIR))
    }
}

/// Appends a corrective instruction when a previous attempt's output
/// failed to parse.
fn with_correction(mut prompt: String, correction: Option<&str>) -> String {
    if let Some(detail) = correction {
        let _ = write!(
            prompt,
            "\n\nYour previous response could not be parsed: {detail}\n\
             Respond again with ONLY valid JSON matching the requested schema."
        );
    }
    prompt
}

/// Builds the user message for the goal-definition call.
#[must_use]
pub fn build_goal_prompt(query: &str, correction: Option<&str>) -> String {
    with_correction(format!("User's request: {query}"), correction)
}

/// Builds the user message for the objective-identification call.
#[must_use]
pub fn build_objectives_prompt(
    goal: &ResearchGoal,
    background: &str,
    count: usize,
    correction: Option<&str>,
) -> String {
    let background = if background.is_empty() {
        "None gathered."
    } else {
        background
    };
    with_correction(
        format!(
            "Research goal: {statement}\n\
             Scope: {scope}\n\n\
             Background context:\n{background}\n\n\
             Decompose this into exactly {count} independent research objectives.",
            statement = goal.statement,
            scope = goal.scope,
        ),
        correction,
    )
}

/// Builds the user message for a sub-agent's reasoning call.
#[must_use]
pub fn build_reasoning_prompt(
    objective: &str,
    findings: &[Finding],
    round: usize,
    max_rounds: usize,
    query_count: usize,
    correction: Option<&str>,
) -> String {
    let mut prompt = format!(
        "Objective: {objective}\n\
         Round: {round} of {max_rounds}\n\n"
    );

    if findings.is_empty() {
        prompt.push_str("Previous findings: none yet - this is the first round.\n");
    } else {
        prompt.push_str("Previous findings:\n");
        for finding in findings {
            let _ = writeln!(prompt, "- [{}] {}", finding.url, finding.text);
        }
    }

    let _ = write!(
        prompt,
        "\nGenerate exactly {query_count} diverse search queries for this round."
    );
    with_correction(prompt, correction)
}

/// Builds the user message for a sub-agent's evaluation call.
#[must_use]
pub fn build_evaluation_prompt(
    objective: &str,
    previous_summary: &str,
    round_findings: &[Finding],
    round: usize,
    max_rounds: usize,
    correction: Option<&str>,
) -> String {
    let mut prompt = format!(
        "Objective: {objective}\n\
         Round: {round} of {max_rounds}\n\n"
    );

    if !previous_summary.is_empty() {
        let _ = writeln!(prompt, "Summary so far:\n{previous_summary}\n");
    }

    if round_findings.is_empty() {
        prompt.push_str("This round retrieved no content.\n");
    } else {
        prompt.push_str("This round's findings:\n");
        for finding in round_findings {
            let _ = writeln!(
                prompt,
                "- [{}] (query: {}) {}",
                finding.url, finding.query, finding.text
            );
        }
    }

    prompt.push_str("\nSummarize and decide CONTINUE or FINISH.");
    with_correction(prompt, correction)
}

/// Builds the user message for the synthesizer call.
///
/// Sections carry explicit status markers so the model notes gaps for
/// degraded or failed objectives instead of silently omitting them.
#[must_use]
pub fn build_synthesizer_prompt(goal: &ResearchGoal, sections: &[(String, String)]) -> String {
    let mut prompt = format!(
        "User's original question: {query}\n\
         Research goal: {statement}\n\n\
         Research findings by objective:\n\n",
        query = goal.query,
        statement = goal.statement,
    );

    for (heading, body) in sections {
        let _ = write!(prompt, "## {heading}\n{body}\n\n");
    }

    prompt.push_str("Combine these into one comprehensive document, covering every objective in order.");
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    fn goal() -> ResearchGoal {
        ResearchGoal {
            query: "impact of AI on healthcare".to_string(),
            statement: "Assess how AI is changing healthcare".to_string(),
            scope: "clinical applications".to_string(),
        }
    }

    fn finding() -> Finding {
        Finding {
            text: "AI triage cut wait times".to_string(),
            title: "Study".to_string(),
            url: "https://example.org/study".to_string(),
            query: "AI hospital triage".to_string(),
        }
    }

    #[test]
    fn test_build_goal_prompt() {
        let prompt = build_goal_prompt("what is quantum computing", None);
        assert!(prompt.contains("what is quantum computing"));
        assert!(!prompt.contains("could not be parsed"));
    }

    #[test]
    fn test_correction_appended() {
        let prompt = build_goal_prompt("q", Some("missing field `statement`"));
        assert!(prompt.contains("could not be parsed: missing field `statement`"));
    }

    #[test]
    fn test_build_objectives_prompt() {
        let prompt = build_objectives_prompt(&goal(), "background text", 3, None);
        assert!(prompt.contains("Assess how AI"));
        assert!(prompt.contains("background text"));
        assert!(prompt.contains("exactly 3"));
    }

    #[test]
    fn test_build_objectives_prompt_empty_background() {
        let prompt = build_objectives_prompt(&goal(), "", 2, None);
        assert!(prompt.contains("None gathered."));
    }

    #[test]
    fn test_build_reasoning_prompt_first_round() {
        let prompt = build_reasoning_prompt("objective text", &[], 1, 3, 2, None);
        assert!(prompt.contains("first round"));
        assert!(prompt.contains("exactly 2 diverse search queries"));
        assert!(prompt.contains("Round: 1 of 3"));
    }

    #[test]
    fn test_build_reasoning_prompt_with_findings() {
        let prompt = build_reasoning_prompt("obj", &[finding()], 2, 3, 3, None);
        assert!(prompt.contains("AI triage cut wait times"));
        assert!(prompt.contains("https://example.org/study"));
    }

    #[test]
    fn test_build_evaluation_prompt() {
        let prompt = build_evaluation_prompt("obj", "summary so far", &[finding()], 1, 2, None);
        assert!(prompt.contains("summary so far"));
        assert!(prompt.contains("query: AI hospital triage"));
        assert!(prompt.contains("CONTINUE or FINISH"));
    }

    #[test]
    fn test_build_synthesizer_prompt_keeps_section_order() {
        let sections = vec![
            ("Objective 1 (ok)".to_string(), "findings A".to_string()),
            ("Objective 2 (failed)".to_string(), "no findings".to_string()),
        ];
        let prompt = build_synthesizer_prompt(&goal(), &sections);
        let first = prompt.find("Objective 1").unwrap_or_default();
        let second = prompt.find("Objective 2").unwrap_or_default();
        assert!(first < second);
        assert!(prompt.contains("impact of AI on healthcare"));
    }

    #[test]
    fn test_prompts_not_empty() {
        assert!(!GOAL_SYSTEM_PROMPT.is_empty());
        assert!(!OBJECTIVES_SYSTEM_PROMPT.is_empty());
        assert!(!REASONING_SYSTEM_PROMPT.is_empty());
        assert!(!EVALUATION_SYSTEM_PROMPT.is_empty());
        assert!(!SYNTHESIZER_SYSTEM_PROMPT.is_empty());
    }

    #[test]
    fn test_prompt_set_load_from_dir() {
        let dir = tempfile::tempdir().unwrap_or_else(|_| unreachable!());
        std::fs::write(dir.path().join("goal.md"), "custom goal prompt")
            .unwrap_or_else(|_| unreachable!());

        let prompts = PromptSet::load(Some(dir.path()));
        assert_eq!(prompts.goal, "custom goal prompt");
        // Missing files fall back to defaults
        assert_eq!(prompts.synthesizer, SYNTHESIZER_SYSTEM_PROMPT);
    }

    #[test]
    fn test_write_defaults_does_not_overwrite() {
        let dir = tempfile::tempdir().unwrap_or_else(|_| unreachable!());
        std::fs::write(dir.path().join("goal.md"), "existing")
            .unwrap_or_else(|_| unreachable!());

        let written = PromptSet::write_defaults(dir.path()).unwrap_or_else(|_| unreachable!());
        // goal.md existed, the other four were written
        assert_eq!(written.len(), 4);
        let goal = std::fs::read_to_string(dir.path().join("goal.md"))
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(goal, "existing");
    }
}
