//! Output formatting for CLI results.

use std::fmt::Write as _;

use serde::Serialize;

use crate::research::{AgentStatus, ResearchRun};

/// Output format for CLI results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text.
    Text,
    /// Machine-readable JSON.
    Json,
}

impl OutputFormat {
    /// Parses a format string (case-insensitive), defaulting to text.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Text
        }
    }
}

#[derive(Serialize)]
struct JsonRun<'a> {
    report: &'a crate::research::FinalReport,
    metrics: &'a crate::research::MetricsSnapshot,
    elapsed_secs: f64,
}

/// Formats a completed run for the terminal.
#[must_use]
pub fn format_run(run: &ResearchRun, format: OutputFormat, include_metrics: bool) -> String {
    match format {
        OutputFormat::Json => {
            let payload = JsonRun {
                report: &run.report,
                metrics: &run.metrics,
                elapsed_secs: run.elapsed.as_secs_f64(),
            };
            serde_json::to_string_pretty(&payload).unwrap_or_else(|_| "{}".to_string())
        }
        OutputFormat::Text => {
            let mut out = String::new();
            out.push_str(&run.report.narrative);
            out.push('\n');

            if !run.report.sources.is_empty() {
                out.push_str("\n## Sources\n");
                for group in &run.report.sources {
                    let _ = writeln!(out, "\n{}:", group.topic);
                    for url in &group.urls {
                        let _ = writeln!(out, "  - {url}");
                    }
                }
            }

            if !run.report.gaps.is_empty() {
                out.push_str("\n## Gaps\n");
                for section in &run.report.sections {
                    if section.status != AgentStatus::Ok {
                        let _ = writeln!(
                            out,
                            "  - Objective {} ({}): {}",
                            section.objective.index + 1,
                            section.status,
                            section.objective.directive
                        );
                    }
                }
            }

            if run.report.fallback {
                out.push_str("\nNote: the synthesis model was unreachable; this report is a direct concatenation of agent summaries.\n");
            }

            if include_metrics {
                out.push('\n');
                out.push_str(&run.metrics.render());
            }

            let _ = writeln!(out, "\nCompleted in {:.1}s.", run.elapsed.as_secs_f64());
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::research::{FinalReport, MetricsCollector, Objective, ReportSection, ResearchGoal};
    use std::time::Duration;

    fn run() -> ResearchRun {
        ResearchRun {
            report: FinalReport {
                goal: ResearchGoal {
                    query: "q".to_string(),
                    statement: "s".to_string(),
                    scope: String::new(),
                },
                narrative: "# Narrative".to_string(),
                sections: vec![ReportSection {
                    objective: Objective {
                        index: 0,
                        directive: "dig".to_string(),
                    },
                    status: AgentStatus::Degraded,
                    body: "partial".to_string(),
                }],
                sources: Vec::new(),
                gaps: vec![0],
                fallback: false,
            },
            metrics: MetricsCollector::new().drain(),
            elapsed: Duration::from_secs(3),
        }
    }

    #[test]
    fn test_parse_format() {
        assert_eq!(OutputFormat::parse("json"), OutputFormat::Json);
        assert_eq!(OutputFormat::parse("JSON"), OutputFormat::Json);
        assert_eq!(OutputFormat::parse("text"), OutputFormat::Text);
        assert_eq!(OutputFormat::parse("anything"), OutputFormat::Text);
    }

    #[test]
    fn test_text_output_lists_gaps() {
        let rendered = format_run(&run(), OutputFormat::Text, false);
        assert!(rendered.contains("# Narrative"));
        assert!(rendered.contains("## Gaps"));
        assert!(rendered.contains("Objective 1 (degraded)"));
    }

    #[test]
    fn test_json_output_is_valid() {
        let rendered = format_run(&run(), OutputFormat::Json, false);
        let value: serde_json::Value =
            serde_json::from_str(&rendered).unwrap_or_else(|_| unreachable!());
        assert_eq!(value["report"]["narrative"], "# Narrative");
        assert_eq!(value["elapsed_secs"], 3.0);
    }

    #[test]
    fn test_metrics_summary_included_on_request() {
        let rendered = format_run(&run(), OutputFormat::Text, true);
        assert!(rendered.contains("Session summary"));
    }
}
