//! Report renderers.

use std::fmt::Write;

use kmatrix_core::TaskResult;
use kmatrix_core::outcome::OUTCOMES;
use serde_json::{Value, json};

use super::{ReportRenderer, RunSummary};

/// Plain list: one `- <version> <icon>` line per result.
#[derive(Debug, Clone, Copy)]
pub struct ListReport {
    pub show_messages: bool,
}

impl ReportRenderer for ListReport {
    fn render(&self, results: &[TaskResult]) -> String {
        let mut out = String::from("Report:\n");
        for result in results {
            let _ = writeln!(out, "- {} {}", result.version, result.outcome.icon());
            if self.show_messages {
                let mut lines = result.message.trim_end().lines();
                let first = lines.next().unwrap_or_default();
                let _ = writeln!(out, "\tmessage: {first}");
                for line in lines {
                    let _ = writeln!(out, "\t{line}");
                }
            }
        }
        out
    }
}

/// Two-section markdown document: free-form messages, then a version/outcome table.
#[derive(Debug, Clone, Copy)]
pub struct MarkdownReport {
    pub show_messages: bool,
}

impl ReportRenderer for MarkdownReport {
    fn render(&self, results: &[TaskResult]) -> String {
        let mut out = String::from("# Kernel test report\n");

        if self.show_messages {
            out.push_str("\n## Messages\n");
            for result in results {
                let _ = writeln!(out, "\n### {} {}\n", result.version, result.outcome.icon());
                let message = result.message.trim_end();
                if message.is_empty() {
                    out.push_str("_no output_\n");
                } else {
                    let _ = writeln!(out, "```text\n{message}\n```");
                }
            }
        }

        out.push_str("\n## Results\n\n| Version | Result |\n| --- | --- |\n");
        for result in results {
            let _ = writeln!(
                out,
                "| {} | {} |",
                escape_table_cell(result.version.as_str()),
                result.outcome.icon()
            );
        }

        let legend: Vec<String> = OUTCOMES
            .iter()
            .map(|info| format!("{} {}", info.icon, info.canonical))
            .collect();
        let _ = writeln!(out, "\nLegend: {}", legend.join(", "));
        out
    }
}

fn escape_table_cell(text: &str) -> String {
    text.replace('|', "\\|")
}

/// JSON document with the ordered results and per-outcome counts.
#[derive(Debug, Clone, Copy)]
pub struct JsonReport {
    pub show_messages: bool,
}

impl ReportRenderer for JsonReport {
    fn render(&self, results: &[TaskResult]) -> String {
        let entries: Vec<Value> = results
            .iter()
            .map(|result| {
                let mut entry = json!({
                    "version": result.version.as_str(),
                    "outcome": result.outcome.as_str(),
                });
                if self.show_messages {
                    entry["message"] = Value::String(result.message.clone());
                }
                entry
            })
            .collect();

        let summary = RunSummary::from_results(results);
        let document = json!({
            "results": entries,
            "summary": {
                "total": summary.total,
                "success": summary.succeeded,
                "failure": summary.failed,
                "missing": summary.missing,
                "cancelled": summary.cancelled,
            },
        });

        let mut out = serde_json::to_string_pretty(&document).unwrap_or_default();
        out.push('\n');
        out
    }
}
