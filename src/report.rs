//! Result JSON on stdout, diffs and failures on the side.
//!
//! stdout carries exactly one JSON object per invocation so the output
//! stays machine-readable; logs and diffs go to stderr.

use colored::Colorize;
use reconcile::{DiffEntry, RunReport};
use serde_json::{Value, json};

/// Result object for a command that converged one entity.
pub fn ensure_result(report: &RunReport) -> Value {
    json!({
        "changed": report.changed,
        "entity": report.entity,
    })
}

/// Result object for a failed run.
pub fn failure_result(message: &str) -> Value {
    json!({
        "failed": true,
        "msg": message,
    })
}

/// Print a result object, pretty-printed, to stdout.
pub fn print_result(result: &Value) {
    let text = serde_json::to_string_pretty(result).unwrap_or_else(|_| result.to_string());
    println!("{text}");
}

/// Print a failure object to stdout.
pub fn print_failure(message: &str) {
    print_result(&failure_result(message));
}

/// Emit a run report: the diff to stderr when asked for, the result
/// object to stdout.
pub fn emit(report: &RunReport, show_diff: bool) {
    if show_diff {
        render_diff(&report.diff);
    }
    print_result(&ensure_result(report));
}

/// Show each recorded write as a colored diff using the `similar` crate
pub fn render_diff(entries: &[DiffEntry]) {
    for entry in entries {
        eprintln!("{}", entry.resource.bold());
        let before = pretty(&entry.before);
        let after = pretty(&entry.after);
        let diff = similar::TextDiff::from_lines(&before, &after);
        for change in diff.iter_all_changes() {
            match change.tag() {
                similar::ChangeTag::Delete => {
                    eprint!("{}", format!("- {change}").red());
                }
                similar::ChangeTag::Insert => {
                    eprint!("{}", format!("+ {change}").green());
                }
                similar::ChangeTag::Equal => {
                    eprint!("  {change}");
                }
            }
        }
        eprintln!();
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
