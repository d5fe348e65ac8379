use colored::Colorize;

use crate::{
    baseline::RegressionStatus,
    report::{Report, StatementReport},
    rules::Severity
};

/// Output format for results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Yaml,
    Markdown
}

impl OutputFormat {
    /// Structured formats are consumed by tools, not people
    pub fn is_machine_readable(self) -> bool {
        matches!(self, Self::Json | Self::Yaml)
    }
}

/// Output options
#[derive(Debug, Clone)]
pub struct OutputOptions {
    pub format:  OutputFormat,
    pub colored: bool,
    pub verbose: bool
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            format:  OutputFormat::Text,
            colored: true,
            verbose: false
        }
    }
}

/// Render a report in the requested format
pub fn format_report(report: &Report, opts: &OutputOptions) -> String {
    match opts.format {
        OutputFormat::Json => serde_json::to_string_pretty(report).unwrap_or_default(),
        OutputFormat::Yaml => serde_yaml::to_string(report).unwrap_or_default(),
        OutputFormat::Markdown => format_markdown(report),
        OutputFormat::Text => format_text(report, opts)
    }
}

fn paint(text: &str, severity: Severity, colored: bool) -> String {
    if !colored {
        return text.to_string();
    }
    match severity {
        Severity::Error => text.red().bold().to_string(),
        Severity::Warning => text.yellow().to_string(),
        Severity::Info => text.blue().to_string()
    }
}

fn format_text(report: &Report, opts: &OutputOptions) -> String {
    let mut out = String::new();
    let title = "=== SQL Quality Report ===";
    if opts.colored {
        out.push_str(&title.bold().to_string());
    } else {
        out.push_str(title);
    }
    out.push_str("\n\n");

    for entry in &report.statements {
        format_statement_text(&mut out, entry, opts);
    }

    let changed: Vec<_> = report
        .regressions
        .iter()
        .filter(|r| opts.verbose || r.status != RegressionStatus::Unchanged)
        .collect();
    if !changed.is_empty() {
        out.push_str("Baseline:\n");
        for result in changed {
            let status = result.status.to_string();
            let status = if opts.colored && result.is_regression() {
                status.red().bold().to_string()
            } else {
                status
            };
            out.push_str(&format!("  {} {}", status, result.statement_id));
            if !result.reasons.is_empty() {
                out.push_str(&format!(": {}", result.reasons.join("; ")));
            }
            out.push('\n');
        }
        out.push('\n');
    }

    if !report.diagnostics.is_empty() {
        out.push_str("Diagnostics:\n");
        for diagnostic in &report.diagnostics {
            out.push_str(&format!("  {}\n", diagnostic));
        }
        out.push('\n');
    }

    if opts.verbose {
        out.push_str("Stages:\n");
        for stage in &report.stages {
            let state = if stage.ran { "ran" } else { "skipped" };
            out.push_str(&format!("  {} ({}): {}\n", stage.stage, state, stage.detail));
        }
        out.push('\n');
    }

    let summary = &report.summary;
    let line = format!(
        "{}: {} statements, {} errors, {} warnings, {} info, {} suggestions, {} regressions",
        report.decision,
        summary.statements,
        summary.errors,
        summary.warnings,
        summary.infos,
        summary.suggestions,
        summary.regressions
    );
    if opts.colored {
        let painted = match report.exit_code() {
            2 => line.red().bold(),
            1 => line.yellow(),
            _ => line.green()
        };
        out.push_str(&painted.to_string());
    } else {
        out.push_str(&line);
    }
    out.push('\n');
    out
}

fn format_statement_text(out: &mut String, entry: &StatementReport, opts: &OutputOptions) {
    let header = format!("{} [{}] {}", entry.location, entry.kind, entry.statement_id);
    if opts.colored {
        out.push_str(&header.cyan().bold().to_string());
    } else {
        out.push_str(&header);
    }
    out.push('\n');
    out.push_str(&format!("  {}\n", entry.sql.trim()));
    if opts.verbose {
        if let Some(ms) = entry.duration_ms {
            out.push_str(&format!("  latency: {:.2} ms\n", ms));
        }
        if let Some(plan) = &entry.plan_fingerprint {
            out.push_str(&format!("  plan: {}\n", plan));
        }
    }
    for finding in &entry.findings {
        let label = paint(&format!("{:<5}", finding.severity.to_string()), finding.severity, opts.colored);
        out.push_str(&format!("  {} {}: {}\n", label, finding.rule_id, finding.message));
    }
    for suggestion in &entry.suggestions {
        out.push_str(&format!("  -> {}: {}\n", suggestion.kind, suggestion.detail));
    }
    out.push('\n');
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

fn format_markdown(report: &Report) -> String {
    let summary = &report.summary;
    let mut out = String::from("# SQL Quality Report\n\n");
    out.push_str(&format!("**Decision:** {}\n\n", report.decision));
    out.push_str("| Statements | Errors | Warnings | Info | Suggestions | Regressions |\n");
    out.push_str("|---|---|---|---|---|---|\n");
    out.push_str(&format!(
        "| {} | {} | {} | {} | {} | {} |\n\n",
        summary.statements,
        summary.errors,
        summary.warnings,
        summary.infos,
        summary.suggestions,
        summary.regressions
    ));

    if !report.statements.is_empty() {
        out.push_str("## Findings\n\n");
        for entry in &report.statements {
            out.push_str(&format!(
                "### `{}` ({}, {})\n\n```sql\n{}\n```\n\n",
                entry.location,
                entry.kind,
                entry.statement_id,
                entry.sql.trim()
            ));
            if !entry.findings.is_empty() {
                out.push_str("| Severity | Rule | Message |\n|---|---|---|\n");
                for finding in &entry.findings {
                    out.push_str(&format!(
                        "| {} | `{}` | {} |\n",
                        finding.severity,
                        finding.rule_id,
                        escape_cell(&finding.message)
                    ));
                }
                out.push('\n');
            }
            for suggestion in &entry.suggestions {
                out.push_str(&format!("- **{}**: {}\n", suggestion.kind, suggestion.detail));
            }
            if !entry.suggestions.is_empty() {
                out.push('\n');
            }
        }
    }

    if !report.regressions.is_empty() {
        out.push_str("## Baseline\n\n| Statement | Status | Details |\n|---|---|---|\n");
        for result in &report.regressions {
            out.push_str(&format!(
                "| `{}` | {} | {} |\n",
                result.statement_id,
                result.status,
                escape_cell(&result.reasons.join("; "))
            ));
        }
        out.push('\n');
    }

    if !report.diagnostics.is_empty() {
        out.push_str("## Diagnostics\n\n");
        for diagnostic in &report.diagnostics {
            out.push_str(&format!("- {}\n", escape_cell(&diagnostic.to_string())));
        }
        out.push('\n');
    }

    out.push_str("## Stages\n\n");
    for stage in &report.stages {
        let state = if stage.ran { "ran" } else { "skipped" };
        out.push_str(&format!("- {}: {} ({})\n", stage.stage, state, stage.detail));
    }
    out
}
