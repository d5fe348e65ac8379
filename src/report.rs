//! The immutable result of one run.
//!
//! A [`Report`] is assembled once through [`ReportBuilder`]. It groups
//! findings and suggestions by statement, carries regression results and
//! every non-fatal diagnostic, and records which stages ran and why the
//! others did not.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    baseline::RegressionResult,
    dynamic::ProbeError,
    extract::{ExtractionWarning, SkippedCandidate},
    rules::{Finding, Severity, sort_findings},
    statement::{SourceLocation, Statement, StatementId, StatementKind},
    suggest::Suggestion
};

/// Pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Extraction,
    StaticRules,
    Dynamic,
    Suggestions,
    Baseline
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Extraction => "extraction",
            Self::StaticRules => "static rules",
            Self::Dynamic => "dynamic analysis",
            Self::Suggestions => "suggestions",
            Self::Baseline => "baseline comparison"
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageStatus {
    pub stage:  Stage,
    pub ran:    bool,
    /// What the stage did, or why it was skipped
    pub detail: String
}

/// Non-fatal problems collected during the run
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Diagnostic {
    ExtractionWarning(ExtractionWarning),
    SkippedCandidate(SkippedCandidate),
    UnparseableStatement {
        statement_id: StatementId,
        location:     SourceLocation,
        message:      String
    },
    ProbeError(ProbeError),
    BaselineNotice {
        message: String
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExtractionWarning(w) => match w.line {
                Some(line) => write!(f, "{}:{}: {}", w.file, line, w.message),
                None => write!(f, "{}: {}", w.file, w.message)
            },
            Self::SkippedCandidate(s) => {
                write!(f, "{}: skipped {}(...): {}", s.location, s.call, s.reason)
            }
            Self::UnparseableStatement {
                location,
                message,
                ..
            } => write!(f, "{}: {}", location, message),
            Self::ProbeError(e) => write!(f, "{}", e),
            Self::BaselineNotice {
                message
            } => f.write_str(message)
        }
    }
}

/// Findings and suggestions for one statement
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatementReport {
    pub statement_id:     StatementId,
    pub location:         SourceLocation,
    pub kind:             StatementKind,
    pub sql:              String,
    pub findings:         Vec<Finding>,
    pub suggestions:      Vec<Suggestion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms:      Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_fingerprint: Option<String>
}

impl StatementReport {
    pub fn new(statement: &Statement) -> Self {
        Self {
            statement_id:     statement.id().clone(),
            location:         statement.location().clone(),
            kind:             statement.kind(),
            sql:              statement.raw_text().to_string(),
            findings:         Vec::new(),
            suggestions:      Vec::new(),
            duration_ms:      None,
            plan_fingerprint: None
        }
    }

    pub fn worst_severity(&self) -> Option<Severity> {
        self.findings.iter().map(|f| f.severity).max()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Pass,
    Fail
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass => f.write_str("PASS"),
            Self::Fail => f.write_str("FAIL")
        }
    }
}

/// Counts per severity and per outcome
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub statements:  usize,
    pub errors:      usize,
    pub warnings:    usize,
    pub infos:       usize,
    pub suggestions: usize,
    pub regressions: usize,
    pub diagnostics: usize
}

impl Summary {
    pub fn findings(&self) -> usize {
        self.errors + self.warnings + self.infos
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub generated_at: DateTime<Utc>,
    pub decision:     Decision,
    pub summary:      Summary,
    pub stages:       Vec<StageStatus>,
    /// Statements with findings or suggestions, worst first
    pub statements:   Vec<StatementReport>,
    pub regressions:  Vec<RegressionResult>,
    pub diagnostics:  Vec<Diagnostic>
}

impl Report {
    pub fn decision(&self) -> Decision {
        self.decision
    }

    /// 2 for errors or regressions, 1 for warnings only, 0 otherwise
    pub fn exit_code(&self) -> i32 {
        if self.decision == Decision::Fail {
            2
        } else if self.summary.warnings > 0 {
            1
        } else {
            0
        }
    }

    pub fn stage(&self, stage: Stage) -> Option<&StageStatus> {
        self.stages.iter().find(|s| s.stage == stage)
    }

    /// All findings in report order
    pub fn findings(&self) -> impl Iterator<Item = &Finding> {
        self.statements.iter().flat_map(|s| s.findings.iter())
    }

    pub fn suggestions(&self) -> impl Iterator<Item = &Suggestion> {
        self.statements.iter().flat_map(|s| s.suggestions.iter())
    }
}

/// Accumulates one run's results
#[derive(Debug, Default)]
pub struct ReportBuilder {
    stages:      Vec<StageStatus>,
    statements:  Vec<StatementReport>,
    total:       usize,
    regressions: Vec<RegressionResult>,
    diagnostics: Vec<Diagnostic>
}

impl ReportBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage_ran(&mut self, stage: Stage, detail: impl Into<String>) -> &mut Self {
        self.set_stage(stage, true, detail.into())
    }

    pub fn stage_skipped(&mut self, stage: Stage, reason: impl Into<String>) -> &mut Self {
        let reason = reason.into();
        tracing::info!(stage = %stage, reason = %reason, "stage skipped");
        self.set_stage(stage, false, reason)
    }

    fn set_stage(&mut self, stage: Stage, ran: bool, detail: String) -> &mut Self {
        self.stages.retain(|s| s.stage != stage);
        self.stages.push(StageStatus {
            stage,
            ran,
            detail
        });
        self
    }

    /// Number of statements analyzed, reported or not
    pub fn statements_seen(&mut self, total: usize) -> &mut Self {
        self.total = total;
        self
    }

    /// Statements without findings or suggestions are counted but not listed
    pub fn statement(&mut self, mut entry: StatementReport) -> &mut Self {
        if entry.findings.is_empty() && entry.suggestions.is_empty() {
            return self;
        }
        sort_findings(&mut entry.findings);
        self.statements.push(entry);
        self
    }

    pub fn regressions(&mut self, results: Vec<RegressionResult>) -> &mut Self {
        self.regressions = results;
        self
    }

    pub fn diagnostic(&mut self, diagnostic: Diagnostic) -> &mut Self {
        self.diagnostics.push(diagnostic);
        self
    }

    pub fn diagnostics(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) -> &mut Self {
        self.diagnostics.extend(diagnostics);
        self
    }

    pub fn build(self) -> Report {
        let mut statements = self.statements;
        statements.sort_by(|a, b| {
            b.worst_severity()
                .cmp(&a.worst_severity())
                .then_with(|| a.location.cmp(&b.location))
                .then_with(|| a.statement_id.cmp(&b.statement_id))
        });

        let mut summary = Summary {
            statements: self.total.max(statements.len()),
            regressions: self.regressions.iter().filter(|r| r.is_regression()).count(),
            diagnostics: self.diagnostics.len(),
            ..Summary::default()
        };
        for entry in &statements {
            summary.suggestions += entry.suggestions.len();
            for finding in &entry.findings {
                match finding.severity {
                    Severity::Error => summary.errors += 1,
                    Severity::Warning => summary.warnings += 1,
                    Severity::Info => summary.infos += 1
                }
            }
        }
        let decision = if summary.errors > 0 || summary.regressions > 0 {
            Decision::Fail
        } else {
            Decision::Pass
        };

        let mut stages = self.stages;
        stages.sort_by_key(|s| s.stage as u8);

        Report {
            generated_at: Utc::now(),
            decision,
            summary,
            stages,
            statements,
            regressions: self.regressions,
            diagnostics: self.diagnostics
        }
    }
}
