//! Type definitions for the rule system.
//!
//! - [`Severity`] - Finding severity levels (Info, Warning, Error)
//! - [`RuleCategory`] - Rule categories (Performance, Safety, Plan)
//! - [`Finding`] - One rule hit on one statement

use serde::Serialize;

use crate::statement::{SourceLocation, StatementId};

/// Severity level of a finding.
///
/// Ordered from lowest to highest severity for sorting purposes.
/// Exit codes are determined by the highest severity finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational, does not affect exit code
    Info,
    /// May indicate a problem (exit code 1)
    Warning,
    /// Must be addressed (exit code 2)
    Error
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR")
        }
    }
}

/// Category of a rule for grouping and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleCategory {
    /// Patterns that defeat indexes or bloat result sets
    Performance,
    /// Statements that can change more rows than intended
    Safety,
    /// Evidence from a live execution plan
    Plan
}

impl std::fmt::Display for RuleCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Performance => write!(f, "Performance"),
            Self::Safety => write!(f, "Safety"),
            Self::Plan => write!(f, "Plan")
        }
    }
}

/// Metadata about a rule for identification and configuration.
#[derive(Debug, Clone)]
pub struct RuleInfo {
    /// Unique rule identifier (e.g., "select_star")
    pub id:          &'static str,
    /// Human-readable rule name
    pub name:        &'static str,
    pub description: &'static str,
    /// Default severity level
    pub severity:    Severity,
    pub category:    RuleCategory
}

/// A single rule hit on a statement. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub statement_id: StatementId,
    pub rule_id:      &'static str,
    pub rule_name:    &'static str,
    pub severity:     Severity,
    pub category:     RuleCategory,
    pub message:      String,
    /// The fragment of the statement or plan that triggered the rule
    pub evidence:     String,
    pub location:     SourceLocation
}
