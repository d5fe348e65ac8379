//! Rule engine for SQL statements.
//!
//! Rules form a closed set: each [`Rule`] variant carries its own
//! parameters and evaluation is a single `match` over the variants. Static
//! rules look only at the statement and its [`StatementShape`]; plan rules
//! additionally need a [`Plan`] and are skipped for statements without one.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌─────────────┐
//! │ Statements  │────▶│  RuleRunner  │────▶│  Findings   │
//! │  + shapes   │     └──────────────┘     └─────────────┘
//! └─────────────┘            │
//!                     ┌──────┴──────┐
//!                     │    Rules    │
//!                     │  (parallel) │
//!                     └─────────────┘
//! ```
//!
//! # Rules
//!
//! | Id | Category | Default |
//! |----|----------|---------|
//! | `select_star` | Performance | warning |
//! | `missing_where` | Safety | error |
//! | `where_tautology` | Safety | warning |
//! | `leading_wildcard_like` | Performance | warning |
//! | `non_sargable_predicate` | Performance | warning |
//! | `long_in_list` | Performance | info |
//! | `full_table_scan` | Plan | warning |
//! | `no_index_used` | Plan | info |
//!
//! # Configuration
//!
//! ```yaml
//! rules:
//!   disabled: [long_in_list]
//!   max_in_list: 50
//!   severity:
//!     select_star: error
//! ```

mod performance;
mod plan;
mod safety;
mod types;

use std::collections::HashMap;

use rayon::prelude::*;
pub use types::{Finding, RuleCategory, RuleInfo, Severity};

use crate::{config::RulesConfig, plan::Plan, shape::StatementShape, statement::Statement};

/// Default threshold for [`Rule::LongInList`]
pub const DEFAULT_MAX_IN_LIST: usize = 100;

/// Everything a rule may look at for one statement
#[derive(Debug, Clone, Copy)]
pub struct RuleInput<'a> {
    pub statement: &'a Statement,
    pub shape:     &'a StatementShape,
    pub plan:      Option<&'a Plan>
}

/// Built-in rules
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    /// `SELECT *` or `table.*`
    WildcardSelect,
    /// `UPDATE`/`DELETE` without `WHERE`
    MissingWhere,
    /// `UPDATE`/`DELETE` whose `WHERE` is always true
    WhereTautology,
    /// `LIKE '%...'`
    LeadingWildcardLike,
    /// Column wrapped in a function, cast or arithmetic inside a comparison
    NonSargablePredicate,
    /// `IN (...)` with more than `max_items` elements
    LongInList { max_items: usize },
    /// Plan reads a whole table
    FullTableScan,
    /// Statement filters rows but the plan uses no index
    NoIndexUsed
}

impl Rule {
    /// Identifiers of every built-in rule
    pub const IDS: [&'static str; 8] = [
        "select_star",
        "missing_where",
        "where_tautology",
        "leading_wildcard_like",
        "non_sargable_predicate",
        "long_in_list",
        "full_table_scan",
        "no_index_used"
    ];

    /// Every built-in rule with the given `IN` list threshold
    pub fn all(max_in_list: usize) -> Vec<Self> {
        vec![
            Self::WildcardSelect,
            Self::MissingWhere,
            Self::WhereTautology,
            Self::LeadingWildcardLike,
            Self::NonSargablePredicate,
            Self::LongInList {
                max_items: max_in_list
            },
            Self::FullTableScan,
            Self::NoIndexUsed,
        ]
    }

    pub fn info(&self) -> RuleInfo {
        match self {
            Self::WildcardSelect => RuleInfo {
                id:          "select_star",
                name:        "Wildcard select",
                description: "SELECT * reads and ships every column",
                severity:    Severity::Warning,
                category:    RuleCategory::Performance
            },
            Self::MissingWhere => RuleInfo {
                id:          "missing_where",
                name:        "Mutation without WHERE",
                description: "UPDATE/DELETE without WHERE changes every row",
                severity:    Severity::Error,
                category:    RuleCategory::Safety
            },
            Self::WhereTautology => RuleInfo {
                id:          "where_tautology",
                name:        "Tautological WHERE on mutation",
                description: "UPDATE/DELETE whose WHERE clause is always true",
                severity:    Severity::Warning,
                category:    RuleCategory::Safety
            },
            Self::LeadingWildcardLike => RuleInfo {
                id:          "leading_wildcard_like",
                name:        "Leading wildcard LIKE",
                description: "LIKE pattern starting with % cannot use a B-tree index",
                severity:    Severity::Warning,
                category:    RuleCategory::Performance
            },
            Self::NonSargablePredicate => RuleInfo {
                id:          "non_sargable_predicate",
                name:        "Non-sargable predicate",
                description: "Function or arithmetic on a column prevents index use",
                severity:    Severity::Warning,
                category:    RuleCategory::Performance
            },
            Self::LongInList {
                ..
            } => RuleInfo {
                id:          "long_in_list",
                name:        "Long IN list",
                description: "IN list longer than the configured threshold",
                severity:    Severity::Info,
                category:    RuleCategory::Performance
            },
            Self::FullTableScan => RuleInfo {
                id:          "full_table_scan",
                name:        "Full table scan",
                description: "Execution plan reads every row of a table",
                severity:    Severity::Warning,
                category:    RuleCategory::Plan
            },
            Self::NoIndexUsed => RuleInfo {
                id:          "no_index_used",
                name:        "No index used",
                description: "Statement filters rows but the plan uses no index",
                severity:    Severity::Info,
                category:    RuleCategory::Plan
            }
        }
    }

    /// Whether the rule needs an execution plan
    pub fn requires_plan(&self) -> bool {
        matches!(self, Self::FullTableScan | Self::NoIndexUsed)
    }

    /// Evaluate this rule, with default severity
    pub fn evaluate(&self, input: &RuleInput<'_>) -> Vec<Finding> {
        let info = self.info();
        match self {
            Self::WildcardSelect => performance::wildcard_select(&info, input),
            Self::MissingWhere => safety::missing_where(&info, input),
            Self::WhereTautology => safety::where_tautology(&info, input),
            Self::LeadingWildcardLike => performance::leading_wildcard_like(&info, input),
            Self::NonSargablePredicate => performance::non_sargable(&info, input),
            Self::LongInList {
                max_items
            } => performance::long_in_list(&info, input, *max_items),
            Self::FullTableScan => match input.plan {
                Some(plan) => plan::full_table_scan(&info, input, plan),
                None => Vec::new()
            },
            Self::NoIndexUsed => match input.plan {
                Some(plan) => plan::no_index_used(&info, input, plan),
                None => Vec::new()
            }
        }
    }
}

/// Build a finding for `input`'s statement
pub(crate) fn finding(
    info: &RuleInfo,
    input: &RuleInput<'_>,
    message: String,
    evidence: String
) -> Finding {
    Finding {
        statement_id: input.statement.id().clone(),
        rule_id: info.id,
        rule_name: info.name,
        severity: info.severity,
        category: info.category,
        message,
        evidence,
        location: input.statement.location().clone()
    }
}

/// Parallel rule execution engine.
///
/// Holds the enabled rules and severity overrides from configuration.
/// Disabled rules are never constructed, so they are never evaluated.
///
/// # Example
///
/// ```
/// use sql_quality_analyzer::{
///     config::RulesConfig,
///     rules::{RuleRunner, Severity},
///     shape::{SqlDialect, analyze},
///     statement::{SourceLocation, Statement}
/// };
///
/// let config = RulesConfig {
///     disabled: vec!["select_star".into()],
///     ..Default::default()
/// };
/// let runner = RuleRunner::with_config(&config);
///
/// let stmt = Statement::new("DELETE FROM sessions", SourceLocation::new("db.sql", 1));
/// let shape = analyze(&stmt, SqlDialect::Generic).unwrap();
/// let findings = runner.evaluate(&stmt, &shape, None);
///
/// assert_eq!(findings.len(), 1);
/// assert_eq!(findings[0].severity, Severity::Error);
/// ```
#[derive(Debug, Clone)]
pub struct RuleRunner {
    rules:          Vec<Rule>,
    severity_cache: HashMap<&'static str, Severity>
}

impl Default for RuleRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleRunner {
    /// Create a new runner with all default rules
    pub fn new() -> Self {
        Self::with_config(&RulesConfig::default())
    }

    /// Create a new runner with configuration
    pub fn with_config(config: &RulesConfig) -> Self {
        let rules: Vec<Rule> = Rule::all(config.max_in_list)
            .into_iter()
            .filter(|r| {
                !config
                    .disabled
                    .iter()
                    .any(|d| d.eq_ignore_ascii_case(r.info().id))
            })
            .collect();

        let mut severity_cache = HashMap::new();
        for rule in &rules {
            let rule_id = rule.info().id;
            let configured = config
                .severity
                .iter()
                .find(|(id, _)| id.eq_ignore_ascii_case(rule_id))
                .map(|(_, sev)| sev);
            if let Some(sev_str) = configured
                && let Some(sev) = parse_severity(sev_str)
            {
                severity_cache.insert(rule_id, sev);
            }
        }

        Self {
            rules,
            severity_cache
        }
    }

    /// Enabled rules
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Evaluate all enabled rules on one statement.
    ///
    /// Plan rules run only when `plan` is present.
    pub fn evaluate(
        &self,
        statement: &Statement,
        shape: &StatementShape,
        plan: Option<&Plan>
    ) -> Vec<Finding> {
        let input = RuleInput {
            statement,
            shape,
            plan
        };
        let mut findings: Vec<Finding> = self
            .rules
            .iter()
            .filter(|rule| !rule.requires_plan() || plan.is_some())
            .flat_map(|rule| rule.evaluate(&input))
            .map(|finding| self.apply_override(finding))
            .collect();
        sort_findings(&mut findings);
        findings
    }

    /// Evaluate many statements in parallel. Output is sorted by severity
    /// (errors first), then location.
    pub fn evaluate_all<'a, I>(&self, inputs: I) -> Vec<Finding>
    where
        I: IntoParallelIterator<Item = RuleInput<'a>>
    {
        let mut findings: Vec<Finding> = inputs
            .into_par_iter()
            .flat_map_iter(|input| self.evaluate(input.statement, input.shape, input.plan))
            .collect();
        sort_findings(&mut findings);
        findings
    }

    fn apply_override(&self, mut finding: Finding) -> Finding {
        if let Some(&severity) = self.severity_cache.get(finding.rule_id) {
            finding.severity = severity;
        }
        finding
    }
}

/// Sort by severity (errors first), then location, then rule
pub fn sort_findings(findings: &mut [Finding]) {
    findings.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then_with(|| a.location.cmp(&b.location))
            .then_with(|| a.rule_id.cmp(b.rule_id))
            .then_with(|| a.evidence.cmp(&b.evidence))
    });
}

/// Parse severity string to enum
pub fn parse_severity(s: &str) -> Option<Severity> {
    match s.to_lowercase().as_str() {
        "error" => Some(Severity::Error),
        "warning" | "warn" => Some(Severity::Warning),
        "info" => Some(Severity::Info),
        _ => None
    }
}
