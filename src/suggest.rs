//! Optimizer suggestions derived from findings and plan evidence.
//!
//! Index suggestions name the statement's equality, `IN` and prefix-`LIKE`
//! columns. Overlapping index suggestions for one statement are merged per
//! table: one suggestion per `(statement, table)` whose columns are the
//! union of all candidates in order of first appearance, and whose reasons
//! list every finding or plan fact that asked for it. Candidate columns come
//! from the statement structure, never from the order findings arrive in, so
//! the output is deterministic.
//!
//! Rewrite hints cover wildcard projections (explicit column lists when the
//! table is known from schema context), non-sargable predicates, leading
//! wildcards and unguarded mutations. Statements that already need attention
//! also get structural hints: keyset pagination instead of OFFSET, and `IN`
//! lists instead of long OR chains of equalities.

use std::collections::{BTreeMap, BTreeSet};

use compact_str::CompactString;
use indexmap::IndexSet;
use serde::Serialize;

use crate::{
    plan::Plan,
    rules::Finding,
    schema::Schema,
    shape::{ColumnRef, StatementShape},
    statement::{Statement, StatementId}
};

/// Rules whose findings call for an index on the statement's filter columns
const INDEX_RULES: [&str; 5] = [
    "missing_where",
    "where_tautology",
    "non_sargable_predicate",
    "leading_wildcard_like",
    "no_index_used"
];

/// Functions whose argument can usually be turned into a range
const DATE_FUNCTIONS: [&str; 6] = ["DATE", "YEAR", "MONTH", "DAY", "DATE_FORMAT", "DATE_TRUNC"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionKind {
    Index,
    Rewrite
}

impl std::fmt::Display for SuggestionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Index => write!(f, "index"),
            Self::Rewrite => write!(f, "rewrite")
        }
    }
}

/// A concrete remediation for one statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Suggestion {
    pub statement_id: StatementId,
    pub kind:         SuggestionKind,
    pub detail:       String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table:        Option<CompactString>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub columns:      Vec<CompactString>,
    /// Rule ids, plan facts (`plan:*`) and structural facts (`shape:*`)
    /// behind this suggestion, sorted
    pub reasons:      Vec<&'static str>
}

#[derive(Default)]
struct IndexDraft {
    columns: IndexSet<CompactString>,
    reasons: BTreeSet<&'static str>
}

/// Derive suggestions for one statement.
///
/// `findings` may contain findings for other statements; only those for
/// `statement` are considered. Nothing is returned when the statement has no
/// findings and no adverse plan evidence.
pub fn suggest(
    statement: &Statement,
    shape: &StatementShape,
    findings: &[Finding],
    plan: Option<&Plan>,
    schema: &Schema
) -> Vec<Suggestion> {
    let fired: BTreeSet<&'static str> = findings
        .iter()
        .filter(|f| f.statement_id == *statement.id())
        .map(|f| f.rule_id)
        .collect();
    let adverse_plan =
        plan.is_some_and(|p| p.full_scan || p.using_filesort || p.using_temporary);
    if fired.is_empty() && !adverse_plan {
        return Vec::new();
    }

    let mut drafts: BTreeMap<Option<CompactString>, IndexDraft> = BTreeMap::new();
    let mut rewrites: BTreeSet<(String, Vec<&'static str>)> = BTreeSet::new();

    let index_reasons: Vec<&'static str> =
        INDEX_RULES.iter().copied().filter(|r| fired.contains(r)).collect();
    if !index_reasons.is_empty() {
        for column in &shape.filter_columns {
            add_column(&mut drafts, column, &index_reasons);
        }
    }

    if let Some(plan) = plan {
        plan_evidence(plan, shape, &mut drafts, &mut rewrites);
    }

    rewrite_hints(statement, shape, &fired, schema, &mut rewrites);

    let mut suggestions: Vec<Suggestion> = drafts
        .into_iter()
        .filter(|(_, draft)| !draft.columns.is_empty())
        .filter_map(|(table, draft)| index_suggestion(statement.id(), table, draft, schema))
        .collect();
    suggestions.extend(rewrites.into_iter().map(|(detail, reasons)| Suggestion {
        statement_id: statement.id().clone(),
        kind: SuggestionKind::Rewrite,
        detail,
        table: None,
        columns: Vec::new(),
        reasons
    }));
    suggestions.sort_by(|a, b| {
        a.kind
            .cmp(&b.kind)
            .then_with(|| a.table.cmp(&b.table))
            .then_with(|| a.detail.cmp(&b.detail))
    });
    suggestions
}

fn add_column(
    drafts: &mut BTreeMap<Option<CompactString>, IndexDraft>,
    column: &ColumnRef,
    reasons: &[&'static str]
) {
    let draft = drafts.entry(column.table.clone()).or_default();
    draft.columns.insert(column.name.clone());
    draft.reasons.extend(reasons.iter().copied());
}

/// Full scans reinforce or add index suggestions; sorts and temporary
/// tables ask for an index covering ORDER BY / GROUP BY columns
fn plan_evidence(
    plan: &Plan,
    shape: &StatementShape,
    drafts: &mut BTreeMap<Option<CompactString>, IndexDraft>,
    rewrites: &mut BTreeSet<(String, Vec<&'static str>)>
) {
    let mut scanned: Vec<&str> = Vec::new();
    for table in plan.scanned_tables() {
        let table = shape.resolve_table(table);
        if !scanned.contains(&table) {
            scanned.push(table);
        }
    }
    for table in scanned {
        let candidates: Vec<&ColumnRef> = shape
            .filter_columns
            .iter()
            .filter(|c| c.table.as_deref().is_some_and(|t| same_table(t, table)))
            .collect();
        if candidates.is_empty() {
            rewrites.insert((
                format!(
                    "Full scan of {} with no filter columns to index; add a selective predicate or a LIMIT",
                    table
                ),
                vec!["plan:full_scan"]
            ));
        }
        for column in candidates {
            add_column(drafts, column, &["plan:full_scan"]);
        }
    }
    if plan.using_filesort {
        for column in &shape.order_columns {
            add_column(drafts, column, &["plan:filesort"]);
        }
    }
    if plan.using_temporary {
        for column in &shape.group_columns {
            add_column(drafts, column, &["plan:temporary"]);
        }
    }
}

fn rewrite_hints(
    statement: &Statement,
    shape: &StatementShape,
    fired: &BTreeSet<&'static str>,
    schema: &Schema,
    rewrites: &mut BTreeSet<(String, Vec<&'static str>)>
) {
    if fired.contains("select_star") {
        for wildcard in &shape.wildcards {
            let known = wildcard
                .table
                .as_deref()
                .and_then(|table| schema.columns_of(table));
            let detail = match known {
                Some(columns) => format!(
                    "Replace {} with explicit columns: {}",
                    wildcard.text,
                    columns.join(", ")
                ),
                None => format!(
                    "Replace {} with the columns the caller actually reads",
                    wildcard.text
                )
            };
            rewrites.insert((detail, vec!["select_star"]));
        }
    }
    if fired.contains("non_sargable_predicate") {
        for pred in &shape.non_sargable {
            let detail = if DATE_FUNCTIONS.contains(&pred.wrapper.as_str()) {
                format!(
                    "Rewrite `{}` as a range on {} (e.g. {} >= :start AND {} < :end) so an index on it can be used",
                    pred.predicate, pred.column.name, pred.column.name, pred.column.name
                )
            } else {
                format!(
                    "Compare {} directly instead of through {}, or add a functional index on the expression in `{}`",
                    pred.column.name, pred.wrapper, pred.predicate
                )
            };
            rewrites.insert((detail, vec!["non_sargable_predicate"]));
        }
    }
    if fired.contains("leading_wildcard_like") {
        for like in shape.leading_wildcard_likes() {
            let target = like
                .column
                .as_ref()
                .map(|c| c.name.to_string())
                .unwrap_or_else(|| "the column".to_string());
            rewrites.insert((
                format!(
                    "LIKE '{}' cannot use a B-tree index; use a FULLTEXT or trigram index on {}",
                    like.pattern, target
                ),
                vec!["leading_wildcard_like"]
            ));
        }
    }
    if fired.contains("long_in_list") {
        rewrites.insert((
            "Load long IN lists into a temporary table and JOIN, or send them in batches"
                .to_string(),
            vec!["long_in_list"]
        ));
    }
    if fired.contains("missing_where") {
        rewrites.insert((
            format!(
                "Add a WHERE clause restricting the rows this {} touches",
                statement.kind()
            ),
            vec!["missing_where"]
        ));
    }
    for chain in &shape.or_chains {
        rewrites.insert((
            format!(
                "Replace the OR chain on {} with {} IN ({})",
                chain.written,
                chain.written,
                chain.values.join(", ")
            ),
            vec!["shape:or_chain"]
        ));
    }
    if shape.has_offset {
        rewrites.insert((
            "Replace OFFSET pagination with keyset pagination (WHERE key > :last_key ORDER BY key LIMIT n) so skipped rows are not scanned"
                .to_string(),
            vec!["shape:offset"]
        ));
    }
    if fired.contains("where_tautology")
        && let Some(condition) = &shape.where_tautology
    {
        rewrites.insert((
            format!(
                "Remove the always-true condition `{}` and restrict the rows this {} touches",
                condition,
                statement.kind()
            ),
            vec!["where_tautology"]
        ));
    }
}

fn index_suggestion(
    statement_id: &StatementId,
    table: Option<CompactString>,
    draft: IndexDraft,
    schema: &Schema
) -> Option<Suggestion> {
    let columns: Vec<CompactString> = draft.columns.into_iter().collect();
    let names: Vec<&str> = columns.iter().map(|c| c.as_str()).collect();

    let detail = match &table {
        Some(table) => {
            if schema.has_index_prefix(table, &names) {
                tracing::debug!(statement = %statement_id, table = %table, "index already covers suggested columns");
                return None;
            }
            format!(
                "CREATE INDEX idx_{}_{} ON {} ({});",
                index_token(table),
                names.join("_"),
                table,
                names.join(", ")
            )
        }
        None => format!("Consider an index on ({})", names.join(", "))
    };

    Some(Suggestion {
        statement_id: statement_id.clone(),
        kind: SuggestionKind::Index,
        detail,
        table,
        columns,
        reasons: draft.reasons.into_iter().collect()
    })
}

/// Last path segment of a possibly schema-qualified table, for index names
fn index_token(table: &str) -> &str {
    table.rsplit('.').next().unwrap_or(table)
}

fn same_table(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b) || index_token(a).eq_ignore_ascii_case(index_token(b))
}
