use super::{Finding, RuleInfo, RuleInput, finding};
use crate::plan::Plan;

pub(super) fn full_table_scan(info: &RuleInfo, input: &RuleInput<'_>, plan: &Plan) -> Vec<Finding> {
    let mut scanned: Vec<&str> = Vec::new();
    for table in plan.scanned_tables() {
        let table = input.shape.resolve_table(table);
        if !scanned.contains(&table) {
            scanned.push(table);
        }
    }
    if scanned.is_empty() {
        return vec![];
    }
    let rows = plan
        .estimated_rows
        .map(|r| format!(" (~{} rows)", r))
        .unwrap_or_default();
    vec![finding(
        info,
        input,
        format!("Execution plan scans every row of {}{}", scanned.join(", "), rows),
        plan.shape_fingerprint()
    )]
}

/// Fires only when the statement filters on columns, otherwise there is
/// nothing an index could serve
pub(super) fn no_index_used(info: &RuleInfo, input: &RuleInput<'_>, plan: &Plan) -> Vec<Finding> {
    if plan.uses_index || plan.accesses.is_empty() || input.shape.filter_columns.is_empty() {
        return vec![];
    }
    let columns = input
        .shape
        .filter_columns
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    vec![finding(
        info,
        input,
        format!("Statement filters on {} but the plan uses no index", columns),
        plan.shape_fingerprint()
    )]
}
