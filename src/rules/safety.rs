use super::{Finding, RuleInfo, RuleInput, finding};

const EVIDENCE_LIMIT: usize = 120;

pub(super) fn missing_where(info: &RuleInfo, input: &RuleInput<'_>) -> Vec<Finding> {
    let kind = input.statement.kind();
    if !kind.is_mutation() || input.shape.has_where {
        return vec![];
    }
    vec![finding(
        info,
        input,
        format!("{} without WHERE clause affects every row", kind),
        truncate(input.statement.normalized_text())
    )]
}

/// A tautological WHERE replaces, never accompanies, a missing-WHERE finding
pub(super) fn where_tautology(info: &RuleInfo, input: &RuleInput<'_>) -> Vec<Finding> {
    let kind = input.statement.kind();
    if !kind.is_mutation() {
        return vec![];
    }
    let Some(condition) = &input.shape.where_tautology else {
        return vec![];
    };
    vec![finding(
        info,
        input,
        format!("{} WHERE clause is always true and affects every row", kind),
        format!("WHERE {}", truncate(condition))
    )]
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= EVIDENCE_LIMIT {
        return text.to_string();
    }
    let cut: String = text.chars().take(EVIDENCE_LIMIT).collect();
    format!("{}...", cut)
}
