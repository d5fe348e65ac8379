use super::{Finding, RuleInfo, RuleInput, finding};

/// One finding per statement, listing every wildcard projection
pub(super) fn wildcard_select(info: &RuleInfo, input: &RuleInput<'_>) -> Vec<Finding> {
    let wildcards = &input.shape.wildcards;
    if wildcards.is_empty() {
        return vec![];
    }
    let evidence = wildcards
        .iter()
        .map(|w| w.text.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    vec![finding(
        info,
        input,
        "Query selects all columns with a wildcard".to_string(),
        evidence
    )]
}

pub(super) fn leading_wildcard_like(info: &RuleInfo, input: &RuleInput<'_>) -> Vec<Finding> {
    input
        .shape
        .leading_wildcard_likes()
        .map(|like| {
            let target = like
                .column
                .as_ref()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "expression".to_string());
            finding(
                info,
                input,
                format!("LIKE pattern on {} starts with a wildcard and cannot use an index", target),
                format!("{} LIKE '{}'", target, like.pattern)
            )
        })
        .collect()
}

pub(super) fn non_sargable(info: &RuleInfo, input: &RuleInput<'_>) -> Vec<Finding> {
    input
        .shape
        .non_sargable
        .iter()
        .map(|pred| {
            finding(
                info,
                input,
                format!(
                    "Column {} is wrapped in {} inside a comparison, which prevents index use",
                    pred.column, pred.wrapper
                ),
                pred.predicate.clone()
            )
        })
        .collect()
}

pub(super) fn long_in_list(info: &RuleInfo, input: &RuleInput<'_>, max_items: usize) -> Vec<Finding> {
    input
        .shape
        .in_lists
        .iter()
        .filter(|list| list.size > max_items)
        .map(|list| {
            let target = list
                .column
                .as_ref()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "expression".to_string());
            finding(
                info,
                input,
                format!("IN list has {} items (max {})", list.size, max_items),
                format!("{} IN (... {} items)", target, list.size)
            )
        })
        .collect()
}
