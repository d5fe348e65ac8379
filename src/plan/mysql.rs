use serde_json::Value;

use super::{AccessKind, PlanFacts, TableAccess, as_u64};

/// Walk a MySQL `query_block`.
///
/// Table accesses may sit under `table`, inside `nested_loop` arrays, or
/// wrapped by `ordering_operation`, `grouping_operation`,
/// `duplicates_removal` and subquery/union blocks, so the walk is generic
/// over objects and arrays rather than following a fixed path.
pub(super) fn collect(block: &Value) -> PlanFacts {
    let mut facts = PlanFacts::default();
    walk(block, &mut facts);
    facts
}

fn walk(value: &Value, facts: &mut PlanFacts) {
    match value {
        Value::Object(map) => {
            if map.get("using_filesort").and_then(Value::as_bool) == Some(true) {
                facts.using_filesort = true;
            }
            if map.get("using_temporary_table").and_then(Value::as_bool) == Some(true) {
                facts.using_temporary = true;
            }
            if let Some(table) = map.get("table")
                && table.get("table_name").is_some()
            {
                facts.accesses.push(table_access(table));
            }
            for (key, child) in map {
                if key != "table" || child.get("table_name").is_none() {
                    walk(child, facts);
                } else {
                    // Materialized subqueries nest blocks inside a table entry
                    for nested in child.as_object().into_iter().flat_map(|m| m.values()) {
                        walk(nested, facts);
                    }
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                walk(item, facts);
            }
        }
        _ => {}
    }
}

fn table_access(table: &Value) -> TableAccess {
    let name = table
        .get("table_name")
        .and_then(Value::as_str)
        .unwrap_or("?");
    let access_type = table
        .get("access_type")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let key = table.get("key").and_then(Value::as_str).map(Into::into);
    let access = match access_type {
        "ALL" => AccessKind::FullScan,
        "index" => AccessKind::IndexScan,
        "const" | "system" | "eq_ref" | "ref" | "ref_or_null" | "range" | "index_merge"
        | "fulltext" | "unique_subquery" | "index_subquery" => AccessKind::IndexLookup,
        _ => AccessKind::Other
    };
    let rows = table
        .get("rows_examined_per_scan")
        .and_then(as_u64)
        .or_else(|| table.get("rows").and_then(as_u64));

    TableAccess {
        table: name.into(),
        access,
        key,
        rows
    }
}
