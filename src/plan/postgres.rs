use serde_json::Value;

use super::{AccessKind, PlanFacts, TableAccess, as_u64};

/// Root plan node: `[{"Plan": {...}}]` or `{"Plan": {...}}`
pub(super) fn root(value: &Value) -> Option<&Value> {
    match value.as_array() {
        Some(items) => items.first().and_then(|v| v.get("Plan")),
        None => value.get("Plan")
    }
}

pub(super) fn collect(root: &Value) -> PlanFacts {
    let mut facts = PlanFacts {
        estimated_rows: root.get("Plan Rows").and_then(as_u64),
        ..PlanFacts::default()
    };
    walk(root, &mut facts);
    facts
}

fn walk(node: &Value, facts: &mut PlanFacts) {
    let node_type = node
        .get("Node Type")
        .and_then(Value::as_str)
        .unwrap_or_default();

    match node_type {
        "Sort" | "Incremental Sort" => facts.using_filesort = true,
        "Materialize" | "HashAggregate" => facts.using_temporary = true,
        _ => {}
    }

    let access = match node_type {
        "Seq Scan" | "Parallel Seq Scan" => Some(AccessKind::FullScan),
        "Index Only Scan" | "Index Scan" | "Bitmap Heap Scan" => Some(AccessKind::IndexLookup),
        _ => None
    };
    if let Some(access) = access
        && let Some(table) = node.get("Relation Name").and_then(Value::as_str)
    {
        let key = index_name(node).map(Into::into);
        facts.accesses.push(TableAccess {
            table: table.into(),
            access,
            key,
            rows: node.get("Plan Rows").and_then(as_u64)
        });
    }

    if let Some(children) = node.get("Plans").and_then(Value::as_array) {
        for child in children {
            walk(child, facts);
        }
    }
}

/// Index used by a scan node; bitmap heap scans name it on their child
fn index_name(node: &Value) -> Option<&str> {
    node.get("Index Name").and_then(Value::as_str).or_else(|| {
        node.get("Plans")?
            .as_array()?
            .iter()
            .find_map(|child| child.get("Index Name").and_then(Value::as_str))
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn seq_scan_under_sort() {
        let raw = json!([{
            "Plan": {
                "Node Type": "Sort",
                "Plan Rows": 100,
                "Plans": [{"Node Type": "Seq Scan", "Relation Name": "users", "Plan Rows": 100}]
            }
        }]);
        let facts = collect(root(&raw).unwrap());
        assert!(facts.using_filesort);
        assert_eq!(facts.estimated_rows, Some(100));
        assert_eq!(facts.accesses[0].table, "users");
        assert_eq!(facts.accesses[0].access, AccessKind::FullScan);
    }

    #[test]
    fn index_scan_records_key() {
        let raw = json!({"Plan": {"Node Type": "Index Scan", "Relation Name": "orders", "Index Name": "idx_user"}});
        let facts = collect(root(&raw).unwrap());
        assert_eq!(facts.accesses[0].key.as_deref(), Some("idx_user"));
    }
}
