use serde_json::json;
use sql_quality_analyzer::{
    plan::{AccessKind, Plan, is_scan_shape},
    statement::StatementId
};

fn id() -> StatementId {
    StatementId::from("0123456789abcdef")
}

#[test]
fn test_mysql_nested_loop() {
    let raw = json!({
        "query_block": {
            "select_id": 1,
            "nested_loop": [
                {"table": {"table_name": "users", "access_type": "ALL", "rows_examined_per_scan": 1200}},
                {"table": {"table_name": "orders", "access_type": "ref", "key": "idx_user", "rows_examined_per_scan": 3}}
            ]
        }
    });
    let plan = Plan::from_json(id(), raw).unwrap();

    assert!(plan.full_scan);
    assert!(plan.uses_index);
    assert_eq!(plan.chosen_key.as_deref(), Some("idx_user"));
    assert_eq!(plan.estimated_rows, Some(1203));
    assert_eq!(plan.scanned_tables(), vec!["users"]);
    assert_eq!(plan.shape_fingerprint(), "users:full_scan,orders:index(idx_user)");
}

#[test]
fn test_mysql_ordering_and_grouping_flags() {
    let raw = json!({
        "query_block": {
            "ordering_operation": {
                "using_filesort": true,
                "grouping_operation": {
                    "using_temporary_table": true,
                    "table": {"table_name": "orders", "access_type": "index", "key": "PRIMARY"}
                }
            }
        }
    });
    let plan = Plan::from_json(id(), raw).unwrap();

    assert!(plan.using_filesort);
    assert!(plan.using_temporary);
    assert!(!plan.full_scan);
    assert_eq!(plan.accesses[0].access, AccessKind::IndexScan);
}

#[test]
fn test_mysql_rows_as_strings() {
    let raw = json!({
        "query_block": {"table": {"table_name": "t", "access_type": "ALL", "rows_examined_per_scan": "42"}}
    });
    let plan = Plan::from_json(id(), raw).unwrap();
    assert_eq!(plan.estimated_rows, Some(42));
}

#[test]
fn test_postgres_plan() {
    let raw = json!([{
        "Plan": {
            "Node Type": "Hash Join",
            "Plan Rows": 500,
            "Plans": [
                {"Node Type": "Seq Scan", "Relation Name": "orders", "Plan Rows": 10000},
                {"Node Type": "Hash", "Plans": [
                    {"Node Type": "Index Scan", "Relation Name": "users", "Index Name": "users_pkey", "Plan Rows": 1}
                ]}
            ]
        }
    }]);
    let plan = Plan::from_json(id(), raw).unwrap();

    assert!(plan.full_scan);
    assert_eq!(plan.estimated_rows, Some(500));
    assert_eq!(plan.chosen_key.as_deref(), Some("users_pkey"));
    assert_eq!(plan.shape_fingerprint(), "orders:full_scan,users:index(users_pkey)");
}

#[test]
fn test_postgres_bitmap_scan_takes_child_index() {
    let raw = json!({
        "Plan": {
            "Node Type": "Bitmap Heap Scan",
            "Relation Name": "events",
            "Plans": [{"Node Type": "Bitmap Index Scan", "Index Name": "idx_events_ts"}]
        }
    });
    let plan = Plan::from_json(id(), raw).unwrap();
    assert!(plan.uses_index);
    assert_eq!(plan.shape_fingerprint(), "events:index(idx_events_ts)");
}

#[test]
fn test_plan_from_text_output() {
    let text = r#"  {"query_block": {"table": {"table_name": "users", "access_type": "const", "key": "PRIMARY"}}}  "#;
    let plan = Plan::from_str_output(id(), text).unwrap();
    assert!(!plan.full_scan);
    assert_eq!(plan.statement_id, id());
}

#[test]
fn test_unknown_format_is_an_error() {
    let err = Plan::from_json(id(), json!({"rows": 3})).unwrap_err();
    assert!(err.to_string().starts_with("unrecognized execution plan"));
    assert!(Plan::from_str_output(id(), "not json").is_err());
}

#[test]
fn test_plan_without_tables() {
    let plan = Plan::from_json(id(), json!({"query_block": {"select_id": 1, "message": "No tables used"}})).unwrap();
    assert!(!plan.full_scan);
    assert!(!plan.uses_index);
    assert_eq!(plan.shape_fingerprint(), "");
}

#[test]
fn test_scan_shape_detection() {
    assert!(is_scan_shape("users:full_scan"));
    assert!(is_scan_shape("orders:index(idx_user),users:full_scan"));
    assert!(!is_scan_shape("users:index(PRIMARY)"));
    assert!(!is_scan_shape("users:index_scan"));
    assert!(!is_scan_shape(""));
}
