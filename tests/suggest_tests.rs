use serde_json::json;
use sql_quality_analyzer::{
    plan::Plan,
    rules::{Finding, RuleRunner},
    schema::Schema,
    shape::{SqlDialect, StatementShape, analyze},
    statement::{SourceLocation, Statement},
    suggest::{Suggestion, SuggestionKind, suggest}
};

struct Case {
    statement: Statement,
    shape:     StatementShape,
    plan:      Option<Plan>
}

impl Case {
    fn new(sql: &str) -> Self {
        let statement = Statement::new(sql, SourceLocation::new("app/queries.sql", 1));
        let shape = analyze(&statement, SqlDialect::Generic).unwrap();
        Self {
            statement,
            shape,
            plan: None
        }
    }

    fn with_plan(mut self, raw: serde_json::Value) -> Self {
        self.plan = Some(Plan::from_json(self.statement.id().clone(), raw).unwrap());
        self
    }

    fn findings(&self) -> Vec<Finding> {
        RuleRunner::new().evaluate(&self.statement, &self.shape, self.plan.as_ref())
    }

    fn suggest_with(&self, findings: &[Finding], schema: &Schema) -> Vec<Suggestion> {
        suggest(&self.statement, &self.shape, findings, self.plan.as_ref(), schema)
    }

    fn suggest(&self, schema: &Schema) -> Vec<Suggestion> {
        self.suggest_with(&self.findings(), schema)
    }
}

fn of_kind(suggestions: &[Suggestion], kind: SuggestionKind) -> Vec<&Suggestion> {
    suggestions.iter().filter(|s| s.kind == kind).collect()
}

fn sorted_scan_plan() -> serde_json::Value {
    json!({
        "query_block": {
            "ordering_operation": {
                "using_filesort": true,
                "table": {"table_name": "orders", "access_type": "ALL", "rows_examined_per_scan": 90000}
            }
        }
    })
}

#[test]
fn test_no_findings_no_suggestions() {
    let case = Case::new("SELECT id FROM users WHERE id = 1");
    assert!(case.suggest(&Schema::default()).is_empty());
}

#[test]
fn test_overlapping_index_candidates_merge_per_table() {
    let case = Case::new("SELECT id FROM orders WHERE user_id = 1 AND status = 'paid' ORDER BY created_at")
        .with_plan(sorted_scan_plan());
    let suggestions = case.suggest(&Schema::default());

    assert_eq!(suggestions.len(), 1);
    let index = &suggestions[0];
    assert_eq!(index.kind, SuggestionKind::Index);
    assert_eq!(index.table.as_deref(), Some("orders"));
    assert_eq!(index.columns, vec!["user_id", "status", "created_at"]);
    assert_eq!(
        index.detail,
        "CREATE INDEX idx_orders_user_id_status_created_at ON orders (user_id, status, created_at);"
    );
    assert_eq!(index.reasons, vec!["no_index_used", "plan:filesort", "plan:full_scan"]);
}

#[test]
fn test_suggestions_independent_of_finding_order() {
    let case = Case::new("SELECT * FROM orders WHERE YEAR(created_at) = 2024 AND status = 'x' AND note LIKE '%gift'")
        .with_plan(sorted_scan_plan());
    let findings = case.findings();
    assert!(findings.len() >= 4);

    let mut reversed = findings.clone();
    reversed.reverse();
    let mut rotated = findings.clone();
    rotated.rotate_left(2);

    let schema = Schema::default();
    let expected = case.suggest_with(&findings, &schema);
    assert_eq!(case.suggest_with(&reversed, &schema), expected);
    assert_eq!(case.suggest_with(&rotated, &schema), expected);
    assert_eq!(of_kind(&expected, SuggestionKind::Index).len(), 1);
}

#[test]
fn test_index_sorted_before_rewrites() {
    let case = Case::new("SELECT * FROM orders WHERE status = 'x' AND LOWER(note) = 'gift'");
    let kinds: Vec<_> = case
        .suggest(&Schema::default())
        .iter()
        .map(|s| s.kind)
        .collect();
    assert_eq!(kinds.first(), Some(&SuggestionKind::Index));
    assert!(kinds.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn test_wildcard_rewrite_names_known_columns() {
    let schema = Schema::parse(
        "CREATE TABLE users (id INT PRIMARY KEY, email VARCHAR(255), created_at TIMESTAMP);",
        SqlDialect::Generic
    )
    .unwrap();
    let case = Case::new("SELECT * FROM users WHERE id = 1");
    let rewrites = case.suggest(&schema);

    assert_eq!(rewrites.len(), 1);
    assert_eq!(rewrites[0].kind, SuggestionKind::Rewrite);
    assert_eq!(rewrites[0].detail, "Replace * with explicit columns: id, email, created_at");
    assert_eq!(rewrites[0].reasons, vec!["select_star"]);
}

#[test]
fn test_wildcard_rewrite_without_schema_is_generic() {
    let case = Case::new("SELECT * FROM users WHERE id = 1");
    let rewrites = case.suggest(&Schema::default());
    assert_eq!(rewrites.len(), 1);
    assert!(rewrites[0].detail.contains("columns the caller actually reads"));
}

#[test]
fn test_existing_index_suppresses_index_suggestion() {
    let schema = Schema::parse(
        "CREATE TABLE orders (id INT, status VARCHAR(16), note TEXT);\nCREATE INDEX idx_status ON orders (status);",
        SqlDialect::Generic
    )
    .unwrap();
    let case = Case::new("SELECT id FROM orders WHERE status = 'x' AND LOWER(note) = 'gift'");
    let suggestions = case.suggest(&schema);

    assert!(of_kind(&suggestions, SuggestionKind::Index).is_empty());
    let rewrites = of_kind(&suggestions, SuggestionKind::Rewrite);
    assert_eq!(rewrites.len(), 1);
    assert!(rewrites[0].detail.contains("functional index"));
}

#[test]
fn test_date_function_gets_range_rewrite() {
    let case = Case::new("SELECT id FROM orders WHERE YEAR(created_at) = 2024");
    let rewrites = of_kind(&case.suggest(&Schema::default()), SuggestionKind::Rewrite)
        .into_iter()
        .cloned()
        .collect::<Vec<_>>();
    assert_eq!(rewrites.len(), 1);
    assert!(rewrites[0].detail.contains("as a range on created_at"));
}

#[test]
fn test_unguarded_delete_gets_where_hint() {
    let case = Case::new("DELETE FROM sessions");
    let suggestions = case.suggest(&Schema::default());

    assert_eq!(suggestions.len(), 1);
    assert_eq!(suggestions[0].kind, SuggestionKind::Rewrite);
    assert_eq!(
        suggestions[0].detail,
        "Add a WHERE clause restricting the rows this DELETE touches"
    );
}

#[test]
fn test_tautology_gets_index_and_rewrite() {
    let case = Case::new("UPDATE accounts SET locked = 1 WHERE tenant_id = 7 OR 1 = 1");
    let suggestions = case.suggest(&Schema::default());

    let index = of_kind(&suggestions, SuggestionKind::Index);
    assert_eq!(index.len(), 1);
    assert_eq!(index[0].columns, vec!["tenant_id"]);
    assert_eq!(index[0].reasons, vec!["where_tautology"]);
    assert!(of_kind(&suggestions, SuggestionKind::Rewrite)[0]
        .detail
        .contains("always-true condition"));
}

#[test]
fn test_full_scan_without_filters_suggests_rewrite() {
    let case = Case::new("SELECT id FROM users").with_plan(json!({
        "query_block": {"table": {"table_name": "users", "access_type": "ALL"}}
    }));
    let suggestions = case.suggest(&Schema::default());

    assert_eq!(suggestions.len(), 1);
    assert_eq!(suggestions[0].kind, SuggestionKind::Rewrite);
    assert!(suggestions[0].detail.starts_with("Full scan of users"));
    assert_eq!(suggestions[0].reasons, vec!["plan:full_scan"]);
}

#[test]
fn test_aliased_full_scan_resolves_to_base_table() {
    let case = Case::new("SELECT o.id FROM orders o WHERE o.user_id = 5").with_plan(json!({
        "query_block": {
            "table": {"table_name": "o", "access_type": "ALL", "rows_examined_per_scan": 40000}
        }
    }));
    let suggestions = case.suggest(&Schema::default());

    assert!(of_kind(&suggestions, SuggestionKind::Rewrite).is_empty());
    let index = of_kind(&suggestions, SuggestionKind::Index);
    assert_eq!(index.len(), 1);
    assert_eq!(index[0].table.as_deref(), Some("orders"));
    assert_eq!(index[0].columns, vec!["user_id"]);
    assert_eq!(index[0].reasons, vec!["no_index_used", "plan:full_scan"]);
}

#[test]
fn test_offset_pagination_gets_keyset_hint() {
    let case = Case::new("SELECT * FROM orders WHERE user_id = 7 ORDER BY id LIMIT 20 OFFSET 4000");
    let suggestions = case.suggest(&Schema::default());

    let keyset: Vec<_> = suggestions
        .iter()
        .filter(|s| s.reasons == vec!["shape:offset"])
        .collect();
    assert_eq!(keyset.len(), 1);
    assert_eq!(keyset[0].kind, SuggestionKind::Rewrite);
    assert!(keyset[0].detail.contains("keyset pagination"));
}

#[test]
fn test_or_chain_gets_in_list_hint() {
    let case = Case::new("SELECT * FROM users WHERE status = 'new' OR status = 'trial' OR status = 'grace'");
    let suggestions = case.suggest(&Schema::default());

    let hint = suggestions
        .iter()
        .find(|s| s.reasons == vec!["shape:or_chain"])
        .unwrap();
    assert_eq!(
        hint.detail,
        "Replace the OR chain on status with status IN ('new', 'trial', 'grace')"
    );
}

#[test]
fn test_short_or_chain_gets_no_hint() {
    let case = Case::new("SELECT * FROM users WHERE status = 'new' OR status = 'trial' OR plan = 'pro'");
    let suggestions = case.suggest(&Schema::default());
    assert!(!suggestions.is_empty());
    assert!(suggestions.iter().all(|s| s.reasons != vec!["shape:or_chain"]));
}

#[test]
fn test_structural_hints_alone_do_not_produce_suggestions() {
    let case = Case::new("SELECT id FROM orders WHERE status = 'a' OR status = 'b' OR status = 'c' LIMIT 10 OFFSET 50");
    assert!(case.shape.has_offset);
    assert_eq!(case.shape.or_chains.len(), 1);
    assert!(case.suggest(&Schema::default()).is_empty());
}

#[test]
fn test_findings_for_other_statements_are_ignored() {
    let other = Case::new("DELETE FROM sessions");
    let case = Case::new("SELECT id FROM users WHERE id = 1");
    assert!(case
        .suggest_with(&other.findings(), &Schema::default())
        .is_empty());
}

#[test]
fn test_suggestions_reference_their_statement() {
    let case = Case::new("SELECT * FROM users WHERE email LIKE '%x'");
    let suggestions = case.suggest(&Schema::default());
    assert!(!suggestions.is_empty());
    assert!(suggestions
        .iter()
        .all(|s| &s.statement_id == case.statement.id()));
}
