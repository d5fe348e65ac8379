use std::{
    fs,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering}
    },
    time::Duration
};

use async_trait::async_trait;
use serde_json::json;
use sql_quality_analyzer::{
    baseline::{Baseline, BaselineStore, JsonFileBaselineStore, RegressionStatus},
    config::Config,
    dynamic::{DatabaseProbe, ProbeError, ProbeErrorKind},
    engine::Engine,
    error::AppResult,
    extract::{ExtractionWarning, SourceArtifact},
    report::{Decision, Diagnostic, Stage},
    suggest::SuggestionKind
};
use tempfile::TempDir;

/// Every statement scans `users`; latency is adjustable between runs
struct FakeProbe {
    latency_ms: AtomicU64
}

impl FakeProbe {
    fn new(latency_ms: u64) -> Arc<Self> {
        Arc::new(Self {
            latency_ms: AtomicU64::new(latency_ms)
        })
    }
}

#[async_trait]
impl DatabaseProbe for FakeProbe {
    async fn explain_plan(&self, _sql: &str) -> Result<serde_json::Value, ProbeError> {
        Ok(json!({
            "query_block": {
                "table": {"table_name": "users", "access_type": "ALL", "rows_examined_per_scan": 2000}
            }
        }))
    }

    async fn probe_latency(&self, _sql: &str, _timeout: Duration) -> Result<Duration, ProbeError> {
        Ok(Duration::from_millis(self.latency_ms.load(Ordering::SeqCst)))
    }
}

/// Never answers for `slow_table`; scans `users` for everything else
struct StallingProbe;

#[async_trait]
impl DatabaseProbe for StallingProbe {
    async fn explain_plan(&self, sql: &str) -> Result<serde_json::Value, ProbeError> {
        if sql.contains("slow_table") {
            tokio::time::sleep(Duration::from_secs(5)).await;
        }
        Ok(json!({
            "query_block": {
                "table": {"table_name": "users", "access_type": "ALL", "rows_examined_per_scan": 2000}
            }
        }))
    }

    async fn probe_latency(&self, _sql: &str, _timeout: Duration) -> Result<Duration, ProbeError> {
        Ok(Duration::from_millis(4))
    }
}

#[derive(Default, Clone)]
struct MemoryStore {
    saved: Arc<Mutex<Option<Baseline>>>
}

impl BaselineStore for MemoryStore {
    fn load(&self) -> AppResult<Option<Baseline>> {
        Ok(self.saved.lock().unwrap().clone())
    }

    fn save(&self, baseline: &Baseline) -> AppResult<()> {
        *self.saved.lock().unwrap() = Some(baseline.clone());
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

fn artifacts() -> Vec<SourceArtifact> {
    vec![
        SourceArtifact::new(
            "db/reports.sql",
            "SELECT * FROM users WHERE id = 1;\nDELETE FROM sessions;\n"
        ),
        SourceArtifact::new(
            "app/users.py",
            "def find(uid):\n    cursor.execute(\"SELECT email FROM users WHERE id = %s\", (uid,))\n    cursor.execute(query)\n"
        ),
    ]
}

fn clean_artifacts() -> Vec<SourceArtifact> {
    vec![SourceArtifact::new("db/q.sql", "SELECT id, email FROM users WHERE id = 1;")]
}

fn engine() -> Engine {
    Engine::new(Config::default()).unwrap()
}

#[tokio::test]
async fn test_static_only_run_records_skipped_stages() {
    let report = engine().check(artifacts()).await.unwrap();

    assert!(report.stage(Stage::Extraction).unwrap().ran);
    assert!(report.stage(Stage::StaticRules).unwrap().ran);
    assert!(report.stage(Stage::Suggestions).unwrap().ran);
    let dynamic = report.stage(Stage::Dynamic).unwrap();
    assert!(!dynamic.ran);
    assert_eq!(dynamic.detail, "no database connection supplied");
    let baseline = report.stage(Stage::Baseline).unwrap();
    assert!(!baseline.ran);
    assert_eq!(baseline.detail, "no baseline store configured");

    let stages: Vec<_> = report.stages.iter().map(|s| s.stage).collect();
    assert_eq!(
        stages,
        vec![Stage::Extraction, Stage::StaticRules, Stage::Dynamic, Stage::Suggestions, Stage::Baseline]
    );
}

#[tokio::test]
async fn test_errors_fail_the_run() {
    let report = engine().check(artifacts()).await.unwrap();

    assert_eq!(report.summary.statements, 3);
    assert_eq!(report.summary.errors, 1);
    assert_eq!(report.summary.warnings, 1);
    assert_eq!(report.decision(), Decision::Fail);
    assert_eq!(report.exit_code(), 2);
    assert_eq!(report.statements[0].findings[0].rule_id, "missing_where");
}

#[tokio::test]
async fn test_warnings_only_exit_one() {
    let report = engine()
        .check(vec![SourceArtifact::new("q.sql", "SELECT * FROM users WHERE id = 1;")])
        .await
        .unwrap();
    assert_eq!(report.decision(), Decision::Pass);
    assert_eq!(report.exit_code(), 1);
}

#[tokio::test]
async fn test_clean_repository_passes() {
    let report = engine().check(clean_artifacts()).await.unwrap();

    assert_eq!(report.decision(), Decision::Pass);
    assert_eq!(report.exit_code(), 0);
    assert!(report.statements.is_empty());
    assert_eq!(report.summary.statements, 1);
    assert_eq!(report.summary.findings(), 0);
}

#[tokio::test]
async fn test_skipped_candidates_become_diagnostics() {
    let report = engine().check(artifacts()).await.unwrap();
    let skipped: Vec<_> = report
        .diagnostics
        .iter()
        .filter(|d| matches!(d, Diagnostic::SkippedCandidate(_)))
        .collect();
    assert_eq!(skipped.len(), 1);
    assert_eq!(skipped[0].to_string(), "app/users.py:3: skipped execute(...): argument is not a string literal");
}

#[tokio::test]
async fn test_unparseable_statement_is_reported_and_others_continue() {
    let report = engine()
        .check(vec![SourceArtifact::new(
            "q.sql",
            "SELEC id FRM users;\nDELETE FROM sessions;"
        )])
        .await
        .unwrap();

    assert!(report
        .diagnostics
        .iter()
        .any(|d| matches!(d, Diagnostic::UnparseableStatement { location, .. } if location.line == 1)));
    assert_eq!(report.summary.errors, 1);
}

#[tokio::test]
async fn test_scan_warnings_come_first() {
    let warning = ExtractionWarning {
        file:    "bin/blob.py".into(),
        line:    None,
        message: "cannot read file: invalid UTF-8".to_string()
    };
    let report = engine()
        .check_with_warnings(
            vec![SourceArtifact::new("bad.sql", "SELECT 'open")],
            vec![warning.clone()]
        )
        .await
        .unwrap();

    assert_eq!(report.diagnostics.len(), 2);
    assert_eq!(report.diagnostics[0], Diagnostic::ExtractionWarning(warning));
    assert!(matches!(&report.diagnostics[1], Diagnostic::ExtractionWarning(w) if w.file == "bad.sql"));
}

#[tokio::test]
async fn test_duplicate_statements_are_analyzed_once() {
    let artifact = SourceArtifact::new("q.sql", "DELETE FROM sessions;");
    let report = engine()
        .check(vec![artifact.clone(), artifact])
        .await
        .unwrap();
    assert_eq!(report.summary.errors, 1);
}

#[tokio::test]
async fn test_repository_ddl_feeds_suggestions() {
    let report = engine()
        .check(vec![
            SourceArtifact::new("db/schema.sql", "CREATE TABLE users (id INT PRIMARY KEY, email VARCHAR(255));"),
            SourceArtifact::new("db/q.sql", "SELECT * FROM users WHERE id = 1;"),
        ])
        .await
        .unwrap();

    let rewrite = report
        .suggestions()
        .find(|s| s.kind == SuggestionKind::Rewrite)
        .unwrap();
    assert_eq!(rewrite.detail, "Replace * with explicit columns: id, email");
}

#[tokio::test]
async fn test_inline_schema_tables_from_config() {
    let mut config = Config::default();
    config
        .schema
        .tables
        .insert("users".to_string(), vec!["id".to_string(), "name".to_string()]);
    let report = Engine::new(config)
        .unwrap()
        .check(vec![SourceArtifact::new("q.sql", "SELECT * FROM users WHERE id = 1;")])
        .await
        .unwrap();
    assert!(report
        .suggestions()
        .any(|s| s.detail == "Replace * with explicit columns: id, name"));
}

#[tokio::test]
async fn test_invalid_rule_config_fails_before_processing() {
    let mut config = Config::default();
    config.rules.disabled.push("no_such_rule".to_string());
    let err = Engine::new(config).err().unwrap();
    assert!(err.to_string().contains("no_such_rule"));
}

#[tokio::test]
async fn test_missing_schema_file_is_fatal() {
    let mut config = Config::default();
    config.schema.files.push("/definitely/not/here.sql".into());
    assert!(Engine::new(config).is_err());
}

#[tokio::test]
async fn test_dynamic_stage_adds_plan_findings() {
    let report = engine()
        .with_probe(FakeProbe::new(5))
        .check(clean_artifacts())
        .await
        .unwrap();

    let dynamic = report.stage(Stage::Dynamic).unwrap();
    assert!(dynamic.ran);
    assert!(dynamic.detail.starts_with("plans for 1 of 1 SELECT statements"));

    let rules: Vec<_> = report.findings().map(|f| f.rule_id).collect();
    assert!(rules.contains(&"full_table_scan"));
    assert!(rules.contains(&"no_index_used"));

    let entry = &report.statements[0];
    assert_eq!(entry.plan_fingerprint.as_deref(), Some("users:full_scan"));
    assert!(entry.duration_ms.is_some());
    assert!(report
        .suggestions()
        .any(|s| s.kind == SuggestionKind::Index && s.table.as_deref() == Some("users")));
}

#[tokio::test]
async fn test_timed_out_statement_does_not_block_others() {
    let mut config = Config::default();
    config.dynamic.probe_timeout_ms = 100;
    let report = Engine::new(config)
        .unwrap()
        .with_probe(Arc::new(StallingProbe))
        .check(vec![SourceArtifact::new(
            "db/q.sql",
            "SELECT * FROM slow_table WHERE id = 1;\nSELECT id FROM users WHERE email = 'a@b.c';\n"
        )])
        .await
        .unwrap();

    let slow = report
        .statements
        .iter()
        .find(|s| s.sql.contains("slow_table"))
        .unwrap();
    let users = report
        .statements
        .iter()
        .find(|s| s.sql.contains("users"))
        .unwrap();

    let rules: Vec<_> = users.findings.iter().map(|f| f.rule_id).collect();
    assert!(rules.contains(&"full_table_scan"));
    assert!(rules.contains(&"no_index_used"));
    assert!(users
        .suggestions
        .iter()
        .any(|s| s.kind == SuggestionKind::Index && s.columns == vec!["email"]));
    assert!(users.duration_ms.is_some());

    assert_eq!(slow.findings.len(), 1);
    assert_eq!(slow.findings[0].rule_id, "select_star");
    assert!(slow.plan_fingerprint.is_none());
    assert!(report.diagnostics.iter().any(|d| matches!(
        d,
        Diagnostic::ProbeError(e)
            if e.kind == ProbeErrorKind::Timeout && e.statement_id.as_ref() == Some(&slow.statement_id)
    )));
}

#[tokio::test]
async fn test_parameterized_statement_is_labelled_not_explained() {
    let report = engine()
        .with_probe(FakeProbe::new(5))
        .check(vec![SourceArtifact::new(
            "app/users.py",
            "def find(uid):\n    cursor.execute(\"SELECT email FROM users WHERE id = %s\", (uid,))\n"
        )])
        .await
        .unwrap();

    let entry = &report.statements[0];
    assert!(entry.plan_fingerprint.is_none());
    let error = report
        .diagnostics
        .iter()
        .find_map(|d| match d {
            Diagnostic::ProbeError(e) => Some(e),
            _ => None
        })
        .unwrap();
    assert_eq!(error.kind, ProbeErrorKind::Parameterized);
    assert!(error.to_string().starts_with("parameterized statement for"));
}

#[tokio::test]
async fn test_dynamic_disabled_by_policy() {
    let mut config = Config::default();
    config.dynamic.enabled = false;
    let engine = Engine::new(config).unwrap().with_probe(FakeProbe::new(5));

    assert!(!engine.dynamic_available());
    let report = engine.check(clean_artifacts()).await.unwrap();
    let dynamic = report.stage(Stage::Dynamic).unwrap();
    assert!(!dynamic.ran);
    assert_eq!(dynamic.detail, "disabled by policy");
}

#[tokio::test]
async fn test_missing_baseline_is_a_notice() {
    let report = engine()
        .with_probe(FakeProbe::new(5))
        .with_baseline_store(Box::new(MemoryStore::default()))
        .check(clean_artifacts())
        .await
        .unwrap();

    assert!(report.diagnostics.iter().any(|d| matches!(
        d,
        Diagnostic::BaselineNotice { message } if message.contains("regression detection not performed")
    )));
    let baseline = report.stage(Stage::Baseline).unwrap();
    assert!(!baseline.ran);
    assert_eq!(baseline.detail, "no baseline found");
    assert_eq!(report.summary.regressions, 0);
}

#[tokio::test]
async fn test_baseline_needs_dynamic_results() {
    let store = MemoryStore::default();
    store.save(&Baseline::new(Vec::new())).unwrap();
    let report = engine()
        .with_baseline_store(Box::new(store))
        .check(clean_artifacts())
        .await
        .unwrap();

    let baseline = report.stage(Stage::Baseline).unwrap();
    assert!(!baseline.ran);
    assert!(baseline.detail.contains("requires dynamic analysis"));
}

#[tokio::test]
async fn test_save_then_check_unchanged() {
    let store = MemoryStore::default();
    let probe = FakeProbe::new(10);
    let engine = engine()
        .with_probe(probe.clone())
        .with_baseline_store(Box::new(store.clone()));

    let saved = engine.save_baseline(clean_artifacts()).await.unwrap();
    assert_eq!(saved.len(), 1);
    assert!(store.load().unwrap().is_some());

    let report = engine.check(clean_artifacts()).await.unwrap();
    assert!(report.stage(Stage::Baseline).unwrap().ran);
    assert_eq!(report.regressions.len(), 1);
    assert_eq!(report.regressions[0].status, RegressionStatus::Unchanged);
    assert_eq!(report.summary.regressions, 0);
}

#[tokio::test]
async fn test_slower_run_is_a_regression() {
    let store = MemoryStore::default();
    let probe = FakeProbe::new(10);
    let engine = engine()
        .with_probe(probe.clone())
        .with_baseline_store(Box::new(store));

    engine.save_baseline(clean_artifacts()).await.unwrap();
    probe.latency_ms.store(50, Ordering::SeqCst);
    let report = engine.check(clean_artifacts()).await.unwrap();

    assert_eq!(report.summary.regressions, 1);
    assert_eq!(report.decision(), Decision::Fail);
    assert_eq!(report.exit_code(), 2);
}

#[tokio::test]
async fn test_new_statement_is_not_a_regression() {
    let store = MemoryStore::default();
    store.save(&Baseline::new(Vec::new())).unwrap();
    let report = engine()
        .with_probe(FakeProbe::new(10))
        .with_baseline_store(Box::new(store))
        .check(clean_artifacts())
        .await
        .unwrap();

    assert_eq!(report.regressions[0].status, RegressionStatus::New);
    assert_eq!(report.summary.regressions, 0);
}

#[tokio::test]
async fn test_corrupt_baseline_is_fatal() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("baseline.json");
    fs::write(&path, "[]").unwrap();

    let result = engine()
        .with_probe(FakeProbe::new(10))
        .with_baseline_store(Box::new(JsonFileBaselineStore::new(path)))
        .check(clean_artifacts())
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_save_baseline_requires_probe() {
    let err = engine()
        .with_baseline_store(Box::new(MemoryStore::default()))
        .save_baseline(clean_artifacts())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("requires dynamic analysis"));
}

#[tokio::test]
async fn test_save_baseline_skips_write_statements() {
    let store = MemoryStore::default();
    let saved = engine()
        .with_probe(FakeProbe::new(1))
        .with_baseline_store(Box::new(store))
        .save_baseline(artifacts())
        .await
        .unwrap();
    assert_eq!(saved.len(), 2);
    let measured = saved
        .metrics
        .values()
        .filter(|m| m.duration_ms.is_some())
        .count();
    assert_eq!(measured, 1);
}
