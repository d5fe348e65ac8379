use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering}
    },
    time::Duration
};

use async_trait::async_trait;
use serde_json::json;
use sql_quality_analyzer::{
    dynamic::{DatabaseProbe, DynamicAnalyzer, ProbeError, ProbeErrorKind, ProbeSettings},
    statement::{SourceLocation, Statement}
};

/// Scripted database: behavior is chosen by markers in the SQL text
#[derive(Default)]
struct FakeProbe {
    explained: Mutex<Vec<String>>,
    timed:     Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    peak:      AtomicUsize,
    delay:     Duration
}

impl FakeProbe {
    fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    fn explained(&self) -> Vec<String> {
        self.explained.lock().unwrap().clone()
    }

    fn timed(&self) -> Vec<String> {
        self.timed.lock().unwrap().clone()
    }
}

#[async_trait]
impl DatabaseProbe for FakeProbe {
    async fn explain_plan(&self, sql: &str) -> Result<serde_json::Value, ProbeError> {
        self.explained.lock().unwrap().push(sql.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if sql.contains("slow_table") {
            tokio::time::sleep(Duration::from_secs(5)).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if sql.contains("broken") {
            return Err(ProbeError::new(ProbeErrorKind::Syntax, "You have an error in your SQL syntax"));
        }
        if sql.contains("odd_table") {
            return Ok(json!({"unexpected": true}));
        }
        Ok(json!({
            "query_block": {
                "table": {"table_name": "users", "access_type": "ALL", "rows_examined_per_scan": 10}
            }
        }))
    }

    async fn probe_latency(&self, sql: &str, _timeout: Duration) -> Result<Duration, ProbeError> {
        self.timed.lock().unwrap().push(sql.to_string());
        Ok(Duration::from_millis(3))
    }
}

fn statement(sql: &str, line: usize) -> Statement {
    Statement::new(sql, SourceLocation::new("app/queries.sql", line))
}

fn settings(max_in_flight: usize, timeout_ms: u64, deadline_ms: Option<u64>) -> ProbeSettings {
    ProbeSettings {
        max_in_flight,
        probe_timeout: Duration::from_millis(timeout_ms),
        run_deadline: deadline_ms.map(Duration::from_millis)
    }
}

#[tokio::test]
async fn test_plans_and_latencies_for_every_select() {
    let probe = Arc::new(FakeProbe::default());
    let statements = vec![
        statement("SELECT id FROM users WHERE id = 1", 1),
        statement("SELECT email FROM users WHERE id = 2", 2),
    ];
    let analyzer = DynamicAnalyzer::new(probe.clone(), settings(4, 1000, None));
    let results = analyzer.run(&statements).await;

    assert_eq!(results.probed(), 2);
    assert_eq!(results.plan_count(), 2);
    assert!(results.errors().is_empty());
    for stmt in &statements {
        let plan = results.plan(stmt.id()).unwrap();
        assert!(plan.full_scan);
        assert_eq!(&plan.statement_id, stmt.id());
        let latency = results.latency(stmt.id()).unwrap();
        assert!((latency.duration_ms - 3.0).abs() < 1e-6);
    }
}

#[tokio::test]
async fn test_write_statements_are_never_probed() {
    let probe = Arc::new(FakeProbe::default());
    let statements = vec![
        statement("DELETE FROM sessions", 1),
        statement("UPDATE users SET active = 0 WHERE id = 1", 2),
        statement("INSERT INTO audit (id) VALUES (1)", 3),
        statement("SELECT id FROM users", 4),
    ];
    let results = DynamicAnalyzer::new(probe.clone(), settings(2, 1000, None))
        .run(&statements)
        .await;

    assert_eq!(results.probed(), 1);
    assert_eq!(probe.explained(), vec!["SELECT id FROM users"]);
    assert_eq!(probe.timed(), vec!["SELECT id FROM users"]);
}

#[tokio::test]
async fn test_writes_behind_with_or_batches_are_never_sent() {
    let probe = Arc::new(FakeProbe::default());
    let statements = vec![
        statement("WITH old AS (SELECT id FROM sessions WHERE expired = 1) DELETE FROM sessions", 1),
        statement("WITH s AS (SELECT id FROM staging) UPDATE users SET active = 0", 2),
        statement("SELECT 1; DELETE FROM t", 3),
        statement("WITH recent AS (SELECT id FROM users) SELECT id FROM recent", 4),
    ];
    let results = DynamicAnalyzer::new(probe.clone(), settings(2, 1000, None))
        .run(&statements)
        .await;

    assert_eq!(results.probed(), 1);
    assert_eq!(probe.explained(), vec!["WITH recent AS (SELECT id FROM users) SELECT id FROM recent"]);
    assert_eq!(probe.timed(), probe.explained());
}

#[tokio::test]
async fn test_timeout_degrades_only_that_statement() {
    let probe = Arc::new(FakeProbe::default());
    let slow = statement("SELECT id FROM slow_table", 1);
    let fast = statement("SELECT id FROM users", 2);
    let results = DynamicAnalyzer::new(probe.clone(), settings(2, 100, None))
        .run(&[slow.clone(), fast.clone()])
        .await;

    assert!(results.plan(slow.id()).is_none());
    assert!(results.latency(slow.id()).is_none());
    assert!(results.plan(fast.id()).is_some());
    assert!(results.latency(fast.id()).is_some());

    assert_eq!(results.errors().len(), 1);
    let error = &results.errors()[0];
    assert_eq!(error.kind, ProbeErrorKind::Timeout);
    assert_eq!(error.statement_id.as_ref(), Some(slow.id()));
    assert!(!results.deadline_hit());
}

#[tokio::test]
async fn test_syntax_error_skips_latency() {
    let probe = Arc::new(FakeProbe::default());
    let broken = statement("SELECT id FROM broken", 1);
    let results = DynamicAnalyzer::new(probe.clone(), settings(1, 1000, None))
        .run(std::slice::from_ref(&broken))
        .await;

    assert_eq!(results.errors()[0].kind, ProbeErrorKind::Syntax);
    assert!(results.latency(broken.id()).is_none());
    assert!(probe.timed().is_empty());
}

#[tokio::test]
async fn test_unrecognized_plan_still_measures_latency() {
    let probe = Arc::new(FakeProbe::default());
    let odd = statement("SELECT id FROM odd_table", 1);
    let results = DynamicAnalyzer::new(probe.clone(), settings(1, 1000, None))
        .run(std::slice::from_ref(&odd))
        .await;

    assert!(results.plan(odd.id()).is_none());
    assert!(results.latency(odd.id()).is_some());
    assert_eq!(results.errors().len(), 1);
    assert_eq!(results.errors()[0].kind, ProbeErrorKind::Plan);
}

#[tokio::test]
async fn test_in_flight_probes_are_bounded() {
    let probe = Arc::new(FakeProbe::with_delay(Duration::from_millis(20)));
    let statements: Vec<_> = (1..=8)
        .map(|i| statement(&format!("SELECT id FROM users WHERE id = {}", i), i))
        .collect();
    let results = DynamicAnalyzer::new(probe.clone(), settings(3, 1000, None))
        .run(&statements)
        .await;

    assert_eq!(results.plan_count(), 8);
    let peak = probe.peak.load(Ordering::SeqCst);
    assert!(peak >= 1);
    assert!(peak <= 3, "peak in-flight probes was {}", peak);
}

#[tokio::test]
async fn test_run_deadline_cancels_remaining_work() {
    let probe = Arc::new(FakeProbe::default());
    let statements = vec![
        statement("SELECT id FROM slow_table WHERE id = 1", 1),
        statement("SELECT id FROM slow_table WHERE id = 2", 2),
    ];
    let results = DynamicAnalyzer::new(probe.clone(), settings(2, 10_000, Some(100)))
        .run(&statements)
        .await;

    assert!(results.deadline_hit());
    assert_eq!(results.plan_count(), 0);
    assert_eq!(results.errors().len(), 2);
    assert!(results
        .errors()
        .iter()
        .all(|e| e.kind == ProbeErrorKind::Cancelled && e.statement_id.is_some()));
}

#[tokio::test]
async fn test_errors_ordered_by_statement() {
    let probe = Arc::new(FakeProbe::default());
    let statements: Vec<_> = (1..=5)
        .map(|i| statement(&format!("SELECT id FROM broken WHERE id = {}", i), i))
        .collect();
    let results = DynamicAnalyzer::new(probe.clone(), settings(5, 1000, None))
        .run(&statements)
        .await;

    let ids: Vec<_> = results
        .errors()
        .iter()
        .filter_map(|e| e.statement_id.clone())
        .collect();
    let mut sorted = ids.clone();
    sorted.sort();
    assert_eq!(ids.len(), 5);
    assert_eq!(ids, sorted);
}

#[tokio::test]
async fn test_empty_input() {
    let probe = Arc::new(FakeProbe::default());
    let results = DynamicAnalyzer::new(probe, ProbeSettings::default())
        .run(&[])
        .await;
    assert_eq!(results.probed(), 0);
    assert!(results.errors().is_empty());
}
