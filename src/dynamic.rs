//! Live plan and latency probes.
//!
//! A fixed number of workers drain a shared queue of `SELECT` statements.
//! Each probe runs under a per-statement timeout; failures degrade to "plan
//! unavailable" for that statement only. Results land in a concurrent map
//! keyed by statement identity, so completion order never matters. When
//! the optional run deadline expires the remaining work is abandoned and
//! recorded as cancelled.
//!
//! Write statements are never sent to the database.

mod mysql;
mod probe;

use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
    time::Duration
};

use dashmap::DashMap;
pub use mysql::MySqlProbe;
pub use probe::{DatabaseProbe, LatencySample, ProbeError, ProbeErrorKind};
use tokio::{sync::Mutex, task::JoinSet};

use crate::{
    config::DynamicConfig,
    plan::Plan,
    shape::has_placeholders,
    statement::{Statement, StatementId, StatementKind}
};

/// Limits for one dynamic run
#[derive(Debug, Clone, Copy)]
pub struct ProbeSettings {
    pub max_in_flight: usize,
    pub probe_timeout: Duration,
    pub run_deadline:  Option<Duration>
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self::from(&DynamicConfig::default())
    }
}

impl From<&DynamicConfig> for ProbeSettings {
    fn from(config: &DynamicConfig) -> Self {
        Self {
            max_in_flight: config.max_in_flight.max(1),
            probe_timeout: Duration::from_millis(config.probe_timeout_ms),
            run_deadline:  config.run_deadline_ms.map(Duration::from_millis)
        }
    }
}

/// What one statement's probe produced
#[derive(Debug, Clone, Default)]
struct ProbeOutcome {
    plan:    Option<Plan>,
    latency: Option<LatencySample>,
    errors:  Vec<ProbeError>
}

/// Merged results of a dynamic run
#[derive(Debug, Clone, Default)]
pub struct DynamicResults {
    plans:        HashMap<StatementId, Plan>,
    latencies:    HashMap<StatementId, LatencySample>,
    errors:       Vec<ProbeError>,
    probed:       usize,
    deadline_hit: bool
}

impl DynamicResults {
    pub fn plan(&self, id: &StatementId) -> Option<&Plan> {
        self.plans.get(id)
    }

    pub fn latency(&self, id: &StatementId) -> Option<&LatencySample> {
        self.latencies.get(id)
    }

    /// Probe failures ordered by statement identity
    pub fn errors(&self) -> &[ProbeError] {
        &self.errors
    }

    /// Number of statements submitted for probing
    pub fn probed(&self) -> usize {
        self.probed
    }

    pub fn plan_count(&self) -> usize {
        self.plans.len()
    }

    /// Whether the run deadline cut probing short
    pub fn deadline_hit(&self) -> bool {
        self.deadline_hit
    }
}

/// Bounded-concurrency prober over a supplied database handle
pub struct DynamicAnalyzer {
    probe:    Arc<dyn DatabaseProbe>,
    settings: ProbeSettings
}

impl DynamicAnalyzer {
    pub fn new(probe: Arc<dyn DatabaseProbe>, settings: ProbeSettings) -> Self {
        Self {
            probe,
            settings
        }
    }

    pub fn settings(&self) -> &ProbeSettings {
        &self.settings
    }

    /// Probe every `SELECT` in `statements`
    pub async fn run(&self, statements: &[Statement]) -> DynamicResults {
        let queue: VecDeque<Statement> = statements
            .iter()
            .filter(|s| s.kind() == StatementKind::Select)
            .cloned()
            .collect();
        let submitted: Vec<StatementId> = queue.iter().map(|s| s.id().clone()).collect();
        if queue.is_empty() {
            return DynamicResults::default();
        }

        let workers = self.settings.max_in_flight.min(queue.len());
        tracing::info!(statements = queue.len(), workers, "probing statements");

        let queue = Arc::new(Mutex::new(queue));
        let outcomes: Arc<DashMap<StatementId, ProbeOutcome>> = Arc::new(DashMap::new());
        let mut join_set = JoinSet::new();

        for _ in 0..workers {
            let queue = Arc::clone(&queue);
            let outcomes = Arc::clone(&outcomes);
            let probe = Arc::clone(&self.probe);
            let timeout = self.settings.probe_timeout;
            join_set.spawn(async move {
                loop {
                    let next = queue.lock().await.pop_front();
                    let Some(statement) = next else {
                        break;
                    };
                    let outcome = probe_statement(probe.as_ref(), &statement, timeout).await;
                    outcomes.insert(statement.id().clone(), outcome);
                }
            });
        }

        let mut deadline_hit = false;
        match self.settings.run_deadline {
            Some(deadline) => {
                if tokio::time::timeout(deadline, drain(&mut join_set)).await.is_err() {
                    tracing::warn!(
                        deadline_ms = deadline.as_millis() as u64,
                        "run deadline expired, abandoning in-flight probes"
                    );
                    join_set.shutdown().await;
                    deadline_hit = true;
                }
            }
            None => drain(&mut join_set).await
        }

        let mut results = DynamicResults {
            probed: submitted.len(),
            deadline_hit,
            ..DynamicResults::default()
        };
        for id in submitted {
            match outcomes.remove(&id) {
                Some((_, outcome)) => {
                    if let Some(plan) = outcome.plan {
                        results.plans.insert(id.clone(), plan);
                    }
                    if let Some(sample) = outcome.latency {
                        results.latencies.insert(id.clone(), sample);
                    }
                    results.errors.extend(outcome.errors);
                }
                None => results.errors.push(
                    ProbeError::new(
                        ProbeErrorKind::Cancelled,
                        "run deadline expired before the probe completed"
                    )
                    .for_statement(&id)
                )
            }
        }
        results
            .errors
            .sort_by(|a, b| a.statement_id.cmp(&b.statement_id).then_with(|| a.message.cmp(&b.message)));
        results
    }
}

async fn drain(join_set: &mut JoinSet<()>) {
    while let Some(joined) = join_set.join_next().await {
        if let Err(e) = joined {
            tracing::warn!(error = %e, "probe worker failed");
        }
    }
}

/// Explain, then time, one statement. Latency is skipped when the statement
/// could not even be explained because of the connection or its syntax.
/// Statements with bind placeholders are not sent at all.
async fn probe_statement(probe: &dyn DatabaseProbe, statement: &Statement, timeout: Duration) -> ProbeOutcome {
    let id = statement.id();
    let sql = statement.raw_text();
    let mut outcome = ProbeOutcome::default();

    if has_placeholders(statement.normalized_text()) {
        tracing::debug!(statement = %id, location = %statement.location(), "parameterized statement not sent");
        outcome.errors.push(
            ProbeError::new(
                ProbeErrorKind::Parameterized,
                "bind placeholders have no values outside the application; plan and latency skipped"
            )
            .for_statement(id)
        );
        return outcome;
    }

    let explained = tokio::time::timeout(timeout, probe.explain_plan(sql))
        .await
        .unwrap_or_else(|_| Err(timed_out(timeout)));
    let mut measure = true;
    match explained {
        Ok(raw) => match Plan::from_json(id.clone(), raw) {
            Ok(plan) => outcome.plan = Some(plan),
            Err(e) => outcome
                .errors
                .push(ProbeError::new(ProbeErrorKind::Plan, e.to_string()).for_statement(id))
        },
        Err(e) => {
            measure = e.kind == ProbeErrorKind::Plan;
            outcome.errors.push(e.for_statement(id));
        }
    }

    if measure {
        let measured = tokio::time::timeout(timeout, probe.probe_latency(sql, timeout))
            .await
            .unwrap_or_else(|_| Err(timed_out(timeout)));
        match measured {
            Ok(duration) => outcome.latency = Some(LatencySample::new(id.clone(), duration)),
            Err(e) => outcome.errors.push(e.for_statement(id))
        }
    }

    for error in &outcome.errors {
        tracing::warn!(statement = %id, location = %statement.location(), kind = %error.kind, "{}", error.message);
    }
    outcome
}

fn timed_out(timeout: Duration) -> ProbeError {
    ProbeError::new(
        ProbeErrorKind::Timeout,
        format!("no result after {} ms", timeout.as_millis())
    )
}
