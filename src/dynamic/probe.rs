use std::{fmt, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::statement::StatementId;

/// A live database handle able to explain and time statements.
///
/// Implementations receive only `SELECT` statements. They must not open
/// transactions or change data.
#[async_trait]
pub trait DatabaseProbe: Send + Sync {
    /// Machine-readable execution plan (`EXPLAIN FORMAT=JSON` or equivalent)
    async fn explain_plan(&self, sql: &str) -> Result<serde_json::Value, ProbeError>;

    /// Run the statement once and measure wall-clock time
    async fn probe_latency(&self, sql: &str, timeout: Duration) -> Result<Duration, ProbeError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeErrorKind {
    Connection,
    Timeout,
    Syntax,
    /// EXPLAIN output could not be understood
    Plan,
    /// Abandoned when the run deadline expired
    Cancelled,
    /// Bind placeholders left the statement without concrete values, so it
    /// was never sent
    Parameterized
}

impl fmt::Display for ProbeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Connection => "connection",
            Self::Timeout => "timeout",
            Self::Syntax => "syntax",
            Self::Plan => "plan",
            Self::Cancelled => "cancelled",
            Self::Parameterized => "parameterized statement"
        };
        f.write_str(label)
    }
}

/// Per-statement probe failure. Recorded as a diagnostic, never a finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeError {
    pub kind:         ProbeErrorKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statement_id: Option<StatementId>,
    pub message:      String
}

impl ProbeError {
    pub fn new(kind: ProbeErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            statement_id: None,
            message: message.into()
        }
    }

    pub fn for_statement(mut self, id: &StatementId) -> Self {
        self.statement_id = Some(id.clone());
        self
    }
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let suffix = if self.kind == ProbeErrorKind::Parameterized { "" } else { " error" };
        match &self.statement_id {
            Some(id) => write!(f, "{}{} for {}: {}", self.kind, suffix, id, self.message),
            None => write!(f, "{}{}: {}", self.kind, suffix, self.message)
        }
    }
}

impl std::error::Error for ProbeError {}

/// One single-shot latency measurement
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatencySample {
    pub statement_id: StatementId,
    pub duration_ms:  f64,
    pub timestamp:    DateTime<Utc>
}

impl LatencySample {
    pub fn new(statement_id: StatementId, duration: Duration) -> Self {
        Self {
            statement_id,
            duration_ms: duration.as_secs_f64() * 1000.0,
            timestamp: Utc::now()
        }
    }
}
