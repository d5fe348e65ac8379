use std::time::{Duration, Instant};

use async_trait::async_trait;
use mysql_async::{Opts, Pool, prelude::Queryable};

use super::probe::{DatabaseProbe, ProbeError, ProbeErrorKind};
use crate::error::{AppResult, connection_error};

/// [`DatabaseProbe`] backed by a `mysql_async` connection pool
pub struct MySqlProbe {
    pool: Pool
}

impl MySqlProbe {
    /// Build a pool from a `mysql://` URL. Connections are opened lazily.
    pub fn connect(dsn: &str) -> AppResult<Self> {
        let opts = Opts::from_url(dsn)
            .map_err(|e| connection_error(format!("Invalid database URL: {}", e)))?;
        Ok(Self {
            pool: Pool::new(opts)
        })
    }

    /// Close every pooled connection
    pub async fn disconnect(self) -> AppResult<()> {
        self.pool
            .disconnect()
            .await
            .map_err(|e| connection_error(format!("Failed to close connection pool: {}", e)))
    }
}

#[async_trait]
impl DatabaseProbe for MySqlProbe {
    async fn explain_plan(&self, sql: &str) -> Result<serde_json::Value, ProbeError> {
        let mut conn = self.pool.get_conn().await.map_err(classify)?;
        let output: Option<String> = conn
            .query_first(format!("EXPLAIN FORMAT=JSON {}", sql))
            .await
            .map_err(classify)?;
        let output =
            output.ok_or_else(|| ProbeError::new(ProbeErrorKind::Plan, "EXPLAIN returned no rows"))?;
        serde_json::from_str(&output).map_err(|e| ProbeError::new(ProbeErrorKind::Plan, e.to_string()))
    }

    async fn probe_latency(&self, sql: &str, timeout: Duration) -> Result<Duration, ProbeError> {
        let mut conn = self.pool.get_conn().await.map_err(classify)?;
        let started = Instant::now();
        tokio::time::timeout(timeout, conn.query_drop(sql))
            .await
            .map_err(|_| {
                ProbeError::new(
                    ProbeErrorKind::Timeout,
                    format!("no result after {} ms", timeout.as_millis())
                )
            })?
            .map_err(classify)?;
        Ok(started.elapsed())
    }
}

/// Server-side errors mean the statement was rejected; everything else is
/// treated as a connection problem
fn classify(err: mysql_async::Error) -> ProbeError {
    match err {
        mysql_async::Error::Server(e) => ProbeError::new(ProbeErrorKind::Syntax, e.to_string()),
        other => ProbeError::new(ProbeErrorKind::Connection, other.to_string())
    }
}
