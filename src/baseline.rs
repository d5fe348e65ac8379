//! Baseline snapshots and regression detection.
//!
//! A [`Baseline`] maps statement identity to the [`Metric`] measured when it
//! was saved. Saves replace the whole file atomically; check runs only read
//! it.

mod compare;
mod store;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
pub use compare::{RegressionResult, RegressionStatus, Thresholds, compare};
use serde::{Deserialize, Serialize};
pub use store::{BaselineStore, JsonFileBaselineStore};

use crate::{
    dynamic::LatencySample,
    plan::Plan,
    statement::StatementId
};

/// Current on-disk format
pub const BASELINE_VERSION: u32 = 1;

/// Per-statement measurement kept in a baseline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub statement_id:           StatementId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms:            Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_shape_fingerprint: Option<String>
}

impl Metric {
    /// Build a metric from whatever the dynamic stage obtained
    pub fn from_probe(statement_id: StatementId, latency: Option<&LatencySample>, plan: Option<&Plan>) -> Self {
        Self {
            statement_id,
            duration_ms: latency.map(|l| l.duration_ms),
            plan_shape_fingerprint: plan.map(Plan::shape_fingerprint)
        }
    }
}

/// Persisted regression reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    pub version:    u32,
    pub created_at: DateTime<Utc>,
    pub metrics:    BTreeMap<StatementId, Metric>
}

impl Baseline {
    pub fn new(metrics: impl IntoIterator<Item = Metric>) -> Self {
        Self {
            version:    BASELINE_VERSION,
            created_at: Utc::now(),
            metrics:    metrics
                .into_iter()
                .map(|m| (m.statement_id.clone(), m))
                .collect()
        }
    }

    pub fn get(&self, id: &StatementId) -> Option<&Metric> {
        self.metrics.get(id)
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}
