use std::{collections::BTreeMap, fmt};

use serde::Serialize;

use super::{Baseline, Metric};
use crate::{config::BaselineConfig, plan::is_scan_shape, statement::StatementId};

/// When a slowdown counts as a regression. Either threshold is enough.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    /// Relative increase in percent
    pub pct:    f64,
    /// Absolute increase in milliseconds
    pub abs_ms: Option<f64>
}

impl Default for Thresholds {
    fn default() -> Self {
        Self::from(&BaselineConfig::default())
    }
}

impl From<&BaselineConfig> for Thresholds {
    fn from(config: &BaselineConfig) -> Self {
        Self {
            pct:    config.regression_pct,
            abs_ms: config.regression_abs_ms
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegressionStatus {
    Regression,
    Unchanged,
    /// Only in the current run
    New,
    /// Only in the baseline
    Removed
}

impl fmt::Display for RegressionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Regression => "regression",
            Self::Unchanged => "unchanged",
            Self::New => "new",
            Self::Removed => "removed"
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegressionResult {
    pub statement_id: StatementId,
    pub status:       RegressionStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub reasons:      Vec<String>,
    pub before:       Option<Metric>,
    pub after:        Option<Metric>
}

impl RegressionResult {
    pub fn is_regression(&self) -> bool {
        self.status == RegressionStatus::Regression
    }
}

/// Diff current metrics against a baseline, ordered by statement identity.
///
/// Never touches the baseline. Results do not depend on the order of
/// `current`.
pub fn compare(current: &[Metric], baseline: &Baseline, thresholds: &Thresholds) -> Vec<RegressionResult> {
    let current: BTreeMap<&StatementId, &Metric> =
        current.iter().map(|m| (&m.statement_id, m)).collect();
    let mut results = Vec::with_capacity(current.len().max(baseline.len()));

    for (id, after) in &current {
        let Some(before) = baseline.get(id) else {
            results.push(RegressionResult {
                statement_id: (*id).clone(),
                status:       RegressionStatus::New,
                reasons:      Vec::new(),
                before:       None,
                after:        Some((*after).clone())
            });
            continue;
        };
        let reasons = regression_reasons(before, after, thresholds);
        results.push(RegressionResult {
            statement_id: (*id).clone(),
            status:       if reasons.is_empty() {
                RegressionStatus::Unchanged
            } else {
                RegressionStatus::Regression
            },
            reasons,
            before:       Some(before.clone()),
            after:        Some((*after).clone())
        });
    }

    for (id, before) in &baseline.metrics {
        if !current.contains_key(id) {
            results.push(RegressionResult {
                statement_id: id.clone(),
                status:       RegressionStatus::Removed,
                reasons:      Vec::new(),
                before:       Some(before.clone()),
                after:        None
            });
        }
    }

    results.sort_by(|a, b| a.statement_id.cmp(&b.statement_id));
    results
}

fn regression_reasons(before: &Metric, after: &Metric, thresholds: &Thresholds) -> Vec<String> {
    let mut reasons = Vec::new();

    if let (Some(old), Some(new)) = (before.duration_ms, after.duration_ms)
        && new > old
    {
        let delta = new - old;
        let pct = if old > 0.0 { delta / old * 100.0 } else { f64::INFINITY };
        if pct > thresholds.pct {
            reasons.push(format!(
                "duration {:.2} ms -> {:.2} ms (+{:.1}%, threshold {}%)",
                old, new, pct, thresholds.pct
            ));
        } else if let Some(abs) = thresholds.abs_ms
            && delta > abs
        {
            reasons.push(format!(
                "duration {:.2} ms -> {:.2} ms (+{:.2} ms, threshold {} ms)",
                old, new, delta, abs
            ));
        }
    }

    if let (Some(old), Some(new)) = (&before.plan_shape_fingerprint, &after.plan_shape_fingerprint)
        && !is_scan_shape(old)
        && is_scan_shape(new)
    {
        reasons.push(format!("plan changed to a full scan: {} -> {}", old, new));
    }

    reasons
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metric(id: &str, ms: f64) -> Metric {
        Metric {
            statement_id:           StatementId::from(id),
            duration_ms:            Some(ms),
            plan_shape_fingerprint: None
        }
    }

    #[test]
    fn zero_baseline_duration_counts_as_relative_regression() {
        let reasons = regression_reasons(&metric("a", 0.0), &metric("a", 1.0), &Thresholds::default());
        assert_eq!(reasons.len(), 1);
    }

    #[test]
    fn absolute_threshold_catches_small_relative_change() {
        let thresholds = Thresholds {
            pct:    50.0,
            abs_ms: Some(10.0)
        };
        let reasons = regression_reasons(&metric("a", 100.0), &metric("a", 120.0), &thresholds);
        assert!(reasons[0].contains("+20.00 ms"));
    }

    #[test]
    fn faster_is_never_a_regression() {
        assert!(regression_reasons(&metric("a", 100.0), &metric("a", 10.0), &Thresholds::default()).is_empty());
    }
}
