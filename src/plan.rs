//! Execution plans parsed from machine-readable EXPLAIN output.
//!
//! Two formats are understood and detected automatically:
//!
//! - MySQL `EXPLAIN FORMAT=JSON`: root object with `query_block`; table
//!   accesses under `table`, `nested_loop`, `ordering_operation`,
//!   `grouping_operation` and friends
//! - PostgreSQL `EXPLAIN (FORMAT JSON)`: array whose first element holds
//!   `Plan`, a tree of nodes with `Node Type` and child `Plans`
//!
//! # Example
//!
//! ```
//! use sql_quality_analyzer::{plan::Plan, statement::StatementId};
//!
//! let raw = serde_json::json!({
//!     "query_block": {
//!         "table": {
//!             "table_name": "users",
//!             "access_type": "ALL",
//!             "rows_examined_per_scan": 1000
//!         }
//!     }
//! });
//!
//! let plan = Plan::from_json(StatementId::from("abc"), raw).unwrap();
//! assert!(plan.full_scan);
//! assert!(!plan.uses_index);
//! assert_eq!(plan.shape_fingerprint(), "users:full_scan");
//! ```

mod mysql;
mod postgres;

use std::fmt;

use compact_str::CompactString;
use serde::Serialize;

use crate::statement::StatementId;

/// How a table is read
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessKind {
    /// Every row is read (`ALL`, `Seq Scan`)
    FullScan,
    /// The whole index is read
    IndexScan,
    /// Index lookup or range
    IndexLookup,
    Other
}

impl AccessKind {
    fn label(&self) -> &'static str {
        match self {
            Self::FullScan => "full_scan",
            Self::IndexScan => "index_scan",
            Self::IndexLookup => "index",
            Self::Other => "other"
        }
    }
}

/// One table access in a plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableAccess {
    pub table:  CompactString,
    pub access: AccessKind,
    pub key:    Option<CompactString>,
    pub rows:   Option<u64>
}

impl TableAccess {
    fn fingerprint(&self) -> String {
        match &self.key {
            Some(key) if self.access != AccessKind::FullScan => {
                format!("{}:{}({})", self.table, self.access.label(), key)
            }
            _ => format!("{}:{}", self.table, self.access.label())
        }
    }
}

/// Parsed execution plan for one statement
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Plan {
    pub statement_id:    StatementId,
    pub raw_plan:        serde_json::Value,
    pub estimated_rows:  Option<u64>,
    pub uses_index:      bool,
    pub full_scan:       bool,
    /// First index the plan chose
    pub chosen_key:      Option<CompactString>,
    pub using_filesort:  bool,
    pub using_temporary: bool,
    pub accesses:        Vec<TableAccess>
}

/// EXPLAIN output in neither known format
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanParseError(pub String);

impl fmt::Display for PlanParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unrecognized execution plan: {}", self.0)
    }
}

impl std::error::Error for PlanParseError {}

/// Facts gathered while walking either plan format
#[derive(Debug, Default)]
pub(crate) struct PlanFacts {
    pub accesses:        Vec<TableAccess>,
    pub estimated_rows:  Option<u64>,
    pub using_filesort:  bool,
    pub using_temporary: bool
}

impl Plan {
    /// Parse EXPLAIN JSON, detecting the format
    pub fn from_json(statement_id: StatementId, raw_plan: serde_json::Value) -> Result<Self, PlanParseError> {
        let facts = if let Some(block) = raw_plan.get("query_block") {
            mysql::collect(block)
        } else if let Some(root) = postgres::root(&raw_plan) {
            postgres::collect(root)
        } else {
            return Err(PlanParseError(
                "expected a MySQL query_block or a PostgreSQL Plan".to_string()
            ));
        };
        Ok(Self::from_facts(statement_id, raw_plan, facts))
    }

    /// Parse EXPLAIN output text
    pub fn from_str_output(statement_id: StatementId, output: &str) -> Result<Self, PlanParseError> {
        let raw: serde_json::Value =
            serde_json::from_str(output.trim()).map_err(|e| PlanParseError(e.to_string()))?;
        Self::from_json(statement_id, raw)
    }

    fn from_facts(statement_id: StatementId, raw_plan: serde_json::Value, facts: PlanFacts) -> Self {
        let full_scan = facts.accesses.iter().any(|a| a.access == AccessKind::FullScan);
        let chosen_key = facts.accesses.iter().find_map(|a| a.key.clone());
        let estimated_rows = facts.estimated_rows.or_else(|| {
            let rows: Vec<u64> = facts.accesses.iter().filter_map(|a| a.rows).collect();
            (!rows.is_empty()).then(|| rows.iter().sum())
        });
        Self {
            statement_id,
            raw_plan,
            estimated_rows,
            uses_index: chosen_key.is_some(),
            full_scan,
            chosen_key,
            using_filesort: facts.using_filesort,
            using_temporary: facts.using_temporary,
            accesses: facts.accesses
        }
    }

    /// Compact description of how tables are accessed, in plan order.
    ///
    /// `users:full_scan,orders:index(idx_user)`; empty when the plan reads
    /// no tables.
    pub fn shape_fingerprint(&self) -> String {
        self.accesses
            .iter()
            .map(TableAccess::fingerprint)
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Tables read with a full scan, deduplicated in plan order
    pub fn scanned_tables(&self) -> Vec<&str> {
        let mut tables: Vec<&str> = Vec::new();
        for access in self.accesses.iter().filter(|a| a.access == AccessKind::FullScan) {
            if !tables.contains(&access.table.as_str()) {
                tables.push(access.table.as_str());
            }
        }
        tables
    }
}

/// Whether a plan shape fingerprint contains a full scan
pub fn is_scan_shape(fingerprint: &str) -> bool {
    fingerprint
        .split(',')
        .any(|entry| entry.ends_with(":full_scan"))
}

/// Numbers in EXPLAIN output may be JSON numbers or strings
pub(crate) fn as_u64(value: &serde_json::Value) -> Option<u64> {
    value
        .as_u64()
        .or_else(|| value.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64))
        .or_else(|| value.as_str().and_then(|s| s.trim().parse::<f64>().ok()).map(|f| f.round() as u64))
}
