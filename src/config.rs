//! Policy configuration loading and validation.
//!
//! Configuration is resolved from the following sources (highest to lowest):
//!
//! 1. Command-line arguments (applied by the binary)
//! 2. Environment variables
//! 3. Policy file: an explicit path, else `sql-policy.yaml`, `sql-policy.yml`
//!    or `.sql-analyzer.toml` in the current directory
//! 4. Default values
//!
//! YAML and TOML are both accepted; the format follows the file extension.
//!
//! # Policy File Format
//!
//! ```yaml
//! dialect: mysql
//!
//! targets:
//!   include: ["**/*.py", "**/*.sql"]
//!   exclude: ["tests/**", "migrations/**"]
//!   call_names: [execute, executemany, text]
//!
//! rules:
//!   disabled: [long_in_list]
//!   max_in_list: 100
//!   severity:
//!     select_star: error
//!
//! dynamic:
//!   enabled: true
//!   max_in_flight: 4
//!   probe_timeout_ms: 5000
//!   run_deadline_ms: 60000
//!
//! baseline:
//!   path: .sqlqa/baseline.json
//!   regression_pct: 20
//!   regression_abs_ms: 50
//!
//! schema:
//!   files: [db/schema.sql]
//!   tables:
//!     users: [id, email, created_at]
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Description |
//! |----------|-------------|
//! | `SQLQA_DSN` | Database URL for plan and latency probes |
//! | `SQLQA_BASELINE` | Baseline file path |

use std::{
    collections::{BTreeMap, HashMap},
    env, fs,
    path::{Path, PathBuf}
};

use globset::Glob;
use serde::Deserialize;

use crate::{
    error::{AppResult, config_error, file_read_error, rule_config_error},
    rules::{DEFAULT_MAX_IN_LIST, Rule, parse_severity},
    shape::SqlDialect
};

/// Policy files looked up in the working directory, in order
pub const DISCOVERY_FILES: [&str; 3] = ["sql-policy.yaml", "sql-policy.yml", ".sql-analyzer.toml"];

/// Environment variable overriding the database URL
pub const ENV_DSN: &str = "SQLQA_DSN";
/// Environment variable overriding the baseline path
pub const ENV_BASELINE: &str = "SQLQA_BASELINE";

/// Fully resolved configuration
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub dialect:  SqlDialect,
    #[serde(default)]
    pub targets:  TargetsConfig,
    #[serde(default)]
    pub rules:    RulesConfig,
    #[serde(default)]
    pub dynamic:  DynamicConfig,
    #[serde(default)]
    pub baseline: BaselineConfig,
    #[serde(default)]
    pub schema:   SchemaConfig
}

/// Which files are scanned and which calls carry SQL
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TargetsConfig {
    #[serde(alias = "include_paths")]
    pub include:    Vec<String>,
    #[serde(alias = "exclude_paths")]
    pub exclude:    Vec<String>,
    pub call_names: Vec<String>
}

impl Default for TargetsConfig {
    fn default() -> Self {
        Self {
            include:    vec!["**/*.py".to_string(), "**/*.sql".to_string()],
            exclude:    vec!["tests/**".to_string(), "migrations/**".to_string()],
            call_names: crate::extract::DEFAULT_CALL_NAMES
                .iter()
                .map(|n| n.to_string())
                .collect()
        }
    }
}

/// Rules configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RulesConfig {
    /// Disabled rule IDs
    pub disabled:    Vec<String>,
    /// Severity overrides (rule_id -> severity)
    pub severity:    HashMap<String, String>,
    /// `long_in_list` threshold
    pub max_in_list: usize
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            disabled:    Vec::new(),
            severity:    HashMap::new(),
            max_in_list: DEFAULT_MAX_IN_LIST
        }
    }
}

/// Live database probing
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DynamicConfig {
    /// Probe when a database URL is available
    pub enabled:          bool,
    pub dsn:              Option<String>,
    pub max_in_flight:    usize,
    pub probe_timeout_ms: u64,
    /// Overall budget for the dynamic stage
    pub run_deadline_ms:  Option<u64>
}

impl Default for DynamicConfig {
    fn default() -> Self {
        Self {
            enabled:          true,
            dsn:              None,
            max_in_flight:    4,
            probe_timeout_ms: 5000,
            run_deadline_ms:  None
        }
    }
}

/// Baseline location and regression thresholds
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BaselineConfig {
    pub path:              PathBuf,
    /// Relative slowdown, in percent, that counts as a regression
    pub regression_pct:    f64,
    /// Absolute slowdown, in milliseconds, that counts as a regression
    pub regression_abs_ms: Option<f64>
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            path:              PathBuf::from(".sqlqa/baseline.json"),
            regression_pct:    20.0,
            regression_abs_ms: None
        }
    }
}

/// Table definitions used as suggestion context
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct SchemaConfig {
    /// DDL files, relative to the working directory
    pub files:  Vec<PathBuf>,
    /// Inline column lists
    pub tables: BTreeMap<String, Vec<String>>
}

impl Config {
    /// Load configuration from an explicit file or by discovery, apply
    /// environment overrides and validate
    pub fn load(explicit: Option<&Path>) -> AppResult<Self> {
        let mut config = match explicit {
            Some(path) => Self::from_path(path)?,
            None => match DISCOVERY_FILES.iter().map(Path::new).find(|p| p.exists()) {
                Some(path) => Self::from_path(path)?,
                None => Self::default()
            }
        };
        config.apply_env(|key| env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse a policy file, picking YAML or TOML from the extension
    pub fn from_path(path: &Path) -> AppResult<Self> {
        let display = path.display().to_string();
        let content = fs::read_to_string(path).map_err(|e| file_read_error(&display, e))?;
        let is_toml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
        if is_toml {
            Self::from_toml_str(&content)
        } else {
            Self::from_yaml_str(&content)
        }
    }

    pub fn from_yaml_str(content: &str) -> AppResult<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(|e| config_error(format!("Invalid policy file: {}", e)))
    }

    pub fn from_toml_str(content: &str) -> AppResult<Self> {
        toml::from_str(content).map_err(|e| config_error(format!("Invalid policy file: {}", e)))
    }

    /// Apply environment overrides through `lookup`
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dsn) = lookup(ENV_DSN).filter(|v| !v.is_empty()) {
            self.dynamic.dsn = Some(dsn);
        }
        if let Some(path) = lookup(ENV_BASELINE).filter(|v| !v.is_empty()) {
            self.baseline.path = PathBuf::from(path);
        }
    }

    /// Fail fast on invalid rule references and thresholds.
    ///
    /// Runs before any statement is processed.
    pub fn validate(&self) -> AppResult<()> {
        let known = |id: &str| Rule::IDS.iter().any(|known| known.eq_ignore_ascii_case(id));

        for id in &self.rules.disabled {
            if !known(id) {
                return Err(rule_config_error(format!(
                    "unknown rule id '{}' in rules.disabled (known: {})",
                    id,
                    Rule::IDS.join(", ")
                )));
            }
        }
        let mut overrides: Vec<_> = self.rules.severity.iter().collect();
        overrides.sort();
        for (id, severity) in overrides {
            if !known(id) {
                return Err(rule_config_error(format!(
                    "unknown rule id '{}' in rules.severity (known: {})",
                    id,
                    Rule::IDS.join(", ")
                )));
            }
            if parse_severity(severity).is_none() {
                return Err(rule_config_error(format!(
                    "invalid severity '{}' for rule '{}' (expected info, warning or error)",
                    severity, id
                )));
            }
        }
        if self.rules.max_in_list < 1 {
            return Err(rule_config_error("rules.max_in_list must be >= 1"));
        }

        let pct = self.baseline.regression_pct;
        if !pct.is_finite() || pct <= 0.0 {
            return Err(rule_config_error(format!(
                "baseline.regression_pct must be a positive number, got {}",
                pct
            )));
        }
        if let Some(abs) = self.baseline.regression_abs_ms
            && (!abs.is_finite() || abs <= 0.0)
        {
            return Err(rule_config_error(format!(
                "baseline.regression_abs_ms must be a positive number, got {}",
                abs
            )));
        }

        if self.dynamic.max_in_flight == 0 {
            return Err(rule_config_error("dynamic.max_in_flight must be >= 1"));
        }
        if self.dynamic.probe_timeout_ms == 0 {
            return Err(rule_config_error("dynamic.probe_timeout_ms must be >= 1"));
        }
        if self.dynamic.run_deadline_ms == Some(0) {
            return Err(rule_config_error("dynamic.run_deadline_ms must be >= 1"));
        }

        for pattern in self.targets.include.iter().chain(&self.targets.exclude) {
            Glob::new(pattern).map_err(|e| {
                config_error(format!("Invalid glob pattern '{}': {}", pattern, e))
            })?;
        }
        for name in &self.targets.call_names {
            let valid = name.chars().next().is_some_and(|c| c.is_alphabetic() || c == '_')
                && name.chars().all(|c| c.is_alphanumeric() || c == '_');
            if !valid {
                return Err(config_error(format!(
                    "Invalid call name '{}': expected an identifier",
                    name
                )));
            }
        }
        Ok(())
    }
}
