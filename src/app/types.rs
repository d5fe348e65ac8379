//! Parameter and result types for CLI commands.

use std::path::PathBuf;

use crate::cli::Format;

/// Exit code for configuration, I/O and other fatal errors, distinct from
/// the report's 0/1/2
pub const FATAL_EXIT_CODE: i32 = 3;

/// Parameters for the check command.
///
/// # Example
///
/// ```
/// use sql_quality_analyzer::{app::CheckParams, cli::Format};
///
/// let params = CheckParams {
///     policy:   None,
///     repo:     ".".into(),
///     dsn:      None,
///     baseline: None,
///     format:   Format::Json,
///     out:      None,
///     no_color: true,
///     verbose:  false
/// };
/// ```
#[derive(Debug, Clone)]
pub struct CheckParams {
    /// Explicit policy file; discovery is used when absent.
    pub policy:   Option<PathBuf>,
    /// Repository root to scan.
    pub repo:     PathBuf,
    /// Database URL, overriding policy and environment.
    pub dsn:      Option<String>,
    /// Baseline file, overriding policy and environment.
    pub baseline: Option<PathBuf>,
    pub format:   Format,
    /// Report destination; stdout when absent.
    pub out:      Option<PathBuf>,
    pub no_color: bool,
    pub verbose:  bool
}

/// Parameters for `baseline save`.
#[derive(Debug, Clone)]
pub struct BaselineSaveParams {
    pub policy: Option<PathBuf>,
    pub repo:   PathBuf,
    pub dsn:    Option<String>,
    /// Baseline file to write, overriding policy and environment.
    pub out:    Option<PathBuf>
}

/// Output from CLI command execution.
///
/// Represents the final output ready for display: the exit code and the
/// rendered text for stdout (empty when written to a file).
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Exit code for the process (0=pass, 1=warnings, 2=errors or regressions).
    pub exit_code: i32,
    pub stdout:    String
}
