//! Helper functions for CLI operations.
//!
//! Logging setup, configuration with command-line overrides, output
//! options, the probe spinner and report writing.

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration
};

use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use crate::{
    cli::Format,
    config::Config,
    error::{AppResult, file_write_error},
    output::OutputOptions,
    scan::{ScanOutput, collect_artifacts}
};

/// Environment variable holding the log filter
pub const ENV_LOG: &str = "SQLQA_LOG";

/// Installs the stderr log subscriber.
///
/// `SQLQA_LOG` takes an `EnvFilter` directive; without it the level is
/// `warn`, or `debug` when `verbose` is set. Calling this twice is harmless.
pub fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(ENV_LOG).unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Loads the policy and applies command-line overrides on top of it.
///
/// # Errors
///
/// Returns an error if the policy file cannot be read or is invalid.
pub fn load_config(
    policy: Option<&Path>,
    dsn: Option<String>,
    baseline: Option<PathBuf>
) -> AppResult<Config> {
    let mut config = Config::load(policy)?;
    if let Some(dsn) = dsn.filter(|d| !d.is_empty()) {
        config.dynamic.dsn = Some(dsn);
    }
    if let Some(path) = baseline {
        config.baseline.path = path;
    }
    Ok(config)
}

/// Scans the repository root with the policy's targets.
pub fn scan_repo(repo: &Path, config: &Config) -> AppResult<ScanOutput> {
    collect_artifacts(repo, &config.targets)
}

/// Creates output options from CLI parameters.
///
/// Colors are only used for text written to a terminal stream, never for
/// files.
pub fn create_output_options(format: Format, no_color: bool, verbose: bool, to_file: bool) -> OutputOptions {
    OutputOptions {
        format: format.into(),
        colored: !no_color && !to_file,
        verbose
    }
}

/// Spinner on stderr while probes run
pub fn probe_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Writes the rendered report to `out`, or returns it for stdout.
pub fn write_output(out: Option<&Path>, rendered: String) -> AppResult<String> {
    match out {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .map_err(|e| file_write_error(&parent.display().to_string(), e))?;
            }
            fs::write(path, rendered)
                .map_err(|e| file_write_error(&path.display().to_string(), e))?;
            Ok(String::new())
        }
        None => Ok(rendered)
    }
}
