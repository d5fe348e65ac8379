//! The `check` command.

use std::sync::Arc;

use super::{
    helpers::{create_output_options, load_config, probe_spinner, scan_repo, write_output},
    types::{CheckParams, CommandOutput}
};
use crate::{
    baseline::JsonFileBaselineStore,
    dynamic::{DatabaseProbe, MySqlProbe},
    engine::Engine,
    error::AppResult,
    output::format_report
};

/// Executes the complete check pipeline.
///
/// 1. **Configuration**: policy file, environment, then command-line overrides
/// 2. **Scan**: collects source artifacts under the repository root
/// 3. **Engine**: static rules, optional probes, suggestions and baseline
///    comparison
/// 4. **Render**: formats the report for stdout or `--out`
///
/// # Errors
///
/// Returns an error if the policy is invalid, a schema file cannot be
/// parsed, the database URL is malformed, the baseline is corrupt, or the
/// report cannot be written.
pub async fn run_check(params: CheckParams) -> AppResult<CommandOutput> {
    let config = load_config(params.policy.as_deref(), params.dsn, params.baseline)?;
    let scanned = scan_repo(&params.repo, &config)?;
    let output_opts = create_output_options(
        params.format,
        params.no_color,
        params.verbose,
        params.out.is_some()
    );

    let store = JsonFileBaselineStore::new(config.baseline.path.clone());
    let dsn = config.dynamic.dsn.clone().filter(|_| config.dynamic.enabled);
    let mysql = dsn.as_deref().map(MySqlProbe::connect).transpose()?.map(Arc::new);

    let mut engine = Engine::new(config)?.with_baseline_store(Box::new(store));
    if let Some(probe) = &mysql {
        engine = engine.with_probe(Arc::clone(probe) as Arc<dyn DatabaseProbe>);
    }

    let spinner = (mysql.is_some() && !output_opts.format.is_machine_readable())
        .then(|| probe_spinner("Probing statements against the database..."));
    let report = engine
        .check_with_warnings(scanned.artifacts, scanned.warnings)
        .await;
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    drop(engine);
    if let Some(probe) = mysql.and_then(|p| Arc::try_unwrap(p).ok())
        && let Err(e) = probe.disconnect().await
    {
        tracing::warn!(error = %e, "failed to close database connections");
    }

    let report = report?;
    let rendered = format_report(&report, &output_opts);
    let stdout = write_output(params.out.as_deref(), rendered)?;

    Ok(CommandOutput {
        exit_code: report.exit_code(),
        stdout
    })
}
