//! The `baseline save` command.

use std::sync::Arc;

use super::{
    helpers::{load_config, probe_spinner, scan_repo},
    types::{BaselineSaveParams, CommandOutput}
};
use crate::{
    baseline::{BaselineStore, JsonFileBaselineStore},
    dynamic::{DatabaseProbe, MySqlProbe},
    engine::Engine,
    error::{AppResult, config_error}
};

/// Probes every statement in the repository and replaces the baseline file.
///
/// # Errors
///
/// Fails without a database URL, when dynamic analysis is disabled by
/// policy, or when the baseline file cannot be written.
pub async fn run_baseline_save(params: BaselineSaveParams) -> AppResult<CommandOutput> {
    let config = load_config(params.policy.as_deref(), params.dsn, params.out)?;
    if !config.dynamic.enabled {
        return Err(config_error(
            "baseline save requires dynamic analysis, which the policy disables"
        ));
    }
    let dsn = config
        .dynamic
        .dsn
        .clone()
        .ok_or_else(|| config_error("baseline save requires a database URL (--dsn or SQLQA_DSN)"))?;
    let scanned = scan_repo(&params.repo, &config)?;
    for warning in &scanned.warnings {
        tracing::warn!(file = %warning.file, "{}", warning.message);
    }

    let store = JsonFileBaselineStore::new(config.baseline.path.clone());
    let location = store.describe();
    let mysql = Arc::new(MySqlProbe::connect(&dsn)?);
    let engine = Engine::new(config)?
        .with_probe(Arc::clone(&mysql) as Arc<dyn DatabaseProbe>)
        .with_baseline_store(Box::new(store));

    let spinner = probe_spinner("Measuring statements for the baseline...");
    let saved = engine.save_baseline(scanned.artifacts).await;
    spinner.finish_and_clear();

    drop(engine);
    if let Ok(probe) = Arc::try_unwrap(mysql)
        && let Err(e) = probe.disconnect().await
    {
        tracing::warn!(error = %e, "failed to close database connections");
    }

    let baseline = saved?;
    let measured = baseline
        .metrics
        .values()
        .filter(|m| m.duration_ms.is_some())
        .count();
    Ok(CommandOutput {
        exit_code: 0,
        stdout:    format!(
            "Saved baseline with {} statements ({} timed) to {}",
            baseline.len(),
            measured,
            location
        )
    })
}
