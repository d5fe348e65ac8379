//! Run orchestration.
//!
//! [`Engine`] sequences extraction, static rules, the optional dynamic
//! stage, suggestions and the optional baseline comparison into one
//! [`Report`]. It holds no business logic of its own: every decision is
//! delegated to the stage modules, and whether the dynamic and baseline
//! stages run depends only on configuration and on what the caller
//! supplied.

use std::{collections::HashSet, fs, sync::Arc};

use rayon::prelude::*;

use crate::{
    baseline::{Baseline, BaselineStore, Metric, Thresholds, compare},
    cache::ShapeCache,
    config::Config,
    dynamic::{DatabaseProbe, DynamicAnalyzer, DynamicResults, ProbeSettings},
    error::{AppResult, config_error, file_read_error, schema_parse_error},
    extract::{ExtractionOutput, ExtractionWarning, Extractor, SourceArtifact},
    report::{Diagnostic, Report, ReportBuilder, Stage, StatementReport},
    rules::RuleRunner,
    schema::Schema,
    shape::StatementShape,
    statement::{Statement, StatementKind},
    suggest::suggest
};

/// Statements that parsed, paired with their shapes
struct Analyzed {
    statement: Statement,
    shape:     StatementShape
}

/// Extraction and parsing results shared by `check` and `save_baseline`
struct Prepared {
    extraction:  ExtractionOutput,
    analyzed:    Vec<Analyzed>,
    unparseable: Vec<Diagnostic>,
    schema:      Schema,
    artifacts:   usize
}

pub struct Engine {
    config: Config,
    runner: RuleRunner,
    cache:  ShapeCache,
    schema: Schema,
    probe:  Option<Arc<dyn DatabaseProbe>>,
    store:  Option<Box<dyn BaselineStore + Send + Sync>>
}

impl Engine {
    /// Validate configuration and load schema context.
    ///
    /// # Errors
    ///
    /// Fails before any statement is processed when the configuration
    /// references unknown rules or invalid thresholds, or when a schema file
    /// cannot be read or parsed.
    pub fn new(config: Config) -> AppResult<Self> {
        config.validate()?;

        let mut schema = Schema::default();
        for path in &config.schema.files {
            let display = path.display().to_string();
            let ddl = fs::read_to_string(path).map_err(|e| file_read_error(&display, e))?;
            schema
                .absorb(&ddl, config.dialect)
                .map_err(|e| schema_parse_error(format!("{}: {}", display, e)))?;
        }
        for (table, columns) in &config.schema.tables {
            schema.add_table(table, columns);
        }

        Ok(Self {
            runner: RuleRunner::with_config(&config.rules),
            cache: ShapeCache::new(config.dialect, 4096),
            schema,
            probe: None,
            store: None,
            config
        })
    }

    /// Use a live database for plans and latencies
    pub fn with_probe(mut self, probe: Arc<dyn DatabaseProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Compare against (or save to) this baseline store
    pub fn with_baseline_store(mut self, store: Box<dyn BaselineStore + Send + Sync>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Whether a dynamic stage would run
    pub fn dynamic_available(&self) -> bool {
        self.config.dynamic.enabled && self.probe.is_some()
    }

    /// Run every applicable stage and assemble the report.
    ///
    /// Only a corrupt or unreadable baseline is fatal here; a missing one
    /// is recorded as a notice.
    pub async fn check(&self, artifacts: Vec<SourceArtifact>) -> AppResult<Report> {
        self.check_with_warnings(artifacts, Vec::new()).await
    }

    /// [`Engine::check`] with problems found while collecting artifacts,
    /// such as unreadable files, reported alongside extraction warnings
    pub async fn check_with_warnings(
        &self,
        artifacts: Vec<SourceArtifact>,
        scan_warnings: Vec<ExtractionWarning>
    ) -> AppResult<Report> {
        let mut builder = ReportBuilder::new();
        builder.diagnostics(scan_warnings.into_iter().map(Diagnostic::ExtractionWarning));

        let baseline = match &self.store {
            Some(store) => {
                let loaded = store.load()?;
                if loaded.is_none() {
                    builder.diagnostic(Diagnostic::BaselineNotice {
                        message: format!(
                            "no baseline at {}; regression detection not performed",
                            store.describe()
                        )
                    });
                }
                loaded
            }
            None => None
        };

        let prepared = self.prepare(artifacts);
        builder.stage_ran(
            Stage::Extraction,
            format!(
                "{} statements from {} artifacts",
                prepared.extraction.statements.len(),
                prepared.artifacts
            )
        );
        builder.statements_seen(prepared.extraction.statements.len());

        let dynamic = self.run_dynamic(&prepared, &mut builder).await;

        let reports: Vec<StatementReport> = prepared
            .analyzed
            .par_iter()
            .map(|item| {
                let plan = dynamic.as_ref().and_then(|d| d.plan(item.statement.id()));
                let findings = self.runner.evaluate(&item.statement, &item.shape, plan);
                let suggestions = suggest(&item.statement, &item.shape, &findings, plan, &prepared.schema);
                let mut entry = StatementReport::new(&item.statement);
                entry.findings = findings;
                entry.suggestions = suggestions;
                if let Some(d) = &dynamic {
                    entry.duration_ms = d.latency(item.statement.id()).map(|l| l.duration_ms);
                    entry.plan_fingerprint = plan.map(|p| p.shape_fingerprint());
                }
                entry
            })
            .collect();

        let finding_count: usize = reports.iter().map(|r| r.findings.len()).sum();
        let suggestion_count: usize = reports.iter().map(|r| r.suggestions.len()).sum();
        builder.stage_ran(
            Stage::StaticRules,
            format!(
                "{} rules over {} statements, {} findings",
                self.runner.rules().len(),
                prepared.analyzed.len(),
                finding_count
            )
        );
        builder.stage_ran(Stage::Suggestions, format!("{} suggestions", suggestion_count));
        tracing::info!(findings = finding_count, suggestions = suggestion_count, "static analysis complete");
        for entry in reports {
            builder.statement(entry);
        }

        match (&self.store, baseline, &dynamic) {
            (None, _, _) => {
                builder.stage_skipped(Stage::Baseline, "no baseline store configured");
            }
            (Some(_), None, _) => {
                builder.stage_skipped(Stage::Baseline, "no baseline found");
            }
            (Some(_), Some(_), None) => {
                builder.stage_skipped(
                    Stage::Baseline,
                    "requires dynamic analysis for durations and plan shapes"
                );
            }
            (Some(_), Some(baseline), Some(results)) => {
                let metrics = self.metrics(&prepared, results);
                let thresholds = Thresholds::from(&self.config.baseline);
                let compared = compare(&metrics, &baseline, &thresholds);
                let regressions = compared.iter().filter(|r| r.is_regression()).count();
                builder.stage_ran(
                    Stage::Baseline,
                    format!(
                        "{} statements compared, {} regressions",
                        compared.len(),
                        regressions
                    )
                );
                builder.regressions(compared);
            }
        }

        builder.diagnostics(
            prepared
                .extraction
                .warnings
                .into_iter()
                .map(Diagnostic::ExtractionWarning)
        );
        builder.diagnostics(
            prepared
                .extraction
                .skipped
                .into_iter()
                .map(Diagnostic::SkippedCandidate)
        );
        builder.diagnostics(prepared.unparseable);
        if let Some(results) = &dynamic {
            builder.diagnostics(results.errors().iter().cloned().map(Diagnostic::ProbeError));
        }

        Ok(builder.build())
    }

    /// Probe every statement and replace the stored baseline.
    ///
    /// # Errors
    ///
    /// Requires a probe and a store; fails when the baseline cannot be
    /// written.
    pub async fn save_baseline(&self, artifacts: Vec<SourceArtifact>) -> AppResult<Baseline> {
        let Some(store) = &self.store else {
            return Err(config_error("baseline save requires a baseline path"));
        };
        if !self.dynamic_available() {
            return Err(config_error(
                "baseline save requires dynamic analysis (supply --dsn or set SQLQA_DSN)"
            ));
        }

        let prepared = self.prepare(artifacts);
        let mut builder = ReportBuilder::new();
        let results = self
            .run_dynamic(&prepared, &mut builder)
            .await
            .unwrap_or_default();
        let baseline = Baseline::new(self.metrics(&prepared, &results));
        store.save(&baseline)?;
        Ok(baseline)
    }

    fn prepare(&self, artifacts: Vec<SourceArtifact>) -> Prepared {
        let artifact_count = artifacts.len();
        let extractor =
            Extractor::new(artifacts).with_call_names(self.config.targets.call_names.iter().map(String::as_str));
        let mut extraction = extractor.collect();

        let mut seen = HashSet::new();
        extraction.statements.retain(|s| {
            let fresh = seen.insert(s.id().clone());
            if !fresh {
                tracing::debug!(statement = %s.id(), location = %s.location(), "duplicate statement dropped");
            }
            fresh
        });

        let mut schema = self.schema.clone();
        for statement in &extraction.statements {
            if statement.kind() == StatementKind::Other
                && statement.normalized_text().starts_with("create ")
                && let Err(e) = schema.absorb(statement.raw_text(), self.config.dialect)
            {
                tracing::debug!(location = %statement.location(), error = %e, "ignoring unparseable DDL");
            }
        }

        let shaped: Vec<_> = extraction
            .statements
            .par_iter()
            .map(|statement| (statement, self.cache.get_or_analyze(statement)))
            .collect();

        let mut analyzed = Vec::with_capacity(shaped.len());
        let mut unparseable = Vec::new();
        for (statement, result) in shaped {
            match result.as_ref() {
                Ok(shape) => analyzed.push(Analyzed {
                    statement: statement.clone(),
                    shape:     shape.clone()
                }),
                Err(e) => {
                    tracing::warn!(statement = %statement.id(), location = %statement.location(), "{}", e);
                    unparseable.push(Diagnostic::UnparseableStatement {
                        statement_id: statement.id().clone(),
                        location:     statement.location().clone(),
                        message:      e.to_string()
                    });
                }
            }
        }

        Prepared {
            extraction,
            analyzed,
            unparseable,
            schema,
            artifacts: artifact_count
        }
    }

    async fn run_dynamic(&self, prepared: &Prepared, builder: &mut ReportBuilder) -> Option<DynamicResults> {
        let Some(probe) = &self.probe else {
            builder.stage_skipped(Stage::Dynamic, "no database connection supplied");
            return None;
        };
        if !self.config.dynamic.enabled {
            builder.stage_skipped(Stage::Dynamic, "disabled by policy");
            return None;
        }

        let statements: Vec<Statement> = prepared.analyzed.iter().map(|a| a.statement.clone()).collect();
        let analyzer = DynamicAnalyzer::new(Arc::clone(probe), ProbeSettings::from(&self.config.dynamic));
        let results = analyzer.run(&statements).await;

        let mut detail = format!(
            "plans for {} of {} SELECT statements, {} probe errors",
            results.plan_count(),
            results.probed(),
            results.errors().len()
        );
        if results.deadline_hit() {
            detail.push_str(", run deadline expired");
        }
        builder.stage_ran(Stage::Dynamic, detail);
        Some(results)
    }

    fn metrics(&self, prepared: &Prepared, results: &DynamicResults) -> Vec<Metric> {
        prepared
            .analyzed
            .iter()
            .filter(|a| a.statement.kind() == StatementKind::Select)
            .map(|a| {
                let id = a.statement.id();
                Metric::from_probe(id.clone(), results.latency(id), results.plan(id))
            })
            .collect()
    }
}
