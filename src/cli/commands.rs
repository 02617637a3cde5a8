use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};

use super::{HistoryArgs, OutputFormat, RunPlan, SchemasArgs};
use crate::error::ConfigError;
use crate::http::capture::ResponseCapture;
use crate::http::transport::{ReqwestTransport, Transport, TransportConfig};
use crate::report::history::{HistorySink, HistoryStore};
use crate::report::{ConsoleSink, FanoutSink, HtmlReportSink, JsonReportSink, RunSummary};
use crate::runner::{CancelHandle, Harness, HarnessConfig};
use crate::schema::SchemaStore;
use crate::testing::assembler::VerdictAssembler;

pub const EXIT_PASSED: u8 = 0;
pub const EXIT_FAILED: u8 = 1;
pub const EXIT_CONFIG: u8 = 2;
pub const EXIT_CANCELLED: u8 = 130;

pub fn exit_code(summary: &RunSummary) -> u8 {
    if summary.was_cancelled() {
        EXIT_CANCELLED
    } else if summary.succeeded() {
        EXIT_PASSED
    } else {
        EXIT_FAILED
    }
}

/// Builds the reqwest transport described by the plan.
pub fn transport_for(plan: &RunPlan) -> Result<Arc<dyn Transport>, ConfigError> {
    let config = TransportConfig {
        accept_any_certificate: plan.insecure,
        ..TransportConfig::default()
    };
    Ok(Arc::new(ReqwestTransport::new(&config)?))
}

/// Sinks requested by the plan: console (unless quiet), the report file and
/// optionally the history database.
pub fn sinks_for(plan: &RunPlan) -> Result<FanoutSink> {
    let mut sinks = FanoutSink::new();
    if !plan.quiet {
        sinks = sinks.with(ConsoleSink::stdout());
    }
    sinks = match plan.format {
        OutputFormat::Html => sinks.with(HtmlReportSink::new(&plan.report_path, &plan.suite_name)),
        OutputFormat::Json => sinks.with(JsonReportSink::new(&plan.report_path, &plan.suite_name)),
    };
    if let Some(path) = &plan.history {
        let history = HistorySink::open(path, &plan.suite_name)
            .with_context(|| format!("opening history database `{}`", path.display()))?;
        sinks = sinks.with(history);
    }
    Ok(sinks)
}

/// Executes a resolved plan against `transport`.
pub async fn run_plan(
    plan: RunPlan,
    transport: Arc<dyn Transport>,
    cancel: &CancelHandle,
) -> Result<RunSummary> {
    let schemas = Arc::new(SchemaStore::from_dir(&plan.schemas));
    for result in schemas.preload(plan.schema_refs.iter().map(String::as_str)) {
        if let Err(err) = result {
            tracing::warn!(error = %err, "referenced schema is unusable; its scenarios will error");
        }
    }

    let capture = ResponseCapture::new(transport, plan.base_url.clone()).with_timeout(plan.timeout);
    let assembler = VerdictAssembler::new(schemas);
    let sinks = sinks_for(&plan)?;

    tracing::info!(
        suite = %plan.suite_name,
        base_url = %plan.base_url,
        report = %plan.report_path.display(),
        "running suite"
    );
    let mut harness = Harness::new(capture, assembler, sinks).with_config(HarnessConfig {
        concurrency: plan.concurrency,
    });
    harness
        .run(plan.scenarios, cancel)
        .await
        .context("writing run report")
}

/// Prints the schema identifiers in `args.dir`; with `--check`, compiles
/// each one. Returns `false` if any failed to compile.
pub fn list_schemas(args: &SchemasArgs, out: &mut impl Write) -> Result<bool> {
    let store = SchemaStore::from_dir(&args.dir);
    let ids = store
        .available()
        .map_err(anyhow::Error::msg)
        .with_context(|| format!("listing schemas in `{}`", args.dir.display()))?;
    if ids.is_empty() {
        bail!("no schema documents found in `{}`", args.dir.display());
    }

    let mut all_ok = true;
    for id in &ids {
        if !args.check {
            writeln!(out, "{id}")?;
            continue;
        }
        match store.resolve(id) {
            Ok(_) => writeln!(out, "ok     {id}")?,
            Err(err) => {
                all_ok = false;
                writeln!(out, "broken {id}: {err}")?;
            }
        }
    }
    Ok(all_ok)
}

fn format_timestamp(seconds: i64) -> String {
    DateTime::<Utc>::from_timestamp(seconds, 0)
        .map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| seconds.to_string())
}

pub fn show_history(args: &HistoryArgs, out: &mut impl Write) -> Result<()> {
    let store = HistoryStore::open(&args.database)
        .with_context(|| format!("opening history database `{}`", args.database.display()))?;

    if let Some(run_id) = args.run {
        let Some(run) = store.run(run_id)? else {
            bail!("no run with id {run_id}");
        };
        writeln!(out, "run {} ({}) {}", run.id, run.suite, format_timestamp(run.started_at))?;
        for verdict in store.verdicts(run_id)? {
            let status = verdict
                .status
                .map_or_else(|| "---".to_string(), |status| status.to_string());
            writeln!(
                out,
                "{:>3} {:<8} {} {} ({} ms)",
                verdict.position, verdict.outcome, status, verdict.scenario, verdict.elapsed_ms
            )?;
            for failure in &verdict.failures {
                writeln!(out, "      - {failure}")?;
            }
            for violation in &verdict.violations {
                writeln!(out, "      - {violation}")?;
            }
        }
        return Ok(());
    }

    for run in store.recent_runs(args.limit)? {
        let state = if run.finished_at.is_some() { "" } else { " (unfinished)" };
        writeln!(
            out,
            "{:>4}  {}  {:<20} {} passed, {} failed, {} errored, {} skipped{state}",
            run.id,
            format_timestamp(run.started_at),
            run.suite,
            run.passed,
            run.failed,
            run.errored,
            run.skipped,
        )?;
    }
    Ok(())
}
