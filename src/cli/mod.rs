//! # Command line
//!
//! `apicontract run <suite>` executes a suite and writes a report,
//! `apicontract schemas` lists or checks schema documents and
//! `apicontract history` shows runs recorded with `--history`.
//!
//! Settings resolve in this order: command-line flag, environment variable,
//! suite file, built-in default.

pub mod commands;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::environment::parse_assignments;
use crate::error::ConfigError;
use crate::http::capture::DEFAULT_SCENARIO_TIMEOUT;
use crate::testing::scenario::{Scenario, Suite};

pub const DEFAULT_SCHEMA_DIR: &str = "schemas";

#[derive(Debug, Parser)]
#[command(name = "apicontract", version, about = "Contract checks for HTTP JSON APIs")]
pub struct Cli {
    /// Log at debug level (APICONTRACT_LOG takes precedence when set).
    #[arg(long, short, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Execute a suite file and write a report.
    Run(RunArgs),
    /// List the schema documents in a directory, optionally compiling each.
    Schemas(SchemasArgs),
    /// Show runs recorded in a history database.
    History(HistoryArgs),
}

/// Report format for `run`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Html,
    Json,
}

impl OutputFormat {
    pub fn default_report_path(self) -> PathBuf {
        match self {
            OutputFormat::Html => PathBuf::from("report.html"),
            OutputFormat::Json => PathBuf::from("report.json"),
        }
    }
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Suite file (JSON).
    pub suite: PathBuf,
    /// Base URL every scenario path is resolved against.
    #[arg(long, env = "APICONTRACT_BASE_URL")]
    pub base_url: Option<String>,
    /// Directory holding `<SchemaName>.json` documents.
    #[arg(long, default_value = DEFAULT_SCHEMA_DIR)]
    pub schemas: PathBuf,
    /// Report destination [default: report.html or report.json].
    #[arg(long)]
    pub report: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Html)]
    pub format: OutputFormat,
    /// Append this run to a SQLite history database.
    #[arg(long, value_name = "SQLITE")]
    pub history: Option<PathBuf>,
    /// Scenarios executed in parallel.
    #[arg(long, default_value_t = 1)]
    pub concurrency: usize,
    /// Per-scenario timeout, unless a scenario sets its own.
    #[arg(long)]
    pub timeout_ms: Option<u64>,
    /// Accept any TLS certificate. Test environments only.
    #[arg(long)]
    pub insecure: bool,
    /// Suite variable override (repeatable).
    #[arg(long = "var", value_name = "KEY=VALUE")]
    pub vars: Vec<String>,
    /// Do not print per-scenario lines.
    #[arg(long, short)]
    pub quiet: bool,
}

#[derive(Debug, Args)]
pub struct SchemasArgs {
    #[arg(long, default_value = DEFAULT_SCHEMA_DIR)]
    pub dir: PathBuf,
    /// Load and compile every schema, failing on the first broken one.
    #[arg(long)]
    pub check: bool,
}

#[derive(Debug, Args)]
pub struct HistoryArgs {
    /// SQLite database written by `run --history`.
    pub database: PathBuf,
    /// Show the verdicts of one run instead of the run list.
    #[arg(long)]
    pub run: Option<i64>,
    #[arg(long, default_value_t = 10)]
    pub limit: usize,
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub suite_name: String,
    pub scenarios: Vec<Scenario>,
    pub schema_refs: Vec<String>,
    pub base_url: String,
    pub timeout: Duration,
    pub concurrency: usize,
    pub schemas: PathBuf,
    pub report_path: PathBuf,
    pub format: OutputFormat,
    pub history: Option<PathBuf>,
    pub insecure: bool,
    pub quiet: bool,
}

impl RunArgs {
    pub fn plan(&self) -> Result<RunPlan, ConfigError> {
        let suite = Suite::load(&self.suite)?;
        self.plan_for(suite)
    }

    pub fn plan_for(&self, suite: Suite) -> Result<RunPlan, ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::InvalidConcurrency);
        }
        let overrides: BTreeMap<String, String> =
            parse_assignments(&self.vars).map_err(ConfigError::InvalidVariable)?;

        let base_url = self
            .base_url
            .as_deref()
            .or(suite.base_url.as_deref())
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or(ConfigError::MissingBaseUrl)?
            .to_string();

        let timeout = self
            .timeout_ms
            .or(suite.timeout_ms)
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_SCENARIO_TIMEOUT);

        Ok(RunPlan {
            scenarios: suite.resolved_scenarios(&overrides),
            schema_refs: suite.schema_refs().into_iter().map(String::from).collect(),
            suite_name: suite.name,
            base_url,
            timeout,
            concurrency: self.concurrency,
            schemas: self.schemas.clone(),
            report_path: self
                .report
                .clone()
                .unwrap_or_else(|| self.format.default_report_path()),
            format: self.format,
            history: self.history.clone(),
            insecure: self.insecure,
            quiet: self.quiet,
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn suite() -> Suite {
        serde_json::from_value(json!({
            "name": "users",
            "base_url": "https://reqres.in",
            "timeout_ms": 5000,
            "variables": {"userId": "2"},
            "scenarios": [{
                "name": "get user",
                "request": {"method": "GET", "path": "/api/users/{{userId}}"},
                "schema": "GetSingleUserSchema"
            }]
        }))
        .unwrap()
    }

    fn run_args(extra: &[&str]) -> RunArgs {
        let mut argv = vec!["apicontract", "run", "suite.json"];
        argv.extend_from_slice(extra);
        match Cli::try_parse_from(argv).unwrap().command {
            Command::Run(args) => args,
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn suite_settings_apply_without_flags() {
        let plan = run_args(&[]).plan_for(suite()).unwrap();
        assert_eq!(plan.base_url, "https://reqres.in");
        assert_eq!(plan.timeout, Duration::from_secs(5));
        assert_eq!(plan.report_path, PathBuf::from("report.html"));
        assert_eq!(plan.schemas, PathBuf::from("schemas"));
        assert_eq!(plan.scenarios[0].request.path, "/api/users/2");
        assert_eq!(plan.schema_refs, vec!["GetSingleUserSchema"]);
    }

    #[test]
    fn flags_override_suite() {
        let plan = run_args(&[
            "--base-url",
            "http://localhost:8080",
            "--timeout-ms",
            "250",
            "--var",
            "userId=23",
            "--format",
            "json",
            "--concurrency",
            "4",
        ])
        .plan_for(suite())
        .unwrap();

        assert_eq!(plan.base_url, "http://localhost:8080");
        assert_eq!(plan.timeout, Duration::from_millis(250));
        assert_eq!(plan.scenarios[0].request.path, "/api/users/23");
        assert_eq!(plan.report_path, PathBuf::from("report.json"));
        assert_eq!(plan.concurrency, 4);
    }

    #[test]
    fn missing_base_url_is_a_config_error() {
        let mut suite = suite();
        suite.base_url = None;
        let args = RunArgs {
            base_url: None,
            ..run_args(&[])
        };
        assert!(matches!(args.plan_for(suite), Err(ConfigError::MissingBaseUrl)));
    }

    #[test]
    fn rejects_bad_variables_and_zero_concurrency() {
        assert!(matches!(
            run_args(&["--var", "broken"]).plan_for(suite()),
            Err(ConfigError::InvalidVariable(_))
        ));
        assert!(matches!(
            run_args(&["--concurrency", "0"]).plan_for(suite()),
            Err(ConfigError::InvalidConcurrency)
        ));
    }

    #[test]
    fn parses_schema_and_history_commands() {
        let cli = Cli::try_parse_from(["apicontract", "-v", "schemas", "--check"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Command::Schemas(SchemasArgs { check: true, .. })));

        let cli = Cli::try_parse_from(["apicontract", "history", "runs.db", "--run", "3"]).unwrap();
        assert!(matches!(cli.command, Command::History(HistoryArgs { run: Some(3), .. })));
    }
}
