use std::fmt::{self, Display};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::HarnessError;
use crate::http::exchange::{Exchange, ExchangeSummary};
use crate::schema::Violation;

/// Final category of a scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Passed,
    /// The API violated an expectation or its schema.
    Failed,
    /// The harness could not complete the check.
    Errored,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Passed => "passed",
            Outcome::Failed => "failed",
            Outcome::Errored => "errored",
        }
    }
}

impl Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of one scenario as reported in the run log. Unstarted scenarios
/// have no state; cancellation skips them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioState {
    Executing,
    Finished(Outcome),
}

/// Outcome and diagnostics for one scenario execution.
///
/// `passed()` holds exactly when both `failures()` and `violations()` are
/// empty. Errored verdicts carry their harness error as a failure reason and
/// never carry violations.
#[derive(Debug, Clone)]
pub struct Verdict {
    scenario: String,
    failures: Vec<String>,
    violations: Vec<Violation>,
    error: Option<HarnessError>,
    elapsed: Duration,
    exchange: Option<Exchange>,
}

impl Verdict {
    pub(crate) fn completed(
        scenario: impl Into<String>,
        failures: Vec<String>,
        violations: Vec<Violation>,
        exchange: Exchange,
    ) -> Self {
        Self {
            scenario: scenario.into(),
            failures,
            violations,
            error: None,
            elapsed: exchange.elapsed(),
            exchange: Some(exchange),
        }
    }

    pub(crate) fn errored(
        scenario: impl Into<String>,
        error: HarnessError,
        elapsed: Duration,
        exchange: Option<Exchange>,
    ) -> Self {
        Self {
            scenario: scenario.into(),
            failures: vec![error.to_string()],
            violations: Vec::new(),
            error: Some(error),
            elapsed,
            exchange,
        }
    }

    pub fn scenario(&self) -> &str {
        &self.scenario
    }

    pub fn passed(&self) -> bool {
        self.failures.is_empty() && self.violations.is_empty()
    }

    pub fn outcome(&self) -> Outcome {
        if self.error.is_some() {
            Outcome::Errored
        } else if self.passed() {
            Outcome::Passed
        } else {
            Outcome::Failed
        }
    }

    pub fn failures(&self) -> &[String] {
        &self.failures
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn error(&self) -> Option<&HarnessError> {
        self.error.as_ref()
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn exchange(&self) -> Option<&Exchange> {
        self.exchange.as_ref()
    }

    pub fn record(&self) -> VerdictRecord {
        VerdictRecord {
            scenario: self.scenario.clone(),
            outcome: self.outcome(),
            passed: self.passed(),
            failures: self.failures.clone(),
            violations: self.violations.clone(),
            elapsed_ms: self.elapsed.as_millis() as u64,
            exchange: self.exchange.as_ref().map(Exchange::summary),
        }
    }
}

/// Serializable snapshot of a [`Verdict`] for report sinks.
#[derive(Debug, Clone, Serialize)]
pub struct VerdictRecord {
    pub scenario: String,
    pub outcome: Outcome,
    pub passed: bool,
    pub failures: Vec<String>,
    pub violations: Vec<Violation>,
    pub elapsed_ms: u64,
    pub exchange: Option<ExchangeSummary>,
}
