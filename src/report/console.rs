use std::io::{self, Write};

use super::sink::ReportSink;
use super::summary::RunSummary;
use crate::error::ReportError;
use crate::testing::verdict::{Outcome, Verdict};

/// Prints one line per verdict as it arrives, followed by a summary.
pub struct ConsoleSink {
    out: Box<dyn Write + Send>,
}

impl ConsoleSink {
    pub fn new(out: impl Write + Send + 'static) -> Self {
        Self { out: Box::new(out) }
    }

    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

fn label(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::Passed => "PASS ",
        Outcome::Failed => "FAIL ",
        Outcome::Errored => "ERROR",
    }
}

impl ReportSink for ConsoleSink {
    fn record(&mut self, verdict: Verdict) -> Result<(), ReportError> {
        writeln!(
            self.out,
            "{} {} ({} ms)",
            label(verdict.outcome()),
            verdict.scenario(),
            verdict.elapsed().as_millis()
        )?;
        for failure in verdict.failures() {
            writeln!(self.out, "      - {failure}")?;
        }
        for violation in verdict.violations() {
            writeln!(self.out, "      - {violation}")?;
        }
        self.out.flush()?;
        Ok(())
    }

    fn finalize(&mut self, summary: &RunSummary) -> Result<(), ReportError> {
        writeln!(self.out)?;
        write!(
            self.out,
            "{} passed, {} failed, {} errored, {} skipped in {:.2}s",
            summary.passed,
            summary.failed,
            summary.errored,
            summary.skipped,
            summary.duration_ms as f64 / 1000.0
        )?;
        if summary.latency.max_ms > 0 {
            write!(
                self.out,
                " (p50 {} ms, p95 {} ms, max {} ms)",
                summary.latency.p50_ms, summary.latency.p95_ms, summary.latency.max_ms
            )?;
        }
        writeln!(self.out)?;
        if summary.was_cancelled() {
            writeln!(self.out, "run cancelled")?;
        }
        self.out.flush()?;
        Ok(())
    }
}
