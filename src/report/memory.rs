use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::sink::ReportSink;
use super::summary::RunSummary;
use crate::error::ReportError;
use crate::testing::verdict::Verdict;

#[derive(Default)]
struct Recorded {
    verdicts: Vec<Verdict>,
    summary: Option<RunSummary>,
    finalize_calls: usize,
}

/// Keeps verdicts in memory. Clones share the same storage, so a caller can
/// hand one clone to the harness and inspect another afterwards.
#[derive(Clone, Default)]
pub struct RecordingSink {
    state: Arc<Mutex<Recorded>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, Recorded> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn verdicts(&self) -> Vec<Verdict> {
        self.state().verdicts.clone()
    }

    pub fn scenario_names(&self) -> Vec<String> {
        self.state()
            .verdicts
            .iter()
            .map(|verdict| verdict.scenario().to_string())
            .collect()
    }

    /// Summary passed to the last `finalize` call.
    pub fn summary(&self) -> Option<RunSummary> {
        self.state().summary.clone()
    }

    pub fn finalize_count(&self) -> usize {
        self.state().finalize_calls
    }
}

impl ReportSink for RecordingSink {
    fn record(&mut self, verdict: Verdict) -> Result<(), ReportError> {
        self.state().verdicts.push(verdict);
        Ok(())
    }

    fn finalize(&mut self, summary: &RunSummary) -> Result<(), ReportError> {
        let mut state = self.state();
        state.summary = Some(summary.clone());
        state.finalize_calls += 1;
        Ok(())
    }
}
