use std::time::Duration;

use hdrhistogram::Histogram;
use serde::Serialize;

use crate::testing::verdict::{Outcome, Verdict};

/// Upper bound for recorded latencies; slower exchanges saturate here.
const MAX_TRACKED_LATENCY_MS: u64 = 3_600_000;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LatencySummary {
    pub p50_ms: u64,
    pub p95_ms: u64,
    pub max_ms: u64,
}

/// Per-category counts for a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errored: usize,
    /// Scenarios never recorded because the run was cancelled.
    pub skipped: usize,
    pub duration_ms: u64,
    pub latency: LatencySummary,
}

impl RunSummary {
    pub fn succeeded(&self) -> bool {
        self.total > 0 && self.failed == 0 && self.errored == 0 && self.skipped == 0
    }

    /// Cancellation is the only way a scenario ends up skipped.
    pub fn was_cancelled(&self) -> bool {
        self.skipped > 0
    }

    pub fn count(&self, outcome: Outcome) -> usize {
        match outcome {
            Outcome::Passed => self.passed,
            Outcome::Failed => self.failed,
            Outcome::Errored => self.errored,
        }
    }
}

/// Accumulates a [`RunSummary`] from a verdict stream.
pub struct Tally {
    summary: RunSummary,
    latencies: Option<Histogram<u64>>,
}

impl Default for Tally {
    fn default() -> Self {
        Self::new()
    }
}

impl Tally {
    pub fn new() -> Self {
        let latencies = Histogram::<u64>::new_with_bounds(1, MAX_TRACKED_LATENCY_MS, 3).ok();
        Self {
            summary: RunSummary::default(),
            latencies,
        }
    }

    pub fn observe(&mut self, verdict: &Verdict) {
        self.summary.total += 1;
        match verdict.outcome() {
            Outcome::Passed => self.summary.passed += 1,
            Outcome::Failed => self.summary.failed += 1,
            Outcome::Errored => self.summary.errored += 1,
        }

        if let (Some(histogram), Some(exchange)) = (self.latencies.as_mut(), verdict.exchange()) {
            let ms = exchange.elapsed().as_millis() as u64;
            histogram.saturating_record(ms.clamp(1, MAX_TRACKED_LATENCY_MS));
        }
    }

    /// Scenarios that never produced a verdict still count towards the total.
    pub fn skip(&mut self, count: usize) {
        self.summary.total += count;
        self.summary.skipped += count;
    }

    pub fn finish(&self, wall_time: Duration) -> RunSummary {
        let mut summary = self.summary.clone();
        summary.duration_ms = wall_time.as_millis() as u64;
        if let Some(histogram) = self.latencies.as_ref().filter(|h| !h.is_empty()) {
            summary.latency = LatencySummary {
                p50_ms: histogram.value_at_quantile(0.50),
                p95_ms: histogram.value_at_quantile(0.95),
                max_ms: histogram.max(),
            };
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::error::{HarnessError, TransportError};
    use crate::http::exchange::Exchange;
    use crate::http::request::RequestDescriptor;

    fn completed(name: &str, failures: Vec<String>, elapsed_ms: u64) -> Verdict {
        let exchange = Exchange::new(
            RequestDescriptor::get("/"),
            "http://stub.local/".into(),
            200,
            Vec::new(),
            Bytes::new(),
            Duration::from_millis(elapsed_ms),
        );
        Verdict::completed(name, failures, Vec::new(), exchange)
    }

    #[test]
    fn counts_each_outcome() {
        let mut tally = Tally::new();
        tally.observe(&completed("a", Vec::new(), 100));
        tally.observe(&completed("b", vec!["bad".into()], 200));
        tally.observe(&Verdict::errored(
            "c",
            HarnessError::Transport(TransportError::Cancelled),
            Duration::ZERO,
            None,
        ));
        tally.skip(2);

        let summary = tally.finish(Duration::from_millis(1500));
        assert_eq!(summary.total, 5);
        assert_eq!(summary.count(Outcome::Passed), 1);
        assert_eq!(summary.count(Outcome::Failed), 1);
        assert_eq!(summary.count(Outcome::Errored), 1);
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.duration_ms, 1500);
        assert!(!summary.succeeded());
    }

    #[test]
    fn latency_percentiles_come_from_exchanges() {
        let mut tally = Tally::new();
        for ms in [10, 20, 30, 40, 1000] {
            tally.observe(&completed(&format!("s{ms}"), Vec::new(), ms));
        }
        let summary = tally.finish(Duration::ZERO);
        assert!(summary.succeeded());
        assert!((29..=31).contains(&summary.latency.p50_ms));
        assert!(summary.latency.max_ms >= 999);
    }

    #[test]
    fn empty_run_is_not_a_success() {
        assert!(!Tally::new().finish(Duration::ZERO).succeeded());
    }
}
