//! Scenario scheduling: sequential or a bounded worker pool, with per-scenario
//! timeouts, cancellation and ordered single-writer delivery to the sink.

pub mod cancel;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::Instrument;

pub use cancel::CancelHandle;

use crate::error::ReportError;
use crate::http::capture::ResponseCapture;
use crate::report::sink::ReportSink;
use crate::report::summary::{RunSummary, Tally};
use crate::testing::assembler::VerdictAssembler;
use crate::testing::scenario::Scenario;
use crate::testing::verdict::{ScenarioState, Verdict};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HarnessConfig {
    /// Scenarios in flight at once; `1` runs them one after another.
    pub concurrency: usize,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self { concurrency: 1 }
    }
}

struct ScenarioExecutor {
    capture: ResponseCapture,
    assembler: VerdictAssembler,
}

impl ScenarioExecutor {
    /// `None` when the scenario was abandoned because of cancellation.
    async fn execute(&self, scenario: &Scenario, cancel: &CancelHandle) -> Option<Verdict> {
        let timeout = scenario.timeout().unwrap_or_else(|| self.capture.timeout());
        tracing::debug!(state = ?ScenarioState::Executing, "scenario started");

        let started = Instant::now();
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::warn!("scenario abandoned");
                return None;
            }
            result = self.capture.execute_within(&scenario.request, timeout) => result,
        };

        let verdict = match result {
            Ok(exchange) => self.assembler.assemble(
                &scenario.name,
                exchange,
                &scenario.assertions,
                scenario.schema.as_deref(),
            ),
            Err(err) => {
                self.assembler
                    .transport_failure(&scenario.name, err, started.elapsed())
            }
        };

        tracing::info!(
            state = ?ScenarioState::Finished(verdict.outcome()),
            elapsed_ms = verdict.elapsed().as_millis() as u64,
            "scenario finished"
        );
        Some(verdict)
    }
}

/// Hands verdicts to the sink and keeps the run tally.
struct Delivery<'a, S> {
    sink: &'a mut S,
    tally: Tally,
    delivered: usize,
    error: Option<ReportError>,
}

impl<'a, S: ReportSink> Delivery<'a, S> {
    fn new(sink: &'a mut S) -> Self {
        Self {
            sink,
            tally: Tally::new(),
            delivered: 0,
            error: None,
        }
    }

    fn deliver(&mut self, verdict: Verdict) {
        self.tally.observe(&verdict);
        self.delivered += 1;
        if let Err(err) = self.sink.record(verdict) {
            tracing::error!(error = %err, "report sink rejected verdict");
            self.error.get_or_insert(err);
        }
    }

    fn finish(mut self, total: usize, started: Instant) -> Result<RunSummary, ReportError> {
        self.tally.skip(total - self.delivered);
        let summary = self.tally.finish(started.elapsed());
        let finalized = self.sink.finalize(&summary);
        if let Some(err) = self.error {
            return Err(err);
        }
        finalized?;
        Ok(summary)
    }
}

/// Executes scenarios and streams their verdicts into a [`ReportSink`].
pub struct Harness<S> {
    executor: Arc<ScenarioExecutor>,
    sink: S,
    config: HarnessConfig,
}

impl<S: ReportSink> Harness<S> {
    pub fn new(capture: ResponseCapture, assembler: VerdictAssembler, sink: S) -> Self {
        Self {
            executor: Arc::new(ScenarioExecutor { capture, assembler }),
            sink,
            config: HarnessConfig::default(),
        }
    }

    pub fn with_config(mut self, config: HarnessConfig) -> Self {
        self.config = config;
        self
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Runs every scenario and finalizes the sink.
    ///
    /// Verdicts reach the sink in declaration order. After `cancel` fires,
    /// unstarted scenarios are skipped, in-flight ones are abandoned and the
    /// sink is still finalized. A sink error does not stop the run; the first
    /// one is returned once the sink has been finalized.
    pub async fn run(
        &mut self,
        scenarios: Vec<Scenario>,
        cancel: &CancelHandle,
    ) -> Result<RunSummary, ReportError> {
        let total = scenarios.len();
        let started = Instant::now();
        let workers = self.config.concurrency.clamp(1, total.max(1));
        tracing::info!(scenarios = total, workers, "run started");

        let mut delivery = Delivery::new(&mut self.sink);
        if workers == 1 {
            run_sequential(&self.executor, &scenarios, cancel, &mut delivery).await;
        } else {
            run_pool(&self.executor, scenarios, workers, cancel, &mut delivery).await;
        }

        let summary = delivery.finish(total, started)?;
        tracing::info!(
            passed = summary.passed,
            failed = summary.failed,
            errored = summary.errored,
            skipped = summary.skipped,
            duration_ms = summary.duration_ms,
            "run finished"
        );
        Ok(summary)
    }
}

fn scenario_span(index: usize, scenario: &Scenario) -> tracing::Span {
    tracing::info_span!("scenario", index, name = %scenario.name)
}

async fn run_sequential<S: ReportSink>(
    executor: &ScenarioExecutor,
    scenarios: &[Scenario],
    cancel: &CancelHandle,
    delivery: &mut Delivery<'_, S>,
) {
    for (index, scenario) in scenarios.iter().enumerate() {
        if cancel.is_cancelled() {
            break;
        }
        let span = scenario_span(index, scenario);
        match executor.execute(scenario, cancel).instrument(span).await {
            Some(verdict) => delivery.deliver(verdict),
            None => break,
        }
    }
}

async fn run_pool<S: ReportSink>(
    executor: &Arc<ScenarioExecutor>,
    scenarios: Vec<Scenario>,
    workers: usize,
    cancel: &CancelHandle,
    delivery: &mut Delivery<'_, S>,
) {
    let scenarios = Arc::new(scenarios);
    let next_scenario = Arc::new(AtomicUsize::new(0));
    let (verdict_tx, mut verdict_rx) = mpsc::unbounded_channel::<(usize, Verdict)>();

    let mut handles = Vec::with_capacity(workers);
    for _ in 0..workers {
        let executor = executor.clone();
        let scenarios = scenarios.clone();
        let next_scenario = next_scenario.clone();
        let verdict_tx = verdict_tx.clone();
        let cancel = cancel.clone();

        let handle = tokio::spawn(async move {
            loop {
                if cancel.is_cancelled() {
                    break;
                }
                let index = next_scenario.fetch_add(1, Ordering::Relaxed);
                let Some(scenario) = scenarios.get(index) else {
                    break;
                };
                let span = scenario_span(index, scenario);
                let Some(verdict) = executor.execute(scenario, &cancel).instrument(span).await
                else {
                    break;
                };
                if verdict_tx.send((index, verdict)).is_err() {
                    break;
                }
            }
        });
        handles.push(handle);
    }
    drop(verdict_tx);

    // Reorder buffer: hold early finishers until their predecessors arrive.
    let mut buffered = BTreeMap::new();
    let mut next_delivery = 0;
    while let Some((index, verdict)) = verdict_rx.recv().await {
        buffered.insert(index, verdict);
        while let Some(verdict) = buffered.remove(&next_delivery) {
            delivery.deliver(verdict);
            next_delivery += 1;
        }
    }

    for handle in handles {
        if let Err(err) = handle.await {
            tracing::error!(error = %err, "scenario worker crashed");
        }
    }

    // Only gaps left by abandoned scenarios can hold verdicts back here.
    for (_, verdict) in buffered {
        delivery.deliver(verdict);
    }
}
