use super::summary::RunSummary;
use crate::error::ReportError;
use crate::testing::verdict::Verdict;

/// Destination for verdicts.
///
/// The harness is the only writer: `record` is called once per completed
/// scenario in declaration order, then `finalize` exactly once, including
/// after cancellation.
pub trait ReportSink: Send {
    fn record(&mut self, verdict: Verdict) -> Result<(), ReportError>;

    fn finalize(&mut self, summary: &RunSummary) -> Result<(), ReportError>;
}

impl<S: ReportSink + ?Sized> ReportSink for Box<S> {
    fn record(&mut self, verdict: Verdict) -> Result<(), ReportError> {
        (**self).record(verdict)
    }

    fn finalize(&mut self, summary: &RunSummary) -> Result<(), ReportError> {
        (**self).finalize(summary)
    }
}

/// Forwards every call to several sinks.
///
/// All sinks see every verdict even if one of them fails; the first error
/// is returned.
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Box<dyn ReportSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl ReportSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn push(&mut self, sink: Box<dyn ReportSink>) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl ReportSink for FanoutSink {
    fn record(&mut self, verdict: Verdict) -> Result<(), ReportError> {
        let mut first_error = None;
        if let Some((last, rest)) = self.sinks.split_last_mut() {
            for sink in rest {
                if let Err(err) = sink.record(verdict.clone()) {
                    first_error.get_or_insert(err);
                }
            }
            if let Err(err) = last.record(verdict) {
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn finalize(&mut self, summary: &RunSummary) -> Result<(), ReportError> {
        let mut first_error = None;
        for sink in &mut self.sinks {
            if let Err(err) = sink.finalize(summary) {
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
