use std::path::{Path, PathBuf};

use super::sink::ReportSink;
use super::summary::RunSummary;
use super::{ReportDocument, write_atomically};
use crate::error::ReportError;
use crate::testing::verdict::{Verdict, VerdictRecord};

/// Writes the run as one pretty-printed JSON document.
pub struct JsonReportSink {
    path: PathBuf,
    title: String,
    records: Vec<VerdictRecord>,
}

impl JsonReportSink {
    pub fn new(path: impl Into<PathBuf>, title: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            title: title.into(),
            records: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ReportSink for JsonReportSink {
    fn record(&mut self, verdict: Verdict) -> Result<(), ReportError> {
        self.records.push(verdict.record());
        Ok(())
    }

    fn finalize(&mut self, summary: &RunSummary) -> Result<(), ReportError> {
        let document = ReportDocument::new(&self.title, summary, &self.records);
        let mut bytes = serde_json::to_vec_pretty(&document)?;
        bytes.push(b'\n');
        write_atomically(&self.path, &bytes)?;
        tracing::info!(path = %self.path.display(), "JSON report written");
        Ok(())
    }
}
