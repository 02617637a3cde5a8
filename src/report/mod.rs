//! Report sinks and the run summary.

pub mod console;
pub mod history;
pub mod html;
pub mod json;
pub mod memory;
pub mod sink;
pub mod summary;

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use serde::Serialize;

pub use console::ConsoleSink;
pub use history::HistorySink;
pub use html::HtmlReportSink;
pub use json::JsonReportSink;
pub use memory::RecordingSink;
pub use sink::{FanoutSink, ReportSink};
pub use summary::{LatencySummary, RunSummary, Tally};

use crate::error::ReportError;
use crate::testing::verdict::VerdictRecord;

/// Everything a single-artifact report renders.
#[derive(Debug, Serialize)]
pub struct ReportDocument<'a> {
    pub title: &'a str,
    pub generated_at: String,
    pub summary: &'a RunSummary,
    pub verdicts: &'a [VerdictRecord],
}

impl<'a> ReportDocument<'a> {
    pub fn new(title: &'a str, summary: &'a RunSummary, verdicts: &'a [VerdictRecord]) -> Self {
        Self {
            title,
            generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            summary,
            verdicts,
        }
    }
}

/// Write to a sibling temporary file and rename it into place, so readers
/// never observe a half-written report.
pub(crate) fn write_atomically(path: &Path, contents: &[u8]) -> Result<(), ReportError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let partial = partial_path(path);
    fs::write(&partial, contents)?;
    fs::rename(&partial, path)?;
    Ok(())
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".partial");
    path.with_file_name(name)
}
