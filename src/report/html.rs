use std::path::{Path, PathBuf};

use tera::{Context, Tera};

use super::sink::ReportSink;
use super::summary::RunSummary;
use super::{ReportDocument, write_atomically};
use crate::error::ReportError;
use crate::testing::verdict::{Verdict, VerdictRecord};

const TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{{ title }}</title>
<style>
  body { font-family: -apple-system, "Segoe UI", sans-serif; margin: 2rem; color: #1f2328; background: #f6f8fa; }
  h1 { margin-bottom: 0.2rem; }
  .meta { color: #656d76; margin-top: 0; }
  table { border-collapse: collapse; margin: 1rem 0; background: #fff; }
  th, td { border: 1px solid #d0d7de; padding: 0.35rem 0.7rem; text-align: left; vertical-align: top; }
  th { background: #eaeef2; }
  .scenario { background: #fff; border: 1px solid #d0d7de; border-left-width: 6px; border-radius: 6px; padding: 0.6rem 1rem; margin: 0.8rem 0; }
  .scenario h2 { font-size: 1.05rem; margin: 0.2rem 0 0.4rem; }
  .scenario small { color: #656d76; font-weight: normal; }
  .passed { border-left-color: #1a7f37; }
  .failed { border-left-color: #cf222e; }
  .errored { border-left-color: #9a6700; }
  .badge { font-size: 0.75rem; padding: 0.1rem 0.45rem; border-radius: 4px; color: #fff; margin-right: 0.4rem; }
  .passed .badge { background: #1a7f37; }
  .failed .badge { background: #cf222e; }
  .errored .badge { background: #9a6700; }
  .request { font-family: ui-monospace, monospace; font-size: 0.85rem; }
  pre { background: #f6f8fa; padding: 0.6rem; overflow-x: auto; white-space: pre-wrap; }
</style>
</head>
<body>
<h1>{{ title }}</h1>
<p class="meta">Generated {{ generated_at }}</p>
<table class="summary">
  <tr><th>Total</th><th>Passed</th><th>Failed</th><th>Errored</th><th>Skipped</th><th>Duration</th><th>p50</th><th>p95</th><th>Max</th></tr>
  <tr>
    <td>{{ summary.total }}</td><td>{{ summary.passed }}</td><td>{{ summary.failed }}</td>
    <td>{{ summary.errored }}</td><td>{{ summary.skipped }}</td><td>{{ summary.duration_ms }} ms</td>
    <td>{{ summary.latency.p50_ms }} ms</td><td>{{ summary.latency.p95_ms }} ms</td><td>{{ summary.latency.max_ms }} ms</td>
  </tr>
</table>
{% for verdict in verdicts %}
<section class="scenario {{ verdict.outcome }}">
  <h2><span class="badge">{{ verdict.outcome | upper }}</span>{{ verdict.scenario }} <small>{{ verdict.elapsed_ms }} ms</small></h2>
  {% if verdict.exchange %}
  <p class="request">{{ verdict.exchange.method }} {{ verdict.exchange.url }} &rarr; {{ verdict.exchange.status_text }}</p>
  {% endif %}
  {% if verdict.failures | length > 0 %}
  <ul class="failures">
    {% for failure in verdict.failures %}<li>{{ failure }}</li>{% endfor %}
  </ul>
  {% endif %}
  {% if verdict.violations | length > 0 %}
  <table class="violations">
    <tr><th>Path</th><th>Rule</th><th>Message</th></tr>
    {% for violation in verdict.violations %}
    <tr><td>{{ violation.path }}</td><td>{{ violation.rule }}</td><td>{{ violation.message }}</td></tr>
    {% endfor %}
  </table>
  {% endif %}
  {% if verdict.exchange %}
  <details>
    <summary>Response body ({{ verdict.exchange.size_bytes }} bytes{% if verdict.exchange.body_truncated %}, truncated{% endif %})</summary>
    <pre>{{ verdict.exchange.body_excerpt }}</pre>
  </details>
  {% endif %}
</section>
{% endfor %}
</body>
</html>
"#;

/// Renders one HTML page when the run is finalized.
pub struct HtmlReportSink {
    path: PathBuf,
    title: String,
    records: Vec<VerdictRecord>,
}

impl HtmlReportSink {
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

    pub fn render(&self, summary: &RunSummary) -> Result<String, ReportError> {
        let document = ReportDocument::new(&self.title, summary, &self.records);
        let context = Context::from_serialize(&document)?;
        Ok(Tera::one_off(TEMPLATE, &context, true)?)
    }
}

impl ReportSink for HtmlReportSink {
    fn record(&mut self, verdict: Verdict) -> Result<(), ReportError> {
        self.records.push(verdict.record());
        Ok(())
    }

    fn finalize(&mut self, summary: &RunSummary) -> Result<(), ReportError> {
        let html = self.render(summary)?;
        write_atomically(&self.path, html.as_bytes())?;
        tracing::info!(path = %self.path.display(), "HTML report written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::time::Duration;

    use bytes::Bytes;

    use super::*;
    use crate::error::{HarnessError, TransportError};
    use crate::http::exchange::Exchange;
    use crate::http::request::RequestDescriptor;
    use crate::schema::Violation;

    fn failed_verdict() -> Verdict {
        let exchange = Exchange::new(
            RequestDescriptor::get("/api/users/2"),
            "https://reqres.in/api/users/2".into(),
            200,
            Vec::new(),
            Bytes::from_static(b"<script>alert(1)</script>"),
            Duration::from_millis(42),
        );
        Verdict::completed(
            "fetch <user>",
            vec!["expected status 404, got 200 OK".into()],
            vec![Violation::invalid_json("expected value at line 1 column 1")],
            exchange,
        )
    }

    #[test]
    fn renders_outcomes_failures_and_escapes_body() {
        let mut sink = HtmlReportSink::new("unused.html", "Contract run");
        sink.record(failed_verdict()).unwrap();
        sink.record(Verdict::errored(
            "offline",
            HarnessError::Transport(TransportError::Connect("refused".into())),
            Duration::ZERO,
            None,
        ))
        .unwrap();

        let summary = RunSummary {
            total: 2,
            failed: 1,
            errored: 1,
            ..RunSummary::default()
        };
        let html = sink.render(&summary).unwrap();

        assert!(html.contains("<title>Contract run</title>"));
        assert!(html.contains("FAILED"));
        assert!(html.contains("ERRORED"));
        assert!(html.contains("expected status 404, got 200 OK"));
        assert!(html.contains("invalid-json"));
        assert!(html.contains("fetch &lt;user&gt;"));
        assert!(!html.contains("<script>alert(1)</script>"));
        assert!(html.contains("connection failed: refused"));
    }

    #[test]
    fn finalize_writes_the_report_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.html");
        let mut sink = HtmlReportSink::new(&path, "Contract run");
        sink.record(failed_verdict()).unwrap();
        sink.finalize(&RunSummary::default()).unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("<!DOCTYPE html>"));
        assert!(written.contains("reqres.in"));
    }
}
