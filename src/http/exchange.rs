use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;
use serde_json::Value as JsonValue;

use super::request::RequestDescriptor;

/// Cap on the response body excerpt carried into reports.
pub const MAX_BODY_EXCERPT_BYTES: usize = 8 * 1024;

/// One captured request/response pair. Immutable once built.
#[derive(Debug, Clone)]
pub struct Exchange {
    request: RequestDescriptor,
    url: String,
    status: u16,
    headers: Vec<(String, String)>,
    body: Bytes,
    elapsed: Duration,
}

impl Exchange {
    pub fn new(
        request: RequestDescriptor,
        url: String,
        status: u16,
        headers: Vec<(String, String)>,
        body: Bytes,
        elapsed: Duration,
    ) -> Self {
        Self {
            request,
            url,
            status,
            headers,
            body,
            elapsed,
        }
    }

    pub fn request(&self) -> &RequestDescriptor {
        &self.request
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn status_text(&self) -> String {
        let reason = reqwest::StatusCode::from_u16(self.status)
            .ok()
            .and_then(|status| status.canonical_reason())
            .unwrap_or("Unknown");
        format!("{} {reason}", self.status)
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// First header value matching `name`, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json(&self) -> Result<JsonValue, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn summary(&self) -> ExchangeSummary {
        let capped = &self.body[..self.body.len().min(MAX_BODY_EXCERPT_BYTES)];
        ExchangeSummary {
            method: self.request.method.to_string(),
            url: self.url.clone(),
            status: self.status,
            status_text: self.status_text(),
            headers: self.headers.clone(),
            body_excerpt: String::from_utf8_lossy(capped).into_owned(),
            body_truncated: self.body.len() > MAX_BODY_EXCERPT_BYTES,
            size_bytes: self.body.len(),
            elapsed_ms: self.elapsed.as_millis() as u64,
        }
    }
}

/// Report-friendly view of an [`Exchange`].
#[derive(Debug, Clone, Serialize)]
pub struct ExchangeSummary {
    pub method: String,
    pub url: String,
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body_excerpt: String,
    pub body_truncated: bool,
    pub size_bytes: usize,
    pub elapsed_ms: u64,
}
