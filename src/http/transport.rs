use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, Proxy};
use serde::{Deserialize, Serialize};

use super::request::OutboundRequest;
use crate::error::TransportError;

/// Status, headers and body as they came off the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

pub type TransportFuture<'a> =
    Pin<Box<dyn Future<Output = Result<RawResponse, TransportError>> + Send + 'a>>;

/// Capability to perform one HTTP round trip.
pub trait Transport: Send + Sync {
    fn send(&self, request: OutboundRequest) -> TransportFuture<'_>;
}

/// Options consumed when the reqwest client is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TransportConfig {
    /// Accept self-signed or otherwise untrusted certificates.
    /// Test environments only.
    #[serde(default)]
    pub accept_any_certificate: bool,
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
    #[serde(default = "default_follow_redirects")]
    pub follow_redirects: bool,
    #[serde(default)]
    pub proxy_url: Option<String>,
}

fn default_follow_redirects() -> bool {
    true
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            accept_any_certificate: false,
            request_timeout_ms: None,
            follow_redirects: default_follow_redirects(),
            proxy_url: None,
        }
    }
}

/// [`Transport`] backed by a shared reqwest client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    timeout: Option<Duration>,
}

impl ReqwestTransport {
    pub fn new(config: &TransportConfig) -> Result<Self, TransportError> {
        let mut builder = Client::builder();
        builder = if config.follow_redirects {
            builder.redirect(reqwest::redirect::Policy::limited(10))
        } else {
            builder.redirect(reqwest::redirect::Policy::none())
        };

        let timeout = config
            .request_timeout_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        if let Some(proxy_url) = config
            .proxy_url
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
        {
            let proxy = Proxy::all(proxy_url).map_err(|err| {
                TransportError::InvalidRequest(format!("invalid proxy URL: {err}"))
            })?;
            builder = builder.proxy(proxy);
        }

        if config.accept_any_certificate {
            tracing::warn!("TLS certificate validation is disabled for this run");
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder.build().map_err(|err| {
            TransportError::InvalidRequest(format!("failed to build HTTP client: {err}"))
        })?;

        Ok(Self { client, timeout })
    }

    async fn round_trip(&self, request: OutboundRequest) -> Result<RawResponse, TransportError> {
        let method: Method = request.method.into();
        let headers = build_headers(&request.headers)?;

        let mut builder = self.client.request(method, &request.url).headers(headers);
        if let Some(body) = request.body {
            if !request.method.is_bodyless() {
                builder = builder.body(body);
            }
        }

        let response = builder
            .send()
            .await
            .map_err(|err| classify_reqwest_error(&err, self.timeout))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    value.to_str().unwrap_or("<binary>").to_string(),
                )
            })
            .collect();

        let body = response
            .bytes()
            .await
            .map_err(|err| TransportError::Read(err.to_string()))?;

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}

impl Transport for ReqwestTransport {
    fn send(&self, request: OutboundRequest) -> TransportFuture<'_> {
        Box::pin(self.round_trip(request))
    }
}

pub fn build_headers(input: &[(String, String)]) -> Result<HeaderMap, TransportError> {
    let mut headers = HeaderMap::new();

    for (key, value) in input {
        if key.is_empty() {
            continue;
        }

        let header_name = HeaderName::from_bytes(key.as_bytes()).map_err(|err| {
            TransportError::InvalidRequest(format!("invalid header name `{key}`: {err}"))
        })?;
        let header_value = HeaderValue::from_str(value).map_err(|err| {
            TransportError::InvalidRequest(format!("invalid header value for `{key}`: {err}"))
        })?;
        headers.append(header_name, header_value);
    }

    Ok(headers)
}

fn classify_reqwest_error(err: &reqwest::Error, timeout: Option<Duration>) -> TransportError {
    let message = err.to_string();
    if err.is_timeout() {
        return TransportError::Timeout(timeout.unwrap_or_default());
    }
    if err.is_builder() {
        return TransportError::InvalidRequest(message);
    }

    let detail = error_chain(err).to_ascii_lowercase();
    if detail.contains("dns") || detail.contains("failed to lookup address") {
        return TransportError::Dns(message);
    }
    if detail.contains("tls") || detail.contains("ssl") || detail.contains("certificate") {
        return TransportError::Tls(message);
    }
    if err.is_connect() {
        return TransportError::Connect(message);
    }

    TransportError::Read(message)
}

fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut parts = vec![err.to_string()];
    let mut source = err.source();
    while let Some(cause) = source {
        parts.push(cause.to_string());
        source = cause.source();
    }
    parts.join(": ")
}
