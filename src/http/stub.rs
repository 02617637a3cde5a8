//! Canned-response transport for offline runs and tests.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use serde_json::Value as JsonValue;

use super::method::HttpMethod;
use super::request::OutboundRequest;
use super::transport::{RawResponse, Transport, TransportFuture};
use crate::error::TransportError;

#[derive(Debug, Clone)]
pub struct StubResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub latency: Duration,
}

impl StubResponse {
    pub fn json(status: u16, body: JsonValue) -> Self {
        Self {
            status,
            headers: vec![("content-type".into(), "application/json".into())],
            body: Bytes::from(body.to_string()),
            latency: Duration::ZERO,
        }
    }

    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: vec![("content-type".into(), "text/plain".into())],
            body: Bytes::from(body.into()),
            latency: Duration::ZERO,
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

#[derive(Debug, Clone)]
enum StubRoute {
    Respond(StubResponse),
    Fail(TransportError, Duration),
}

/// Serves routes keyed by method and path (including the query string).
/// Unknown routes answer `404` with a plain-text body.
#[derive(Debug, Default)]
pub struct StubTransport {
    routes: HashMap<(HttpMethod, String), StubRoute>,
    received: Mutex<Vec<OutboundRequest>>,
}

impl StubTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, method: HttpMethod, path: impl Into<String>, response: StubResponse) -> Self {
        self.routes
            .insert((method, path.into()), StubRoute::Respond(response));
        self
    }

    pub fn fail(mut self, method: HttpMethod, path: impl Into<String>, error: TransportError) -> Self {
        self.routes
            .insert((method, path.into()), StubRoute::Fail(error, Duration::ZERO));
        self
    }

    /// Route that never answers before `delay` elapses, then fails.
    pub fn hang(mut self, method: HttpMethod, path: impl Into<String>, delay: Duration) -> Self {
        self.routes.insert(
            (method, path.into()),
            StubRoute::Fail(TransportError::Connect("stub hung up".into()), delay),
        );
        self
    }

    pub fn call_count(&self) -> usize {
        self.received
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn received(&self) -> Vec<OutboundRequest> {
        self.received
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn answer(&self, request: OutboundRequest) -> Result<RawResponse, TransportError> {
        let key = (request.method, request.path_and_query());
        let route = self.routes.get(&key).cloned();
        self.received
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);

        match route {
            Some(StubRoute::Respond(response)) => {
                if !response.latency.is_zero() {
                    tokio::time::sleep(response.latency).await;
                }
                Ok(RawResponse {
                    status: response.status,
                    headers: response.headers,
                    body: response.body,
                })
            }
            Some(StubRoute::Fail(error, delay)) => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                Err(error)
            }
            None => Ok(RawResponse {
                status: 404,
                headers: vec![("content-type".into(), "text/plain".into())],
                body: Bytes::from(format!("no stub for {} {}", key.0, key.1)),
            }),
        }
    }
}

impl Transport for StubTransport {
    fn send(&self, request: OutboundRequest) -> TransportFuture<'_> {
        Box::pin(self.answer(request))
    }
}
