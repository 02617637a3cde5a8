use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use super::exchange::Exchange;
use super::request::RequestDescriptor;
use super::transport::Transport;
use crate::error::TransportError;

pub const DEFAULT_SCENARIO_TIMEOUT: Duration = Duration::from_secs(30);

/// Executes request descriptors through a [`Transport`] and records the
/// resulting [`Exchange`].
#[derive(Clone)]
pub struct ResponseCapture {
    transport: Arc<dyn Transport>,
    base_url: String,
    timeout: Duration,
}

impl ResponseCapture {
    pub fn new(transport: Arc<dyn Transport>, base_url: impl Into<String>) -> Self {
        Self {
            transport,
            base_url: base_url.into(),
            timeout: DEFAULT_SCENARIO_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn execute(&self, request: &RequestDescriptor) -> Result<Exchange, TransportError> {
        self.execute_within(request, self.timeout).await
    }

    /// Performs exactly one transport call, bounded by `timeout`.
    pub async fn execute_within(
        &self,
        request: &RequestDescriptor,
        timeout: Duration,
    ) -> Result<Exchange, TransportError> {
        let outbound = request.to_outbound(&self.base_url)?;
        let url = outbound.url.clone();

        tracing::debug!(method = %request.method, url = %url, "sending request");
        let started = Instant::now();
        let result = tokio::time::timeout(timeout, self.transport.send(outbound)).await;
        let elapsed = started.elapsed();

        let response = match result {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => {
                tracing::warn!(url = %url, error = %err, "transport error");
                return Err(err);
            }
            Err(_) => {
                tracing::warn!(url = %url, timeout_ms = timeout.as_millis() as u64, "request timed out");
                return Err(TransportError::Timeout(timeout));
            }
        };

        tracing::debug!(
            url = %url,
            status = response.status,
            elapsed_ms = elapsed.as_millis() as u64,
            size = response.body.len(),
            "response received"
        );

        Ok(Exchange::new(
            request.clone(),
            url,
            response.status,
            response.headers,
            response.body,
            elapsed,
        ))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::http::method::HttpMethod;
    use crate::http::stub::{StubResponse, StubTransport};

    #[tokio::test(start_paused = true)]
    async fn records_status_body_and_elapsed_time() {
        let stub = Arc::new(StubTransport::new().route(
            HttpMethod::Get,
            "/api/users/2",
            StubResponse::json(200, json!({"data": {"id": 2}}))
                .with_latency(Duration::from_millis(150)),
        ));
        let capture = ResponseCapture::new(stub.clone(), "https://reqres.in");

        let exchange = capture
            .execute(&RequestDescriptor::get("/api/users/2"))
            .await
            .unwrap();

        assert_eq!(exchange.status(), 200);
        assert_eq!(exchange.url(), "https://reqres.in/api/users/2");
        assert_eq!(exchange.json().unwrap()["data"]["id"], 2);
        assert!(exchange.elapsed() >= Duration::from_millis(150));
        assert_eq!(stub.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_transport_times_out() {
        let stub = Arc::new(StubTransport::new().hang(
            HttpMethod::Get,
            "/slow",
            Duration::from_secs(3600),
        ));
        let capture =
            ResponseCapture::new(stub, "http://stub.local").with_timeout(Duration::from_secs(5));

        let err = capture
            .execute(&RequestDescriptor::get("/slow"))
            .await
            .unwrap_err();
        assert_eq!(err, TransportError::Timeout(Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn invalid_url_never_reaches_transport() {
        let stub = Arc::new(StubTransport::new());
        let capture = ResponseCapture::new(stub.clone(), "");
        let err = capture
            .execute(&RequestDescriptor::get("/api/users"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::InvalidRequest(_)));
        assert_eq!(stub.call_count(), 0);
    }
}
