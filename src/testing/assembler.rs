use std::sync::Arc;
use std::time::Duration;

use serde_json::Value as JsonValue;

use super::assertion::Assertion;
use super::verdict::Verdict;
use crate::error::{HarnessError, TransportError};
use crate::http::exchange::Exchange;
use crate::schema::{SchemaStore, validate};

/// Turns a captured [`Exchange`] plus declared checks into a [`Verdict`].
#[derive(Clone)]
pub struct VerdictAssembler {
    schemas: Arc<SchemaStore>,
}

impl VerdictAssembler {
    pub fn new(schemas: Arc<SchemaStore>) -> Self {
        Self { schemas }
    }

    pub fn schemas(&self) -> &Arc<SchemaStore> {
        &self.schemas
    }

    /// Evaluate every assertion, then the schema if one is named.
    /// Failures accumulate; only harness problems short-circuit.
    pub fn assemble(
        &self,
        scenario: &str,
        exchange: Exchange,
        assertions: &[Assertion],
        schema_ref: Option<&str>,
    ) -> Verdict {
        if let Err(reason) = assertions.iter().try_for_each(Assertion::validate) {
            return self.errored(scenario, HarnessError::MalformedAssertion(reason), exchange);
        }

        let schema = match schema_ref.map(|id| self.schemas.resolve(id)).transpose() {
            Ok(schema) => schema,
            Err(err) => {
                tracing::error!(scenario, error = %err, "schema could not be loaded");
                return self.errored(scenario, HarnessError::SchemaLoad(err), exchange);
            }
        };

        let body: Result<JsonValue, String> = exchange.json().map_err(|err| err.to_string());
        let mut failures = Vec::new();

        for assertion in assertions {
            match assertion.evaluate(&exchange, &body) {
                Ok(None) => {}
                Ok(Some(reason)) => failures.push(reason),
                Err(reason) => {
                    let error = HarnessError::MalformedAssertion(reason);
                    return self.errored(scenario, error, exchange);
                }
            }
        }

        let mut violations = Vec::new();
        if let Some(schema) = schema {
            match &body {
                Ok(value) => violations = validate(value, &schema),
                Err(reason) => failures.push(format!(
                    "cannot validate against `{}`: response body is not valid JSON ({reason})",
                    schema.id()
                )),
            }
        }

        let verdict = Verdict::completed(scenario, failures, violations, exchange);
        tracing::debug!(
            scenario,
            outcome = %verdict.outcome(),
            failures = verdict.failures().len(),
            violations = verdict.violations().len(),
            "verdict assembled"
        );
        verdict
    }

    /// Verdict for a scenario whose request never produced a response.
    pub fn transport_failure(
        &self,
        scenario: &str,
        error: TransportError,
        elapsed: Duration,
    ) -> Verdict {
        Verdict::errored(scenario, HarnessError::Transport(error), elapsed, None)
    }

    fn errored(&self, scenario: &str, error: HarnessError, exchange: Exchange) -> Verdict {
        let elapsed = exchange.elapsed();
        Verdict::errored(scenario, error, elapsed, Some(exchange))
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use serde_json::json;

    use super::*;
    use crate::http::request::RequestDescriptor;
    use crate::schema::MemorySource;
    use crate::testing::verdict::Outcome;

    const CREATE_SCHEMA: &str = r#"{
        "type": "object",
        "required": ["name", "job", "id", "createdAt"],
        "properties": {
            "name": {"type": "string"},
            "job": {"type": "string"},
            "id": {"type": "string"},
            "createdAt": {"type": "string"}
        }
    }"#;

    fn assembler() -> VerdictAssembler {
        VerdictAssembler::new(Arc::new(SchemaStore::new(
            MemorySource::new()
                .with("CreateUserResponseSchema", CREATE_SCHEMA)
                .with("Broken", "{"),
        )))
    }

    fn exchange(status: u16, body: &str) -> Exchange {
        Exchange::new(
            RequestDescriptor::post("/api/users"),
            "https://reqres.in/api/users".into(),
            status,
            Vec::new(),
            Bytes::from(body.to_string()),
            Duration::from_millis(20),
        )
    }

    #[test]
    fn collects_all_failures_and_violations() {
        let verdict = assembler().assemble(
            "create",
            exchange(200, r#"{"name": "neo", "job": 1}"#),
            &[
                Assertion::status(201),
                Assertion::field_equals("name", json!("morpheus")),
                Assertion::field_present("id"),
            ],
            Some("CreateUserResponseSchema"),
        );

        assert_eq!(verdict.outcome(), Outcome::Failed);
        assert_eq!(verdict.failures().len(), 3);
        let rules: Vec<_> = verdict.violations().iter().map(|v| v.rule.as_str()).collect();
        assert!(rules.contains(&"required"));
        assert!(rules.contains(&"type"));
    }

    #[test]
    fn non_json_body_with_schema_is_an_assertion_failure() {
        let verdict = assembler().assemble(
            "create",
            exchange(201, "Created"),
            &[Assertion::status(201)],
            Some("CreateUserResponseSchema"),
        );
        assert_eq!(verdict.outcome(), Outcome::Failed);
        assert_eq!(verdict.failures().len(), 1);
        assert!(verdict.violations().is_empty());
    }

    #[test]
    fn schema_load_error_is_errored() {
        let verdict = assembler().assemble("broken", exchange(201, "{}"), &[], Some("Broken"));
        assert_eq!(verdict.outcome(), Outcome::Errored);
        assert!(verdict.violations().is_empty());
        assert!(verdict.exchange().is_some());
    }

    #[test]
    fn malformed_assertion_is_errored() {
        let verdict = assembler().assemble(
            "bad",
            exchange(201, "{}"),
            &[Assertion::status(201), Assertion::field_present("data[")],
            None,
        );
        assert_eq!(verdict.outcome(), Outcome::Errored);
        assert!(matches!(verdict.error(), Some(HarnessError::MalformedAssertion(_))));
    }

    #[test]
    fn transport_failure_short_circuits() {
        let verdict = assembler().transport_failure(
            "down",
            TransportError::Timeout(Duration::from_secs(30)),
            Duration::from_secs(30),
        );
        assert_eq!(verdict.outcome(), Outcome::Errored);
        assert!(verdict.violations().is_empty());
        assert!(verdict.exchange().is_none());
    }
}
