use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::json_path::JsonPath;
use crate::http::exchange::Exchange;

/// A single expectation a scenario declares about its response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Assertion {
    StatusCodeEquals { expected: u16 },
    FieldEquals { path: String, expected: JsonValue },
    FieldPresent { path: String },
    FieldAbsent { path: String },
    ElapsedAtMost { max_ms: u64 },
    FieldContains { path: String, substring: String },
    FieldNotEmpty { path: String },
    HeaderEquals { name: String, expected: String },
}

impl Assertion {
    pub fn status(expected: u16) -> Self {
        Assertion::StatusCodeEquals { expected }
    }

    pub fn field_equals(path: impl Into<String>, expected: JsonValue) -> Self {
        Assertion::FieldEquals {
            path: path.into(),
            expected,
        }
    }

    pub fn field_present(path: impl Into<String>) -> Self {
        Assertion::FieldPresent { path: path.into() }
    }

    pub fn field_absent(path: impl Into<String>) -> Self {
        Assertion::FieldAbsent { path: path.into() }
    }

    pub fn elapsed_at_most(bound: Duration) -> Self {
        Assertion::ElapsedAtMost {
            max_ms: bound.as_millis() as u64,
        }
    }

    pub fn field_contains(path: impl Into<String>, substring: impl Into<String>) -> Self {
        Assertion::FieldContains {
            path: path.into(),
            substring: substring.into(),
        }
    }

    pub fn field_not_empty(path: impl Into<String>) -> Self {
        Assertion::FieldNotEmpty { path: path.into() }
    }

    pub fn header_equals(name: impl Into<String>, expected: impl Into<String>) -> Self {
        Assertion::HeaderEquals {
            name: name.into(),
            expected: expected.into(),
        }
    }

    fn path(&self) -> Option<&str> {
        match self {
            Assertion::FieldEquals { path, .. }
            | Assertion::FieldPresent { path }
            | Assertion::FieldAbsent { path }
            | Assertion::FieldContains { path, .. }
            | Assertion::FieldNotEmpty { path } => Some(path),
            Assertion::StatusCodeEquals { .. }
            | Assertion::ElapsedAtMost { .. }
            | Assertion::HeaderEquals { .. } => None,
        }
    }

    /// Check the assertion's own input, independent of any response.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(path) = self.path() {
            JsonPath::parse(path)?;
        }
        if let Assertion::HeaderEquals { name, .. } = self {
            if name.trim().is_empty() {
                return Err("header name is empty".to_string());
            }
        }
        Ok(())
    }

    /// `Ok(None)` when the assertion holds, `Ok(Some(reason))` when it does
    /// not, `Err` when the assertion itself is malformed.
    pub fn evaluate(
        &self,
        exchange: &Exchange,
        body: &Result<JsonValue, String>,
    ) -> Result<Option<String>, String> {
        match self {
            Assertion::StatusCodeEquals { expected } => {
                let actual = exchange.status();
                Ok((actual != *expected)
                    .then(|| format!("expected status {expected}, got {}", exchange.status_text())))
            }
            Assertion::ElapsedAtMost { max_ms } => {
                let elapsed_ms = exchange.elapsed().as_millis();
                Ok((elapsed_ms > u128::from(*max_ms)).then(|| {
                    format!("elapsed {elapsed_ms}ms exceeds the bound of {max_ms}ms")
                }))
            }
            Assertion::HeaderEquals { name, expected } => Ok(match exchange.header(name) {
                Some(actual) if actual == expected => None,
                Some(actual) => Some(format!(
                    "header `{name}` expected `{expected}`, got `{actual}`"
                )),
                None => Some(format!("header `{name}` is missing")),
            }),
            Assertion::FieldEquals { path, expected } => {
                with_field(path, body, |found| match found {
                    Some(actual) if json_equals(actual, expected) => None,
                    Some(actual) => Some(format!("field `{path}` expected {expected}, got {actual}")),
                    None => Some(format!("field `{path}` expected {expected}, but it is missing")),
                })
            }
            Assertion::FieldPresent { path } => with_field(path, body, |found| {
                found
                    .is_none()
                    .then(|| format!("field `{path}` should be present"))
            }),
            Assertion::FieldAbsent { path } => with_field(path, body, |found| {
                found.map(|actual| format!("field `{path}` should be absent, got {actual}"))
            }),
            Assertion::FieldContains { path, substring } => {
                with_field(path, body, |found| match found {
                    Some(JsonValue::String(actual)) if actual.contains(substring.as_str()) => None,
                    Some(JsonValue::String(actual)) => Some(format!(
                        "field `{path}` expected to contain `{substring}`, got `{actual}`"
                    )),
                    Some(actual) => Some(format!("field `{path}` is not a string: {actual}")),
                    None => Some(format!("field `{path}` is missing")),
                })
            }
            Assertion::FieldNotEmpty { path } => with_field(path, body, |found| match found {
                Some(JsonValue::Array(items)) if !items.is_empty() => None,
                Some(JsonValue::Object(map)) if !map.is_empty() => None,
                Some(JsonValue::String(text)) if !text.is_empty() => None,
                Some(actual) => Some(format!("field `{path}` should not be empty, got {actual}")),
                None => Some(format!("field `{path}` is missing")),
            }),
        }
    }
}

fn with_field(
    path: &str,
    body: &Result<JsonValue, String>,
    check: impl FnOnce(Option<&JsonValue>) -> Option<String>,
) -> Result<Option<String>, String> {
    let path_expr = JsonPath::parse(path)?;
    match body {
        Ok(value) => Ok(check(path_expr.lookup(value))),
        Err(reason) => Ok(Some(format!(
            "cannot check field `{path}`: response body is not valid JSON ({reason})"
        ))),
    }
}

/// JSON equality where numbers compare by value (`1 == 1.0`).
fn json_equals(actual: &JsonValue, expected: &JsonValue) -> bool {
    match (actual, expected) {
        (JsonValue::Number(a), JsonValue::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => a == b,
        },
        (JsonValue::Array(a), JsonValue::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| json_equals(x, y))
        }
        (JsonValue::Object(a), JsonValue::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(key, x)| b.get(key).is_some_and(|y| json_equals(x, y)))
        }
        _ => actual == expected,
    }
}
