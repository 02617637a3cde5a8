//! `{{variable}}` interpolation for suite scenarios.
//!
//! Variables come from two scopes: the suite file and the command line.
//! Command-line values override suite values.

use std::collections::BTreeMap;

use serde_json::Value as JsonValue;

use crate::http::request::{RequestBody, RequestDescriptor};

/// Scope at which a variable is defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableScope {
    Suite,
    CommandLine,
}

/// A single variable entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub key: String,
    pub value: String,
    pub scope: VariableScope,
}

#[derive(Debug, Clone, Default)]
pub struct Environment {
    variables: Vec<Variable>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_suite(mut self, vars: &BTreeMap<String, String>) -> Self {
        self.extend(vars, VariableScope::Suite);
        self
    }

    pub fn with_overrides(mut self, vars: &BTreeMap<String, String>) -> Self {
        self.extend(vars, VariableScope::CommandLine);
        self
    }

    fn extend(&mut self, vars: &BTreeMap<String, String>, scope: VariableScope) {
        self.variables.extend(vars.iter().map(|(key, value)| Variable {
            key: key.clone(),
            value: value.clone(),
            scope,
        }));
    }

    /// Flatten all scopes, command line winning over suite.
    pub fn resolve(&self) -> BTreeMap<String, String> {
        let mut resolved = BTreeMap::new();
        for scope in [VariableScope::Suite, VariableScope::CommandLine] {
            for var in self.variables.iter().filter(|var| var.scope == scope) {
                resolved.insert(var.key.clone(), var.value.clone());
            }
        }
        resolved
    }

    /// Replace `{{key}}` placeholders. Unknown placeholders stay verbatim.
    pub fn interpolate(&self, text: &str, variables: &BTreeMap<String, String>) -> String {
        if !text.contains("{{") {
            return text.to_string();
        }
        let mut result = text.to_string();
        for (key, value) in variables {
            let placeholder = format!("{{{{{key}}}}}");
            result = result.replace(&placeholder, value);
        }
        result
    }

    pub fn interpolate_request(&self, request: &RequestDescriptor) -> RequestDescriptor {
        let variables = self.resolve();
        if variables.is_empty() {
            return request.clone();
        }

        let body = request.body.as_ref().map(|body| match body {
            RequestBody::Json(value) => RequestBody::Json(self.interpolate_json(value, &variables)),
            RequestBody::Text(text) => RequestBody::Text(self.interpolate(text, &variables)),
            RequestBody::Raw(bytes) => RequestBody::Raw(bytes.clone()),
        });

        RequestDescriptor {
            method: request.method,
            path: self.interpolate(&request.path, &variables),
            headers: request
                .headers
                .iter()
                .map(|(key, value)| (key.clone(), self.interpolate(value, &variables)))
                .collect(),
            body,
        }
    }

    fn interpolate_json(&self, value: &JsonValue, variables: &BTreeMap<String, String>) -> JsonValue {
        match value {
            JsonValue::String(text) => JsonValue::String(self.interpolate(text, variables)),
            JsonValue::Array(items) => JsonValue::Array(
                items
                    .iter()
                    .map(|item| self.interpolate_json(item, variables))
                    .collect(),
            ),
            JsonValue::Object(map) => JsonValue::Object(
                map.iter()
                    .map(|(key, item)| (key.clone(), self.interpolate_json(item, variables)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }
}

/// Parse `KEY=VALUE` pairs, e.g. from repeated `--var` flags.
pub fn parse_assignments(pairs: &[String]) -> Result<BTreeMap<String, String>, String> {
    let mut parsed = BTreeMap::new();

    for raw in pairs {
        let (key, value) = raw
            .split_once('=')
            .ok_or_else(|| format!("Invalid variable format: `{raw}` (expected KEY=VALUE)"))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(format!("Variable key cannot be empty: `{raw}`"));
        }
        parsed.insert(key.to_string(), value.trim().to_string());
    }

    Ok(parsed)
}
