use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::assertion::Assertion;
use crate::environment::Environment;
use crate::error::SuiteError;
use crate::http::request::RequestDescriptor;

/// One named check: a request, its assertions and an optional schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub request: RequestDescriptor,
    #[serde(default)]
    pub assertions: Vec<Assertion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl Scenario {
    pub fn new(name: impl Into<String>, request: RequestDescriptor) -> Self {
        Self {
            name: name.into(),
            request,
            assertions: Vec::new(),
            schema: None,
            timeout_ms: None,
        }
    }

    pub fn expect(mut self, assertion: Assertion) -> Self {
        self.assertions.push(assertion);
        self
    }

    pub fn with_schema(mut self, id: impl Into<String>) -> Self {
        self.schema = Some(id.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.filter(|ms| *ms > 0).map(Duration::from_millis)
    }

    pub fn interpolated(&self, env: &Environment) -> Scenario {
        Scenario {
            request: env.interpolate_request(&self.request),
            ..self.clone()
        }
    }
}

/// A suite file: shared settings plus an ordered list of scenarios.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suite {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    pub scenarios: Vec<Scenario>,
}

impl Suite {
    pub fn load(path: &Path) -> Result<Self, SuiteError> {
        let display = path.display().to_string();
        let raw = fs::read_to_string(path).map_err(|source| SuiteError::Read {
            path: display.clone(),
            source,
        })?;
        let suite: Suite = serde_json::from_str(&raw).map_err(|source| SuiteError::Parse {
            path: display,
            source,
        })?;
        suite.check()?;
        Ok(suite)
    }

    pub fn check(&self) -> Result<(), SuiteError> {
        if self.scenarios.is_empty() {
            return Err(SuiteError::Empty(self.name.clone()));
        }
        let mut seen = HashSet::new();
        for scenario in &self.scenarios {
            if !seen.insert(scenario.name.as_str()) {
                return Err(SuiteError::DuplicateScenario(scenario.name.clone()));
            }
        }
        Ok(())
    }

    /// Schema identifiers referenced by any scenario, sorted and deduplicated.
    pub fn schema_refs(&self) -> Vec<&str> {
        let mut refs: Vec<&str> = self
            .scenarios
            .iter()
            .filter_map(|scenario| scenario.schema.as_deref())
            .collect();
        refs.sort_unstable();
        refs.dedup();
        refs
    }

    /// Scenarios with `{{variable}}` placeholders resolved.
    pub fn resolved_scenarios(&self, overrides: &BTreeMap<String, String>) -> Vec<Scenario> {
        let env = Environment::new()
            .with_suite(&self.variables)
            .with_overrides(overrides);
        self.scenarios
            .iter()
            .map(|scenario| scenario.interpolated(&env))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn suite_json() -> serde_json::Value {
        json!({
            "name": "users",
            "base_url": "https://reqres.in",
            "variables": {"userId": "2"},
            "scenarios": [
                {
                    "name": "get user",
                    "request": {"method": "GET", "path": "/api/users/{{userId}}"},
                    "assertions": [{"kind": "status_code_equals", "expected": 200}],
                    "schema": "GetSingleUserSchema"
                },
                {
                    "name": "list users",
                    "request": {"method": "GET", "path": "/api/users?page=2"},
                    "schema": "GetListOfUsersSchema",
                    "timeout_ms": 5000
                }
            ]
        })
    }

    #[test]
    fn loads_suite_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("suite.json");
        fs::write(&path, suite_json().to_string()).unwrap();

        let suite = Suite::load(&path).unwrap();
        assert_eq!(suite.scenarios.len(), 2);
        assert_eq!(suite.scenarios[1].timeout(), Some(Duration::from_secs(5)));
        assert_eq!(suite.schema_refs(), vec!["GetListOfUsersSchema", "GetSingleUserSchema"]);
    }

    #[test]
    fn resolves_variables_with_overrides() {
        let suite: Suite = serde_json::from_value(suite_json()).unwrap();
        let scenarios = suite.resolved_scenarios(&BTreeMap::new());
        assert_eq!(scenarios[0].request.path, "/api/users/2");

        let overrides = BTreeMap::from([("userId".to_string(), "23".to_string())]);
        let scenarios = suite.resolved_scenarios(&overrides);
        assert_eq!(scenarios[0].request.path, "/api/users/23");
    }

    #[test]
    fn rejects_duplicate_and_empty_suites() {
        let mut suite: Suite = serde_json::from_value(suite_json()).unwrap();
        suite.scenarios[1].name = "get user".into();
        assert!(matches!(suite.check(), Err(SuiteError::DuplicateScenario(_))));

        suite.scenarios.clear();
        assert!(matches!(suite.check(), Err(SuiteError::Empty(_))));
    }

    #[test]
    fn parse_error_names_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{").unwrap();
        let err = Suite::load(&path).unwrap_err();
        assert!(err.to_string().contains("broken.json"));
    }
}
