use std::time::Duration;

use thiserror::Error;

/// The harness could not obtain a response for a scenario.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("DNS resolution failed: {0}")]
    Dns(String),
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("TLS failure: {0}")]
    Tls(String),
    #[error("request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
    #[error("failed to read response: {0}")]
    Read(String),
    #[error("request cancelled")]
    Cancelled,
}

/// A schema document could not be loaded, parsed or compiled.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchemaLoadError {
    #[error("schema `{id}` could not be read: {reason}")]
    NotFound { id: String, reason: String },
    #[error("schema `{id}` is not valid JSON: {reason}")]
    Parse { id: String, reason: String },
    #[error("schema `{id}` is not a well-formed JSON Schema: {reason}")]
    Invalid { id: String, reason: String },
}

impl SchemaLoadError {
    pub fn id(&self) -> &str {
        match self {
            SchemaLoadError::NotFound { id, .. }
            | SchemaLoadError::Parse { id, .. }
            | SchemaLoadError::Invalid { id, .. } => id,
        }
    }
}

/// Reasons a scenario ends up `Errored` rather than `Failed`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HarnessError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("schema load error: {0}")]
    SchemaLoad(#[from] SchemaLoadError),
    #[error("malformed assertion: {0}")]
    MalformedAssertion(String),
}

/// Problems reading or interpreting a suite file.
#[derive(Debug, Error)]
pub enum SuiteError {
    #[error("failed to read suite file `{path}`: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse suite file `{path}`: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("suite `{0}` declares no scenarios")]
    Empty(String),
    #[error("duplicate scenario name `{0}`")]
    DuplicateScenario(String),
}

/// Failures raised by report sinks.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("report I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("report serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("report history store failed: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("report template failed: {0}")]
    Template(#[from] tera::Error),
    #[error("{0}")]
    Other(String),
}

/// Invalid command-line or suite configuration; the run never starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Suite(#[from] SuiteError),
    #[error("no base URL: pass --base-url, set APICONTRACT_BASE_URL or add `base_url` to the suite")]
    MissingBaseUrl,
    #[error("{0}")]
    InvalidVariable(String),
    #[error("--concurrency must be at least 1")]
    InvalidConcurrency,
    #[error("could not build HTTP client: {0}")]
    Transport(#[from] TransportError),
}
